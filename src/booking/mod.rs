//! Matching and booking
//!
//! ```text
//! PageResult ──▶ match_page ──▶ BookingDispatcher ──▶ AttemptExecutor
//!                    │                 │                    │
//!                    └──── reads ──── SlotRegistry ◀─ resolves claim
//! ```

pub mod dispatcher;
pub mod executor;
pub mod matcher;
pub mod registry;
pub mod reservation;
pub mod waitlist;

pub use dispatcher::BookingDispatcher;
pub use executor::AttemptExecutor;
pub use matcher::{match_page, SlotMatch};
pub use registry::{SlotClaim, SlotRegistry, SlotSnapshot};
pub use reservation::{ReservationBackend, WebDriverReservation};
pub use waitlist::{HttpWaitlistClient, WaitlistTransport};
