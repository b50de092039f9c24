//! CSS selectors for the vendor's class listing widget
//!
//! The listing is a `.schedule-list` with one `<li>` per calendar day; each day
//! holds `.schedule` entries, one per class occurrence.

use lazy_static::lazy_static;
use scraper::Selector;

// Helper macro to parse selectors safely at compile time
macro_rules! parse_selector {
    ($s:expr) => {
        Selector::parse($s).expect(concat!("Invalid CSS selector: ", $s))
    };
}

lazy_static! {
    static ref DAY_BLOCK: Selector =
        parse_selector!(".schedule-list > ul > li:not(.schedule-list-head)");
    static ref DAY_HEADER: Selector = parse_selector!(".schedule-list-day");
    static ref SLOT_ENTRY: Selector = parse_selector!(".schedule");

    static ref BOOKED_MARKER: Selector = parse_selector!("p");
    static ref STATUS_BADGE: Selector = parse_selector!("span");

    static ref BOOK_BUTTON: Selector = parse_selector!("button.bookClass");
    static ref WAITLIST_BUTTON: Selector = parse_selector!("button.join_wait_list");
}

/// Marker text the listing shows once pagination runs past the last class
pub const NO_CLASSES_MARKER: &str = "no class scheduled";

/// Paragraph text marking a class already reserved under this account
pub const BOOKED_TEXT: &str = "Booked";

/// Badge text of a full class without waitlist
pub const FULL_TEXT: &str = "Class Full";

/// Badge text of a class this account is already waitlisted on
pub const WAITLISTED_TEXT: &str = "Already in waitlist";

/// Attribute of the waitlist button carrying the join URL
pub const WAITLIST_URL_ATTR: &str = "data-purl";

/// Attribute of the reservation button embedding the reservation URL
pub const BOOK_URL_ATTR: &str = "onclick";

/// Date header format, e.g. "Monday, March 4, 2024"
pub const DAY_HEADER_FORMAT: &str = "%A, %B %d, %Y";

/// Slot start time format, e.g. "6:00 PM"
pub const SLOT_TIME_FORMAT: &str = "%I:%M %p";

/// Selectors for the class listing page
pub struct ScheduleSelectors {
    pub day_block: &'static Selector,
    pub day_header: &'static Selector,
    pub slot_entry: &'static Selector,
    pub booked_marker: &'static Selector,
    pub status_badge: &'static Selector,
    pub book_button: &'static Selector,
    pub waitlist_button: &'static Selector,
}

impl ScheduleSelectors {
    pub fn new() -> Self {
        Self {
            day_block: &DAY_BLOCK,
            day_header: &DAY_HEADER,
            slot_entry: &SLOT_ENTRY,
            booked_marker: &BOOKED_MARKER,
            status_badge: &STATUS_BADGE,
            book_button: &BOOK_BUTTON,
            waitlist_button: &WAITLIST_BUTTON,
        }
    }
}

impl Default for ScheduleSelectors {
    fn default() -> Self {
        Self::new()
    }
}
