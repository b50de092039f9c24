//! Exactly-once booking under concurrent matches
//!
//! The same desired slot can show up on several pages and in several windows at
//! once. Whatever the interleaving, one side effect must fire per slot.

use slotbot::booking::{
    match_page, AttemptExecutor, BookingDispatcher, ReservationBackend, SlotRegistry,
    WaitlistTransport,
};
use slotbot::crawler::SessionCredential;
use slotbot::models::{DayOfWeek, ParsedPage, SlotState};
use slotbot::parser::SchedulePageParser;
use slotbot::report::ReportOutcome;
use std::sync::Arc;
use std::time::Duration;

use super::fixtures::{
    key, load_fixture, march, test_config, FixtureTransport, Harness, RecordingReservation,
    RecordingWaitlist, MONDAY_ONLY_HTML, MONDAY_URL,
};

fn monday_page() -> slotbot::models::PageResult {
    match SchedulePageParser::new().parse(MONDAY_ONLY_HTML).unwrap() {
        ParsedPage::Schedule(page) => page,
        ParsedPage::NoClasses => panic!("fixture should hold a schedule"),
    }
}

fn executor(
    reservations: Arc<RecordingReservation>,
    waitlist: Arc<RecordingWaitlist>,
) -> Arc<AttemptExecutor> {
    let reservations: Arc<dyn ReservationBackend> = reservations;
    let waitlist: Arc<dyn WaitlistTransport> = waitlist;
    Arc::new(AttemptExecutor::new(
        Arc::new(SessionCredential::new("test-session")),
        reservations,
        waitlist,
        Duration::from_secs(5),
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_windows_racing_on_one_open_slot() {
    let monday = key(DayOfWeek::Mon, "18:00");
    let windows = ["w1", "w2", "w3", "w4", "w5", "w6"];

    let mut transport = FixtureTransport::new().with_delay(Duration::from_millis(20));
    for window in windows {
        transport = transport.page(window, 1, MONDAY_ONLY_HTML);
    }
    let harness = Harness::new(transport)
        .with_reservations(RecordingReservation::new().with_delay(Duration::from_millis(50)));

    let mut config = test_config(&[monday], &windows);
    config.crawler.eager_pages = 2;
    let report = harness.pipeline(config).run().await.unwrap();

    assert_eq!(harness.reservations.urls(), vec![MONDAY_URL.to_string()]);
    assert_eq!(report.entry(&monday).unwrap().outcome, ReportOutcome::Booked);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_matches_in_one_batch() {
    let monday = key(DayOfWeek::Mon, "18:00");
    let registry = Arc::new(SlotRegistry::new(&[monday]).unwrap());
    let reservations = Arc::new(RecordingReservation::new().with_delay(Duration::from_millis(50)));
    let waitlist = Arc::new(RecordingWaitlist::answering(200));
    let mut dispatcher = BookingDispatcher::new(
        Arc::clone(&registry),
        executor(reservations.clone(), waitlist),
        4,
    );

    // Two pages matched before either attempt finished
    let page = monday_page();
    let mut matches = match_page(&page, &registry);
    matches.extend(match_page(&page, &registry));
    assert_eq!(matches.len(), 2);

    assert_eq!(dispatcher.dispatch(matches), 1);
    let outcomes = dispatcher.settle().await;

    assert_eq!(outcomes, vec![(monday, SlotState::Booked)]);
    assert_eq!(reservations.calls(), 1);
    assert_eq!(registry.state(&monday), Some(SlotState::Booked));
}

#[tokio::test]
async fn test_rematching_resolved_slot_is_noop() {
    let monday = key(DayOfWeek::Mon, "18:00");
    let registry = Arc::new(SlotRegistry::new(&[monday]).unwrap());
    let reservations = Arc::new(RecordingReservation::new());
    let waitlist = Arc::new(RecordingWaitlist::answering(200));
    let mut dispatcher = BookingDispatcher::new(
        Arc::clone(&registry),
        executor(reservations.clone(), waitlist),
        2,
    );

    let page = monday_page();
    let first = match_page(&page, &registry);
    assert_eq!(dispatcher.dispatch(first.clone()), 1);
    dispatcher.settle().await;
    assert_eq!(registry.state(&monday), Some(SlotState::Booked));

    // Matching again finds nothing; replaying the old match spawns nothing
    assert!(match_page(&page, &registry).is_empty());
    assert_eq!(dispatcher.dispatch(first), 0);
    assert!(dispatcher.settle().await.is_empty());

    assert_eq!(reservations.calls(), 1);
    let snapshot = registry.snapshot();
    assert_eq!(snapshot[0].state, SlotState::Booked);
    assert_eq!(snapshot[0].resolved_date, Some(march(4)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_winner_is_not_overridden() {
    let monday = key(DayOfWeek::Mon, "18:00");

    let harness = Harness::new(
        FixtureTransport::new()
            .page("this-week", 1, MONDAY_ONLY_HTML)
            .page("next-week", 1, MONDAY_ONLY_HTML)
            .page("next-week", 2, load_fixture("listing_next_week.html")),
    )
    .with_reservations(RecordingReservation::new().failing_on("eid="));

    let report = harness
        .pipeline(test_config(&[monday], &["this-week", "next-week"]))
        .run()
        .await
        .unwrap();

    // The first claim failed; later open matches must not retry it
    assert_eq!(harness.reservations.calls(), 1);
    assert_eq!(report.entry(&monday).unwrap().outcome, ReportOutcome::Failed);
}
