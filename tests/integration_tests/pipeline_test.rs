//! End-to-end pipeline integration tests
//!
//! Tests the complete workflow:
//! 1. Login
//! 2. Paginated listing crawl over one or more windows
//! 3. Matching against the desired slots
//! 4. Concurrent booking attempts
//! 5. Report delivery

use serde_json::Value;
use slotbot::booking::{HttpWaitlistClient, WaitlistTransport};
use slotbot::crawler::{HttpAuthenticator, ScheduleFetcher};
use slotbot::models::DayOfWeek;
use slotbot::notifications::{WebhookConfig, WebhookNotifier};
use slotbot::pipeline::{Backends, BookingPipeline};
use slotbot::report::{ReportOutcome, REPORT_HEADING};
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fixtures::{
    key, load_fixture, march, test_config, FixtureTransport, Harness, RecordingReservation,
    RecordingWaitlist, MONDAY_ONLY_HTML, MONDAY_URL,
};

// ============================================================================
// Reference scenarios
// ============================================================================

#[tokio::test]
async fn test_monday_booked_wednesday_not_found() {
    let monday = key(DayOfWeek::Mon, "18:00");
    let wednesday = key(DayOfWeek::Wed, "07:00");

    let harness = Harness::new(
        FixtureTransport::new()
            .page("current", 1, MONDAY_ONLY_HTML)
            .fixture("current", 2, "no_classes.html"),
    );
    let pipeline = harness.pipeline(test_config(&[monday, wednesday], &["current"]));

    let report = pipeline.run_and_notify().await.unwrap();

    assert_eq!(harness.reservations.urls(), vec![MONDAY_URL.to_string()]);
    assert_eq!(harness.waitlist.calls(), 0);
    assert_eq!(harness.transport.requested_pages("current"), vec![1, 2]);

    let monday_row = report.entry(&monday).unwrap();
    assert_eq!(monday_row.outcome, ReportOutcome::Booked);
    assert_eq!(monday_row.date, Some(march(4)));

    let wednesday_row = report.entry(&wednesday).unwrap();
    assert_eq!(wednesday_row.outcome, ReportOutcome::NotFound);
    assert_eq!(wednesday_row.date_label, "Wednesday");

    assert_eq!(
        report.render_text(),
        format!("{REPORT_HEADING}\nMonday, March 04 18:00: Booked\nWednesday 07:00: Slot not found")
    );
    assert_eq!(harness.notifier.report_count(), 1);
    assert_eq!(harness.notifier.alert_count(), 0);
}

#[tokio::test]
async fn test_failed_reservation_keeps_sibling_outcome() {
    let monday = key(DayOfWeek::Mon, "18:00");
    let wednesday = key(DayOfWeek::Wed, "07:00");

    let harness = Harness::new(FixtureTransport::new().fixture("current", 1, "listing_week.html"))
        .with_reservations(RecordingReservation::new().failing_on("eid=101"));
    let pipeline = harness.pipeline(test_config(&[monday, wednesday], &["current"]));

    let report = pipeline.run_and_notify().await.unwrap();

    let monday_row = report.entry(&monday).unwrap();
    assert_eq!(monday_row.outcome, ReportOutcome::Failed);
    assert!(monday_row
        .failure_detail
        .as_deref()
        .unwrap()
        .contains("target window already closed"));

    let wednesday_row = report.entry(&wednesday).unwrap();
    assert_eq!(wednesday_row.outcome, ReportOutcome::Waitlisted);
    assert_eq!(wednesday_row.date, Some(march(6)));

    assert_eq!(harness.reservations.calls(), 1);
    assert_eq!(harness.waitlist.calls(), 1);
    assert_eq!(harness.notifier.report_count(), 1);
}

#[tokio::test]
async fn test_already_resolved_slots_need_no_action() {
    let full = key(DayOfWeek::Mon, "06:00");
    let booked = key(DayOfWeek::Tue, "09:00");
    let waitlisted = key(DayOfWeek::Fri, "12:00");
    let missing = key(DayOfWeek::Sun, "10:00");

    let harness = Harness::new(FixtureTransport::new().fixture("current", 1, "listing_week.html"));
    let pipeline = harness.pipeline(test_config(&[full, booked, waitlisted, missing], &["current"]));

    let report = pipeline.run().await.unwrap();

    let outcomes: Vec<_> = report.entries.iter().map(|e| e.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            ReportOutcome::Full,
            ReportOutcome::Booked,
            ReportOutcome::Waitlisted,
            ReportOutcome::NotFound,
        ]
    );
    assert_eq!(report.entries[0].outcome.label(), "Full, unable to join waitlist");
    assert_eq!(harness.reservations.calls(), 0);
    assert_eq!(harness.waitlist.calls(), 0);
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn test_pagination_stops_at_no_classes_page() {
    let monday = key(DayOfWeek::Mon, "18:00");
    let wednesday = key(DayOfWeek::Wed, "07:00");

    // Page 4 would fail the run if it were ever fetched
    let harness = Harness::new(
        FixtureTransport::new()
            .fixture("current", 1, "listing_week.html")
            .fixture("current", 2, "listing_next_week.html")
            .fixture("current", 3, "no_classes.html")
            .fixture("current", 4, "maintenance.html"),
    );
    let pipeline = harness.pipeline(test_config(&[monday, wednesday], &["current"]));

    let report = pipeline.run().await.unwrap();

    assert_eq!(harness.transport.requested_pages("current"), vec![1, 2, 3]);

    // Page 1 wins both targets; page 2 offers them again and is ignored
    assert_eq!(report.entry(&monday).unwrap().outcome, ReportOutcome::Booked);
    assert_eq!(report.entry(&monday).unwrap().date, Some(march(4)));
    assert_eq!(report.entry(&wednesday).unwrap().outcome, ReportOutcome::Waitlisted);
    assert_eq!(harness.reservations.calls(), 1);
    assert_eq!(harness.waitlist.calls(), 1);
}

#[tokio::test]
async fn test_page_limit_ends_stream() {
    let monday = key(DayOfWeek::Mon, "18:00");

    let mut transport = FixtureTransport::new();
    for page in 1..=5 {
        transport = transport.fixture("current", page, "listing_next_week.html");
    }
    let harness = Harness::new(transport);

    let mut config = test_config(&[monday], &["current"]);
    config.crawler.max_pages = 3;
    let report = harness.pipeline(config).run().await.unwrap();

    assert_eq!(harness.transport.requested_pages("current"), vec![1, 2, 3]);
    assert_eq!(report.entry(&monday).unwrap().outcome, ReportOutcome::Booked);
}

#[tokio::test]
async fn test_eager_pages_across_windows() {
    let monday = key(DayOfWeek::Mon, "18:00");
    let wednesday = key(DayOfWeek::Wed, "07:00");

    let harness = Harness::new(
        FixtureTransport::new()
            .fixture("this-week", 1, "listing_week.html")
            .fixture("next-week", 1, "listing_next_week.html"),
    );
    let mut config = test_config(&[monday, wednesday], &["this-week", "next-week"]);
    config.crawler.eager_pages = 2;

    let report = harness.pipeline(config).run().await.unwrap();

    // Both windows fetched pages 1 and 2 in their eager batch and stopped there
    assert_eq!(harness.transport.requested_pages("this-week"), vec![1, 2]);
    assert_eq!(harness.transport.requested_pages("next-week"), vec![1, 2]);
    assert_eq!(harness.transport.window_start("this-week"), None);
    assert_eq!(harness.transport.window_start("next-week"), Some(march(11)));

    // Monday is open in both windows but is reserved once
    let monday_row = report.entry(&monday).unwrap();
    assert_eq!(monday_row.outcome, ReportOutcome::Booked);
    assert!(monday_row.date == Some(march(4)) || monday_row.date == Some(march(11)));
    let monday_reservations = harness
        .reservations
        .urls()
        .iter()
        .filter(|url| url.contains("eid=101") || url.contains("eid=111"))
        .count();
    assert_eq!(monday_reservations, 1);

    // Wednesday is waitlistable this week and open next week; one side effect either way
    let wednesday_row = report.entry(&wednesday).unwrap();
    let wednesday_reservations = harness
        .reservations
        .urls()
        .iter()
        .filter(|url| url.contains("eid=212"))
        .count();
    assert_eq!(wednesday_reservations + harness.waitlist.calls(), 1);
    assert!(matches!(
        wednesday_row.outcome,
        ReportOutcome::Waitlisted | ReportOutcome::Booked
    ));
}

#[tokio::test]
async fn test_attempt_concurrency_is_bounded() {
    let slots = [
        key(DayOfWeek::Mon, "18:00"),
        key(DayOfWeek::Wed, "07:00"),
    ];

    let harness = Harness::new(FixtureTransport::new().fixture("current", 1, "listing_next_week.html"))
        .with_reservations(
            RecordingReservation::new().with_delay(std::time::Duration::from_millis(100)),
        );
    let mut config = test_config(&slots, &["current"]);
    config.booking.max_concurrent_attempts = 1;

    let report = harness.pipeline(config).run().await.unwrap();

    assert_eq!(report.count(ReportOutcome::Booked), 2);
    assert_eq!(harness.reservations.calls(), 2);
    assert_eq!(
        harness
            .reservations
            .peak_in_flight
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

// ============================================================================
// Real HTTP clients against a mock site
// ============================================================================

#[tokio::test]
async fn test_full_run_against_mock_site() {
    let site = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("email=me%40example.com"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/")
                .insert_header("Set-Cookie", "PHPSESSID=mock-session; path=/"),
        )
        .expect(1)
        .mount(&site)
        .await;

    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("route", "widget/directory/businessclass"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("listing_week.html")))
        .expect(1)
        .mount(&site)
        .await;

    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("route", "widget/directory/businessclass"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("no_classes.html")))
        .expect(1)
        .mount(&site)
        .await;

    Mock::given(method("POST"))
        .and(path("/index.php"))
        .and(query_param("route", "directory/directory/widgetjoinwaitlist"))
        .and(body_string_contains("eid=202"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&site)
        .await;

    Mock::given(method("POST"))
        .and(path("/hooks/slotbot"))
        .and(body_string_contains("\"kind\":\"report\""))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&site)
        .await;

    let monday = key(DayOfWeek::Mon, "18:00");
    let wednesday = key(DayOfWeek::Wed, "07:00");
    let mut config = test_config(&[monday, wednesday], &["current"]);
    config.site.base_url = site.uri();

    let reservations = Arc::new(RecordingReservation::new());
    let waitlist: Arc<dyn WaitlistTransport> = Arc::new(HttpWaitlistClient::new(&config).unwrap());
    let backends = Backends {
        authenticator: Arc::new(HttpAuthenticator::new(&config).unwrap()),
        transport: Arc::new(ScheduleFetcher::new(&config).unwrap()),
        reservations: reservations.clone(),
        waitlist,
        notifier: Arc::new(
            WebhookNotifier::new(WebhookConfig::new(format!("{}/hooks/slotbot", site.uri())))
                .unwrap(),
        ),
    };

    let report = BookingPipeline::new(config, backends)
        .with_today(march(4))
        .run_and_notify()
        .await
        .unwrap();

    assert_eq!(report.entry(&monday).unwrap().outcome, ReportOutcome::Booked);
    assert_eq!(report.entry(&wednesday).unwrap().outcome, ReportOutcome::Waitlisted);
    assert_eq!(reservations.calls(), 1);

    let requests = site.received_requests().await.unwrap();
    let hook = requests
        .iter()
        .find(|r| r.url.path() == "/hooks/slotbot")
        .unwrap();
    let payload: Value = serde_json::from_slice(&hook.body).unwrap();
    assert_eq!(payload["entries"].as_array().unwrap().len(), 2);
    assert_eq!(payload["entries"][1]["outcome"], "waitlisted");
    assert!(payload["html"]
        .as_str()
        .unwrap()
        .contains("Wednesday, March 06 07:00: <b>Waitlisted</b>"));
}

#[tokio::test]
async fn test_rejected_waitlist_join_is_failed() {
    let wednesday = key(DayOfWeek::Wed, "07:00");

    let harness = Harness::new(FixtureTransport::new().fixture("current", 1, "listing_week.html"))
        .with_waitlist(RecordingWaitlist::answering(500));
    let report = harness
        .pipeline(test_config(&[wednesday], &["current"]))
        .run()
        .await
        .unwrap();

    let row = report.entry(&wednesday).unwrap();
    assert_eq!(row.outcome, ReportOutcome::Failed);
    assert_eq!(
        row.failure_detail.as_deref(),
        Some("Waitlist join rejected with status 500")
    );
}
