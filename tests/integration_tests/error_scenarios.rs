//! Error scenario integration tests
//!
//! Run-level failures (login, fetch, parse) abort the run and produce one
//! failure alert without a report. Slot-level failures only mark their slot.

use serde_json::Value;
use slotbot::error::{Error, ErrorCategory, SlotbotErrorTrait};
use slotbot::models::DayOfWeek;
use slotbot::notifications::{WebhookConfig, WebhookNotifier};
use slotbot::pipeline::Backends;
use slotbot::report::{ReportOutcome, FAILURE_ALERT};
use slotbot::utils::error::{AuthError, CrawlerError, FetchError, ParseError};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fixtures::{
    key, test_config, FakeAuth, FixtureTransport, Harness, RecordingNotifier,
    RecordingReservation, MONDAY_ONLY_HTML,
};

// ============================================================================
// Run-level failures
// ============================================================================

#[tokio::test]
async fn test_login_rejected_aborts_run() {
    let monday = key(DayOfWeek::Mon, "18:00");
    let harness = Harness::new(FixtureTransport::new().page("current", 1, MONDAY_ONLY_HTML))
        .with_auth(FakeAuth::rejecting(401));

    let err = harness
        .pipeline(test_config(&[monday], &["current"]))
        .run_and_notify()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth(AuthError::Rejected { status: 401, .. })));
    assert_eq!(err.category(), ErrorCategory::Auth);

    assert_eq!(harness.transport.request_count(), 0);
    assert_eq!(harness.reservations.calls(), 0);
    assert_eq!(harness.notifier.report_count(), 0);

    let alerts = harness.notifier.alerts.lock().unwrap();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].starts_with(FAILURE_ALERT));
    assert!(alerts[0].contains("Could not log in"));
}

#[tokio::test]
async fn test_fetch_failure_aborts_run() {
    let monday = key(DayOfWeek::Mon, "18:00");
    let wednesday = key(DayOfWeek::Wed, "07:00");
    let harness = Harness::new(
        FixtureTransport::new()
            .fixture("current", 1, "listing_next_week.html")
            .status("current", 2, 502),
    );

    let err = harness
        .pipeline(test_config(&[monday, wednesday], &["current"]))
        .run_and_notify()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Crawler(CrawlerError::Fetch(FetchError::Status { page: 2, status: 502 }))
    ));
    assert_eq!(harness.notifier.report_count(), 0);

    let alerts = harness.notifier.alerts.lock().unwrap();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("Could not crawl the class schedule"));
}

#[tokio::test]
async fn test_eager_batch_failure_forwards_nothing() {
    let monday = key(DayOfWeek::Mon, "18:00");
    let harness = Harness::new(
        FixtureTransport::new()
            .page("current", 1, MONDAY_ONLY_HTML)
            .status("current", 2, 500),
    );
    let mut config = test_config(&[monday], &["current"]);
    config.crawler.eager_pages = 2;

    let err = harness.pipeline(config).run_and_notify().await.unwrap_err();

    assert!(matches!(err, Error::Crawler(CrawlerError::Fetch(_))));
    // Page 1 parsed fine but its batch failed, so it never reached the dispatcher
    assert_eq!(harness.reservations.calls(), 0);
    assert_eq!(harness.notifier.alert_count(), 1);
}

#[tokio::test]
async fn test_maintenance_page_aborts_run() {
    let monday = key(DayOfWeek::Mon, "18:00");
    let harness = Harness::new(FixtureTransport::new().fixture("current", 1, "maintenance.html"));

    let err = harness
        .pipeline(test_config(&[monday], &["current"]))
        .run_and_notify()
        .await
        .unwrap_err();

    match &err {
        Error::Crawler(CrawlerError::Parse { page, source }) => {
            assert_eq!(*page, 1);
            assert_eq!(*source, ParseError::NoScheduleList);
        }
        other => panic!("expected parse failure, got {other:?}"),
    }
    assert_eq!(err.category(), ErrorCategory::Parsing);
    assert!(harness.notifier.alerts.lock().unwrap()[0].contains("changed its layout"));
}

#[tokio::test]
async fn test_drifted_markup_aborts_run() {
    let monday = key(DayOfWeek::Mon, "18:00");
    let harness = Harness::new(
        FixtureTransport::new()
            .page("current", 1, MONDAY_ONLY_HTML)
            .fixture("current", 2, "drifted_markup.html"),
    );

    let err = harness
        .pipeline(test_config(&[monday], &["current"]))
        .run_and_notify()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Crawler(CrawlerError::Parse {
            page: 2,
            source: ParseError::UnrecognizedSlot(_)
        })
    ));
    assert_eq!(harness.notifier.report_count(), 0);
}

#[tokio::test]
async fn test_failure_alert_over_webhook() {
    let hooks = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/alerts"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&hooks)
        .await;

    let monday = key(DayOfWeek::Mon, "18:00");
    let harness = Harness::new(FixtureTransport::new()).with_auth(FakeAuth::rejecting(500));
    let backends = Backends {
        authenticator: harness.auth.clone(),
        transport: harness.transport.clone(),
        reservations: harness.reservations.clone(),
        waitlist: harness.waitlist.clone(),
        notifier: Arc::new(
            WebhookNotifier::new(
                WebhookConfig::new(format!("{}/alerts", hooks.uri()))
                    .with_recipient("me@example.com")
                    .with_auth_token("hook-token"),
            )
            .unwrap(),
        ),
    };

    let result = slotbot::pipeline::BookingPipeline::new(test_config(&[monday], &["current"]), backends)
        .run_and_notify()
        .await;
    assert!(result.is_err());

    let requests = hooks.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].headers.get("authorization").unwrap(),
        "Bearer hook-token"
    );

    let payload: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(payload["kind"], "failure");
    assert_eq!(payload["recipient"], "me@example.com");
    assert!(payload["text"].as_str().unwrap().starts_with(FAILURE_ALERT));
}

// ============================================================================
// Slot-level failures
// ============================================================================

#[tokio::test]
async fn test_attempt_timeout_marks_slot_failed() {
    let monday = key(DayOfWeek::Mon, "18:00");
    let harness = Harness::new(FixtureTransport::new().page("current", 1, MONDAY_ONLY_HTML))
        .with_reservations(RecordingReservation::new().with_delay(Duration::from_secs(3)));
    let mut config = test_config(&[monday], &["current"]);
    config.booking.attempt_timeout_secs = 1;

    let report = harness.pipeline(config).run_and_notify().await.unwrap();

    let row = report.entry(&monday).unwrap();
    assert_eq!(row.outcome, ReportOutcome::Failed);
    assert_eq!(
        row.failure_detail.as_deref(),
        Some("Attempt timed out after 1000 ms")
    );
    assert_eq!(harness.notifier.report_count(), 1);
    assert_eq!(harness.notifier.alert_count(), 0);
}

#[tokio::test]
async fn test_undeliverable_report_keeps_run_result() {
    let monday = key(DayOfWeek::Mon, "18:00");
    let harness = Harness::new(FixtureTransport::new().page("current", 1, MONDAY_ONLY_HTML))
        .with_notifier(RecordingNotifier::failing());

    let report = harness
        .pipeline(test_config(&[monday], &["current"]))
        .run_and_notify()
        .await
        .unwrap();

    assert_eq!(report.count(ReportOutcome::Booked), 1);
    assert_eq!(harness.notifier.report_count(), 1);
    assert_eq!(harness.notifier.alert_count(), 0);
}

#[tokio::test]
async fn test_run_deadline_reports_pending_slots() {
    let monday = key(DayOfWeek::Mon, "18:00");
    let harness = Harness::new(
        FixtureTransport::new()
            .page("current", 1, MONDAY_ONLY_HTML)
            .with_delay(Duration::from_secs(30)),
    );
    let mut config = test_config(&[monday], &["current"]);
    config.booking.run_deadline_secs = 1;

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        harness.pipeline(config).run_and_notify(),
    )
    .await
    .expect("run should end at its deadline")
    .unwrap();

    assert_eq!(report.entry(&monday).unwrap().outcome, ReportOutcome::NotFound);
    assert_eq!(harness.reservations.calls(), 0);
    assert_eq!(harness.notifier.report_count(), 1);
}
