//! Run report
//!
//! A [`BookingReport`] is read from the registry once, after the run settled or
//! hit its deadline, and is what notifiers deliver.

use chrono::{DateTime, NaiveDate, Utc};
use handlebars::Handlebars;
use serde::Serialize;
use std::fmt;

use crate::booking::registry::{SlotRegistry, SlotSnapshot};
use crate::models::{SlotKey, SlotState};
use crate::utils::error::NotifyError;

/// Heading of every report
pub const REPORT_HEADING: &str = "Finished booking classes, here is the result";

/// Message of the failure alert sent when a run aborts
pub const FAILURE_ALERT: &str = "Something went wrong when booking classes, please check manually";

const REPORT_TEMPLATE: &str = include_str!("../templates/report.hbs");

/// Outcome of one desired slot as the user reads it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcome {
    Booked,
    Waitlisted,
    Full,
    Failed,
    /// Still pending at the end of the run
    NotFound,
}

impl ReportOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Booked => "Booked",
            Self::Waitlisted => "Waitlisted",
            Self::Full => "Full, unable to join waitlist",
            Self::Failed => "Failed",
            Self::NotFound => "Slot not found",
        }
    }
}

impl From<SlotState> for ReportOutcome {
    fn from(state: SlotState) -> Self {
        match state {
            SlotState::Booked => Self::Booked,
            SlotState::Waitlisted => Self::Waitlisted,
            SlotState::Full => Self::Full,
            SlotState::Failed => Self::Failed,
            SlotState::Pending => Self::NotFound,
        }
    }
}

impl fmt::Display for ReportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub key: SlotKey,
    pub date: Option<NaiveDate>,
    /// "Monday, March 04" once a date is known, otherwise "Monday"
    pub date_label: String,
    pub outcome: ReportOutcome,
    pub failure_detail: Option<String>,
}

impl ReportEntry {
    fn from_snapshot(snapshot: SlotSnapshot) -> Self {
        let outcome = ReportOutcome::from(snapshot.state);
        // A claim abandoned at the deadline leaves a date on a pending slot
        let date = match outcome {
            ReportOutcome::NotFound => None,
            _ => snapshot.resolved_date,
        };
        let date_label = match date {
            Some(date) => date.format("%A, %B %d").to_string(),
            None => snapshot.key.day.full_name().to_string(),
        };

        Self {
            key: snapshot.key,
            date,
            date_label,
            outcome,
            failure_detail: snapshot.failure_detail,
        }
    }
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.date_label, self.key.time, self.outcome)?;
        if let Some(detail) = &self.failure_detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

/// Final state of every desired slot, in configuration order
#[derive(Debug, Clone, Serialize)]
pub struct BookingReport {
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<ReportEntry>,
}

#[derive(Serialize)]
struct TemplateEntry<'a> {
    date_label: &'a str,
    time: String,
    outcome: &'static str,
    failure_detail: Option<&'a str>,
}

#[derive(Serialize)]
struct TemplateData<'a> {
    heading: &'static str,
    entries: Vec<TemplateEntry<'a>>,
}

impl BookingReport {
    /// Read the registry once
    pub fn from_registry(registry: &SlotRegistry) -> Self {
        Self::from_snapshots(registry.snapshot())
    }

    pub fn from_snapshots(snapshots: Vec<SlotSnapshot>) -> Self {
        Self {
            generated_at: Utc::now(),
            entries: snapshots.into_iter().map(ReportEntry::from_snapshot).collect(),
        }
    }

    /// Number of rows with the given outcome
    pub fn count(&self, outcome: ReportOutcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }

    pub fn entry(&self, key: &SlotKey) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| &e.key == key)
    }

    /// Plain-text body, one line per row
    pub fn render_text(&self) -> String {
        let mut text = String::from(REPORT_HEADING);
        for entry in &self.entries {
            text.push('\n');
            text.push_str(&entry.to_string());
        }
        text
    }

    /// HTML body for notification channels that accept markup
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Template` if rendering fails
    pub fn render_html(&self) -> Result<String, NotifyError> {
        let mut handlebars = Handlebars::new();
        handlebars
            .register_template_string("report", REPORT_TEMPLATE)
            .map_err(|e| NotifyError::Template(e.to_string()))?;

        let data = TemplateData {
            heading: REPORT_HEADING,
            entries: self
                .entries
                .iter()
                .map(|e| TemplateEntry {
                    date_label: &e.date_label,
                    time: e.key.time.to_string(),
                    outcome: e.outcome.label(),
                    failure_detail: e.failure_detail.as_deref(),
                })
                .collect(),
        };

        handlebars
            .render("report", &data)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }
}

impl fmt::Display for BookingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_text())
    }
}
