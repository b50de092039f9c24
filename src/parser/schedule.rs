//! Class listing page parser
//!
//! Turns one fetched listing page into a [`ParsedPage`]: either the explicit
//! "no classes" sentinel that ends pagination, or a [`PageResult`] mapping
//! day-of-week and start time to the advertised [`ScheduleSlot`].
//!
//! Markup that does not look like the listing we know is reported as a
//! [`ParseError`] instead of being classified on a best-effort basis, so a vendor
//! layout change stops the run rather than silently booking nothing.

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::OnceLock;

use crate::models::{DayOfWeek, PageResult, ParsedPage, ScheduleSlot, SlotClassification, TimeOfDay};
use crate::parser::selectors::{
    ScheduleSelectors, BOOKED_TEXT, BOOK_URL_ATTR, DAY_HEADER_FORMAT, FULL_TEXT,
    NO_CLASSES_MARKER, SLOT_TIME_FORMAT, WAITLISTED_TEXT, WAITLIST_URL_ATTR,
};
use crate::utils::error::ParseError;
use crate::utils::normalize_whitespace;

/// Listing page parser
pub struct SchedulePageParser {
    selectors: ScheduleSelectors,
}

impl SchedulePageParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            selectors: ScheduleSelectors::new(),
        }
    }

    /// Parse one listing page
    ///
    /// # Errors
    ///
    /// Returns `ParseError::NoScheduleList` when the page has neither the
    /// "no classes" marker nor a single day block, and the other `ParseError`
    /// variants when a day or slot entry cannot be read.
    pub fn parse(&self, html: &str) -> Result<ParsedPage, ParseError> {
        let document = Html::parse_document(html);

        if self.has_no_classes_marker(&document) {
            return Ok(ParsedPage::NoClasses);
        }

        let mut page = PageResult::new();
        let mut day_blocks = 0usize;

        for day_block in document.select(self.selectors.day_block) {
            day_blocks += 1;
            let date = self.parse_day_header(day_block)?;
            let day = DayOfWeek::of_date(date);

            for (idx, entry) in day_block.select(self.selectors.slot_entry).enumerate() {
                let slot = self.parse_slot(entry, date, day, idx)?;
                if let Some(previous) = page.insert(slot) {
                    tracing::warn!(
                        day = %previous.day,
                        time = %previous.time,
                        date = %date,
                        "Listing shows the same slot twice, keeping the later entry"
                    );
                }
            }
        }

        if day_blocks == 0 {
            return Err(ParseError::NoScheduleList);
        }

        tracing::debug!(days = day_blocks, slots = page.len(), "Parsed listing page");
        Ok(ParsedPage::Schedule(page))
    }

    fn has_no_classes_marker(&self, document: &Html) -> bool {
        document
            .root_element()
            .text()
            .any(|t| t.to_lowercase().contains(NO_CLASSES_MARKER))
    }

    fn parse_day_header(&self, day_block: ElementRef<'_>) -> Result<NaiveDate, ParseError> {
        let header = day_block
            .select(self.selectors.day_header)
            .next()
            .map(element_text)
            .ok_or_else(|| ParseError::InvalidDate(String::new()))?;

        parse_listing_date(&header)
    }

    fn parse_slot(
        &self,
        entry: ElementRef<'_>,
        date: NaiveDate,
        day: DayOfWeek,
        idx: usize,
    ) -> Result<ScheduleSlot, ParseError> {
        let time_text = entry
            .children()
            .filter_map(ElementRef::wrap)
            .next()
            .map(element_text)
            .ok_or_else(|| ParseError::InvalidTime(String::new()))?;
        let time = parse_start_time(&time_text)?;

        let location = format!("{date} entry {idx}");
        let (classification, action_url) = self.classify(entry, &location)?;

        Ok(ScheduleSlot {
            day,
            time,
            date,
            classification,
            action_url,
        })
    }

    /// Classify a slot entry and extract its action URL
    ///
    /// A waitlist button wins over every badge: the widget can keep a stale
    /// "Booked" paragraph next to a live join button.
    fn classify(
        &self,
        entry: ElementRef<'_>,
        location: &str,
    ) -> Result<(SlotClassification, Option<String>), ParseError> {
        if let Some(button) = entry.select(self.selectors.waitlist_button).next() {
            let url = button
                .value()
                .attr(WAITLIST_URL_ATTR)
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .ok_or_else(|| ParseError::MissingAction(format!("waitlist button at {location}")))?;
            return Ok((SlotClassification::Waitlistable, Some(url.to_string())));
        }

        if entry
            .select(self.selectors.booked_marker)
            .any(|p| element_text(p).contains(BOOKED_TEXT))
        {
            return Ok((SlotClassification::AlreadyBooked, None));
        }

        let badges: Vec<String> = entry.select(self.selectors.status_badge).map(element_text).collect();
        if badges.iter().any(|b| b == FULL_TEXT) {
            return Ok((SlotClassification::Full, None));
        }
        if badges.iter().any(|b| b == WAITLISTED_TEXT) {
            return Ok((SlotClassification::AlreadyWaitlisted, None));
        }

        if let Some(button) = entry.select(self.selectors.book_button).next() {
            let url = button
                .value()
                .attr(BOOK_URL_ATTR)
                .and_then(extract_quoted_url)
                .ok_or_else(|| ParseError::MissingAction(format!("reservation button at {location}")))?;
            return Ok((SlotClassification::Open, Some(url)));
        }

        Err(ParseError::UnrecognizedSlot(location.to_string()))
    }
}

impl Default for SchedulePageParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a day header such as "Monday, March 4, 2024"
pub fn parse_listing_date(text: &str) -> Result<NaiveDate, ParseError> {
    let text = normalize_whitespace(text);
    NaiveDate::parse_from_str(&text, DAY_HEADER_FORMAT).map_err(|_| ParseError::InvalidDate(text))
}

/// Parse the start of a time range such as "6:00 PM to 7:00 PM"
pub fn parse_start_time(text: &str) -> Result<TimeOfDay, ParseError> {
    let text = normalize_whitespace(text);
    let start = text.split("to").next().unwrap_or_default().trim();
    NaiveTime::parse_from_str(&start.to_uppercase(), SLOT_TIME_FORMAT)
        .map(TimeOfDay::from_time)
        .map_err(|_| ParseError::InvalidTime(text.clone()))
}

/// Pull the quoted `https` URL out of an inline `onclick` handler
pub fn extract_quoted_url(onclick: &str) -> Option<String> {
    static URL_RE: OnceLock<Regex> = OnceLock::new();

    let re = URL_RE.get_or_init(|| Regex::new(r#"['"](https?://[^'"]+)['"]"#).expect("Invalid regex pattern"));

    re.captures(onclick)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}
