//! iCalendar (RFC 5545 subset) import and export
//!
//! Only `VEVENT` components are read, and only the properties a task needs:
//! `UID`, `SUMMARY`, `DESCRIPTION`, `DTSTART` and `DTEND`.

pub mod parser;
pub mod writer;
pub mod import;

pub use parser::{parse_calendar, within_window};
pub use writer::write_calendar;
pub use import::{import_events, ImportSummary};

use thiserror::Error;

/// Calendar event as read from an `.ics` file
#[derive(Debug, Clone, PartialEq)]
pub struct IcsEvent {
    pub uid: String,
    pub summary: String,
    pub description: Option<String>,
    pub start: i64,
    pub end: Option<i64>,
    /// `DTSTART` was a bare date
    pub all_day: bool,
}

#[derive(Debug, Error)]
pub enum IcsError {
    #[error("not an iCalendar file (no BEGIN:VCALENDAR or BEGIN:VEVENT found)")]
    NotCalendar,
    #[error("invalid date-time value '{0}'")]
    InvalidDateTime(String),
    #[error("unterminated VEVENT starting at line {0}")]
    UnterminatedEvent(usize),
}
