//! User-facing command surface and its fixed replies

use super::traits::CommandEvent;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

pub const WELCOME_TEXT: &str = "Welcome to the shift scheduling bot!\n\
    Use /reschedule to request a new weekly schedule, \
    /unavailable YYYY-MM-DD YYYY-MM-DD to report a period you cannot work.";

pub const HELP_TEXT: &str = "Unknown command. Available commands:\n\
    /start - welcome message\n\
    /reschedule - request a new weekly schedule\n\
    /unavailable YYYY-MM-DD YYYY-MM-DD - report an unavailability period\n\
    /help - this list";

pub const REQUEST_ACCEPTED_TEXT: &str = "Request accepted, wait for your new schedule.";

pub const SUBMIT_FAILED_TEXT: &str = "Could not submit the request. Please try again later.";

pub const INVALID_PERIOD_TEXT: &str = "Invalid period. Use /unavailable YYYY-MM-DD YYYY-MM-DD \
    with real dates and the end not before the start.";

/// `/unavailable <from> <to>`, optionally addressed as `/unavailable@botname`
static UNAVAILABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/unavailable(?:@\S+)?\s+(\d{4}-\d{2}-\d{2})\s+(\d{4}-\d{2}-\d{2})\b")
        .expect("unavailable command regex must compile")
});

/// A parsed incoming command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Help,
    Reschedule,
    Unavailable { from: NaiveDate, to: NaiveDate },
    /// `/unavailable` with a missing, malformed or reversed period
    InvalidPeriod,
    Unknown,
}

impl Command {
    pub fn parse(event: &CommandEvent) -> Self {
        match event.command() {
            Some("start") => Self::Start,
            Some("help") => Self::Help,
            Some("reschedule") => Self::Reschedule,
            Some("unavailable") => Self::parse_period(event.text.trim()),
            _ => Self::Unknown,
        }
    }

    fn parse_period(text: &str) -> Self {
        let Some(caps) = UNAVAILABLE_RE.captures(text) else {
            return Self::InvalidPeriod;
        };
        let parse = |idx: usize| NaiveDate::parse_from_str(&caps[idx], "%Y-%m-%d").ok();
        match (parse(1), parse(2)) {
            (Some(from), Some(to)) if from <= to => Self::Unavailable { from, to },
            _ => Self::InvalidPeriod,
        }
    }
}

/// Confirmation for a recorded unavailability period
pub fn unavailable_ack(from: NaiveDate, to: NaiveDate) -> String {
    format!("Your unavailability from {} to {} has been noted.", from, to)
}
