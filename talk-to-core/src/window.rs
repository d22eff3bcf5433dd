//! Wall-clock availability windows.

use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{TalkToError, TalkToResult};

const HHMM: &str = "%H:%M";

/// A wall-clock `[start, end)` slot in the owner's timezone.
///
/// Serialized as a `["HH:MM", "HH:MM"]` pair, which is both the config file
/// format and the shape returned by the availability endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(String, String)", into = "(String, String)")]
pub struct LocalWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl LocalWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        LocalWindow { start, end }
    }

    /// Parse a window from two `HH:MM` strings.
    pub fn parse(start: &str, end: &str) -> TalkToResult<Self> {
        Ok(LocalWindow {
            start: parse_hhmm(start)?,
            end: parse_hhmm(end)?,
        })
    }

    /// A window that does not end after it starts holds no time at all.
    pub fn is_degenerate(&self) -> bool {
        self.end <= self.start
    }

    pub fn start_hhmm(&self) -> String {
        self.start.format(HHMM).to_string()
    }

    pub fn end_hhmm(&self) -> String {
        self.end.format(HHMM).to_string()
    }
}

impl fmt::Display for LocalWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_hhmm(), self.end_hhmm())
    }
}

impl TryFrom<(String, String)> for LocalWindow {
    type Error = TalkToError;

    fn try_from((start, end): (String, String)) -> TalkToResult<Self> {
        LocalWindow::parse(&start, &end)
    }
}

impl From<LocalWindow> for (String, String) {
    fn from(window: LocalWindow) -> Self {
        (window.start_hhmm(), window.end_hhmm())
    }
}

fn parse_hhmm(s: &str) -> TalkToResult<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), HHMM)
        .map_err(|_| TalkToError::Config(format!("Invalid time '{}'. Expected HH:MM", s)))
}
