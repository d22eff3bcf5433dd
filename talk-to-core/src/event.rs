//! Busy events as they come out of a calendar feed.
//!
//! Feeds carry a lot more than time spans (summaries, attendees, alarms), but
//! availability only needs to know when the owner is busy, so an `Event` is
//! reduced to its absolute `[begin, end)` interval.

use chrono::{DateTime, Utc};

/// A busy interval `[begin, end)` from one calendar source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Event {
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Event {
    pub fn new(begin: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Event { begin, end }
    }
}

/// One source's events, ascending by `begin`.
pub type Timeline = Vec<Event>;
