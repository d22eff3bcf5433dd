//! Calendar feed parsing.
//!
//! Turns the text of an `.ics` feed into a [`Timeline`](crate::event::Timeline)
//! of busy intervals, sorted by begin.

mod parse;

pub use parse::{FeedOptions, parse_timeline};
pub(crate) use parse::FeedTime;
