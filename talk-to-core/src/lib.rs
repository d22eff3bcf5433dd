//! Core of talk-to: when is the owner free?
//!
//! The owner publishes calendars as feed URLs. This crate periodically
//! fetches every feed, merges the busy events into one chronological stream
//! and subtracts them from per-weekday availability templates:
//! - `config` for the reloadable owner configuration
//! - `source` and `ics` for fetching and parsing feeds
//! - `scheduler` and `state` for the periodic refresh and its snapshots
//! - `merge` and `availability` for the free-time computation
//! - `service` for the [`TalkTo`] object the web layer talks to

pub mod availability;
pub mod config;
pub mod error;
pub mod event;
pub mod ics;
pub mod merge;
mod recurrence;
pub mod scheduler;
pub mod service;
pub mod source;
pub mod state;
pub mod window;
pub mod zone;

#[cfg(test)]
mod testing;

pub use config::{ConfigStore, TalkToConfig};
pub use error::{TalkToError, TalkToResult};
pub use event::{Event, Timeline};
pub use scheduler::RefreshStatus;
pub use service::{Availability, TalkTo};
pub use source::{CalendarSource, HttpCalendarSource};
pub use window::LocalWindow;
