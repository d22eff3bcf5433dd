//! Error types for talk-to operations.

use thiserror::Error;

/// Errors that can occur while loading config, ingesting feeds or answering queries.
#[derive(Error, Debug)]
pub enum TalkToError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to fetch calendar {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("Recurrence error: {0}")]
    Recurrence(String),

    #[error("Calendars have not been loaded yet")]
    NotReady,

    #[error("Invalid date range: {0}")]
    InvalidRange(String),
}

/// Result type alias for talk-to operations.
pub type TalkToResult<T> = Result<T, TalkToError>;
