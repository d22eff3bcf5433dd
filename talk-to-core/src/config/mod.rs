//! Configuration types for talk-to.

mod store;
mod talk_to_config;

pub use store::ConfigStore;
pub use talk_to_config::{TalkToConfig, WeekdayTemplate};
