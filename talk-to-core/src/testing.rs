//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::io::{Seek, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};

use crate::config::{ConfigStore, TalkToConfig, WeekdayTemplate};
use crate::error::{TalkToError, TalkToResult};
use crate::event::{Event, Timeline};
use crate::ics::FeedOptions;
use crate::source::CalendarSource;
use crate::window::LocalWindow;

/// An in-memory source: each url maps to a timeline or an error message.
#[derive(Default)]
pub struct FakeSource {
    feeds: Mutex<HashMap<String, Result<Timeline, String>>>,
    latency: Mutex<Duration>,
    fetches: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, url: &str, feed: Result<Timeline, String>) {
        self.feeds.lock().unwrap().insert(url.to_string(), feed);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarSource for FakeSource {
    async fn fetch(&self, url: &str, _options: &FeedOptions) -> TalkToResult<Timeline> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let feed = self.feeds.lock().unwrap().get(url).cloned();
        match feed {
            Some(Ok(timeline)) => Ok(timeline),
            Some(Err(message)) => Err(TalkToError::Fetch {
                url: url.to_string(),
                message,
            }),
            None => Err(TalkToError::Fetch {
                url: url.to_string(),
                message: "404 Not Found".into(),
            }),
        }
    }
}

/// Monday 2024-01-15, the reference day of most tests.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
}

/// A busy hour on [`monday`] starting at `hour` UTC.
pub fn one_hour_event(hour: u32) -> Event {
    let begin = Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap();
    Event::new(begin, begin + chrono::Duration::hours(1))
}

/// Weekdays 09:00-12:00 and 13:00-17:00, weekends off.
pub fn office_hours() -> WeekdayTemplate {
    let workday = vec![
        LocalWindow::parse("09:00", "12:00").unwrap(),
        LocalWindow::parse("13:00", "17:00").unwrap(),
    ];
    WeekdayTemplate::new([
        workday.clone(),
        workday.clone(),
        workday.clone(),
        workday.clone(),
        workday,
        vec![],
        vec![],
    ])
}

pub fn config(urls: &[&str], refresh_delay: Duration) -> TalkToConfig {
    TalkToConfig {
        calendars: urls.iter().map(|u| u.to_string()).collect(),
        refresh_delay,
        timezone: chrono_tz::UTC,
        weekday_availability: office_hours(),
        recurrence_horizon_days: 90,
        name: None,
        email: None,
        links: vec![],
    }
}

pub fn config_store(urls: &[&str], refresh_delay: Duration) -> ConfigStore {
    ConfigStore::from_config(config(urls, refresh_delay))
}

/// A UTC config document with no availability windows and a one minute refresh delay.
pub fn config_json(urls: &[&str]) -> String {
    let calendars = serde_json::to_string(urls).unwrap();
    format!(
        r#"{{
            "calendars": {calendars},
            "refresh_delay": 60,
            "timezone": "UTC",
            "weekday_availability": [[], [], [], [], [], [], []]
        }}"#
    )
}

/// A temporary `.json` config file holding `content`.
pub fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write_config(&mut file, content);
    file
}

/// Replace the whole content of a config file in place.
pub fn write_config(file: &mut tempfile::NamedTempFile, content: &str) {
    let f = file.as_file_mut();
    f.set_len(0).unwrap();
    f.rewind().unwrap();
    f.write_all(content.as_bytes()).unwrap();
    f.flush().unwrap();
}
