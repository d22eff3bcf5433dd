//! The owner's configuration file (`config.json` by default).

use std::path::Path;
use std::time::Duration;

use chrono::Weekday;
use chrono_tz::Tz;
use config::{Config, File, FileFormat};
use serde::{Deserialize, Deserializer, de};

use crate::error::{TalkToError, TalkToResult};
use crate::window::LocalWindow;

const DEFAULT_RECURRENCE_HORIZON_DAYS: u32 = 90;

fn default_recurrence_horizon_days() -> u32 {
    DEFAULT_RECURRENCE_HORIZON_DAYS
}

/// Availability windows for each day of the week, Monday first.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Vec<Vec<LocalWindow>>")]
pub struct WeekdayTemplate {
    days: [Vec<LocalWindow>; 7],
}

impl WeekdayTemplate {
    pub fn new(days: [Vec<LocalWindow>; 7]) -> Self {
        WeekdayTemplate { days }
    }

    /// A private copy of the windows configured for `weekday`.
    ///
    /// Callers shrink and drop windows while subtracting busy time, so they
    /// always get their own `Vec` rather than a view into the template.
    pub fn windows_for(&self, weekday: Weekday) -> Vec<LocalWindow> {
        self.days[weekday.num_days_from_monday() as usize].clone()
    }

    /// The first window that ends before it starts, with its weekday.
    fn inverted_window(&self) -> Option<(Weekday, LocalWindow)> {
        let mut weekday = Weekday::Mon;
        for windows in &self.days {
            if let Some(window) = windows.iter().find(|w| w.end < w.start) {
                return Some((weekday, *window));
            }
            weekday = weekday.succ();
        }
        None
    }
}

impl TryFrom<Vec<Vec<LocalWindow>>> for WeekdayTemplate {
    type Error = TalkToError;

    fn try_from(days: Vec<Vec<LocalWindow>>) -> TalkToResult<Self> {
        let count = days.len();
        let days: [Vec<LocalWindow>; 7] = days.try_into().map_err(|_| {
            TalkToError::Config(format!(
                "weekday_availability must have 7 entries (Monday to Sunday), got {}",
                count
            ))
        })?;
        Ok(WeekdayTemplate { days })
    }
}

/// Everything the service needs to know about its owner.
#[derive(Debug, Clone, Deserialize)]
pub struct TalkToConfig {
    /// Feed URLs, one per published calendar.
    pub calendars: Vec<String>,

    /// Delay between two refresh rounds.
    #[serde(deserialize_with = "deserialize_refresh_delay")]
    pub refresh_delay: Duration,

    #[serde(deserialize_with = "deserialize_timezone")]
    pub timezone: Tz,

    pub weekday_availability: WeekdayTemplate,

    /// How far ahead recurring events are expanded when a feed is parsed.
    #[serde(default = "default_recurrence_horizon_days")]
    pub recurrence_horizon_days: u32,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub links: Vec<serde_json::Value>,
}

impl TalkToConfig {
    /// Load and validate a config file. The format follows the file extension.
    pub fn from_file(path: &Path) -> TalkToResult<Self> {
        if !path.exists() {
            return Err(TalkToError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        Self::build(Config::builder().add_source(File::from(path.to_path_buf())))
    }

    /// Load and validate a config from a JSON document.
    pub fn from_json(content: &str) -> TalkToResult<Self> {
        Self::build(Config::builder().add_source(File::from_str(content, FileFormat::Json)))
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> TalkToResult<Self> {
        let config: TalkToConfig = builder
            .build()
            .map_err(|e| TalkToError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| TalkToError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> TalkToResult<()> {
        if self.refresh_delay.is_zero() {
            return Err(TalkToError::Config(
                "refresh_delay must be greater than zero".into(),
            ));
        }
        if let Some((weekday, window)) = self.weekday_availability.inverted_window() {
            return Err(TalkToError::Config(format!(
                "availability window {} on {} ends before it starts",
                window, weekday
            )));
        }
        if self.recurrence_horizon_days == 0 {
            return Err(TalkToError::Config(
                "recurrence_horizon_days must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// `refresh_delay` is either a number of seconds or a humantime string like `"15m"`.
fn deserialize_refresh_delay<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDelay {
        Seconds(u64),
        Human(String),
    }

    match RawDelay::deserialize(deserializer)? {
        RawDelay::Seconds(secs) => Ok(Duration::from_secs(secs)),
        RawDelay::Human(s) => humantime::parse_duration(&s)
            .map_err(|e| de::Error::custom(format!("invalid refresh_delay '{}': {}", s, e))),
    }
}

fn deserialize_timezone<'de, D>(deserializer: D) -> Result<Tz, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    name.parse::<Tz>()
        .map_err(|_| de::Error::custom(format!("unknown timezone '{}'", name)))
}
