//! The service object tying config, shared state and the refresh scheduler together.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use tracing::info;

use crate::availability::date_availability;
use crate::config::{ConfigStore, TalkToConfig};
use crate::error::{TalkToError, TalkToResult};
use crate::merge::{HoldingCursor, TimelineMerger};
use crate::scheduler::{RefreshScheduler, RefreshStatus};
use crate::source::CalendarSource;
use crate::state::SharedCalendarState;
use crate::window::LocalWindow;
use crate::zone::anchor;

/// Longest range a single availability query may cover.
pub const MAX_RANGE_DAYS: i64 = 60;

/// Free windows for each date of a requested range.
#[derive(Debug, Clone)]
pub struct Availability {
    pub per_date: Vec<(NaiveDate, Vec<LocalWindow>)>,
    /// When the calendars behind this answer were fetched.
    pub last_update: DateTime<Utc>,
    pub timezone: Tz,
    /// The zone's current UTC offset, e.g. `+0100`.
    pub timezone_offset: String,
}

/// One owner's availability service.
///
/// Constructed once at startup and shared by reference with the web layer.
pub struct TalkTo {
    config: Arc<ConfigStore>,
    state: Arc<SharedCalendarState>,
    scheduler: RefreshScheduler,
}

impl TalkTo {
    pub fn new(config: ConfigStore, source: Arc<dyn CalendarSource>) -> Self {
        let config = Arc::new(config);
        let state = Arc::new(SharedCalendarState::new());
        let scheduler = RefreshScheduler::new(config.clone(), state.clone(), source);

        TalkTo {
            config,
            state,
            scheduler,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> Arc<TalkToConfig> {
        self.config.current()
    }

    /// Launch the periodic refresh.
    pub fn start(&self) {
        self.scheduler.start();
    }

    /// Reload the config file, then restart the refresh chain in the background.
    ///
    /// A config that fails to load is reported and the refresh chain is left alone.
    pub fn reload(&self) -> TalkToResult<()> {
        self.config.reload()?;
        let generation = self.scheduler.restart();
        info!(generation, "reloaded, refresh restarted");
        Ok(())
    }

    pub fn refresh_status(&self) -> Option<RefreshStatus> {
        self.scheduler.status()
    }

    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    /// Free windows for every date from `start` to `end`, both included.
    ///
    /// One merged event stream is walked once for the whole range: each date
    /// resumes where the previous one stopped.
    pub async fn compute_availability(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> TalkToResult<Availability> {
        if end < start {
            return Err(TalkToError::InvalidRange(format!(
                "end date {} is before start date {}",
                end, start
            )));
        }
        if (end - start).num_days() > MAX_RANGE_DAYS {
            return Err(TalkToError::InvalidRange(format!(
                "cannot show availability for more than {} days",
                MAX_RANGE_DAYS
            )));
        }

        let snapshot = self.state.snapshot().await.ok_or(TalkToError::NotReady)?;
        let config = self.config.current();
        let tz = config.timezone;

        let from = anchor(tz, start.and_time(NaiveTime::MIN));
        let mut cursor =
            HoldingCursor::new(TimelineMerger::starting_at(snapshot.timelines.clone(), from));

        let per_date = start
            .iter_days()
            .take_while(|date| *date <= end)
            .map(|date| {
                let windows = config.weekday_availability.windows_for(date.weekday());
                (date, date_availability(date, windows, &mut cursor, tz))
            })
            .collect();

        Ok(Availability {
            per_date,
            last_update: snapshot.last_update,
            timezone: tz,
            timezone_offset: Utc::now().with_timezone(&tz).format("%z").to_string(),
        })
    }
}
