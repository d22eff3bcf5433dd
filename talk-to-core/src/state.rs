//! The last successfully refreshed set of timelines.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::event::Timeline;

/// One complete refresh round: a timeline per configured source.
#[derive(Debug)]
pub struct RefreshState {
    pub timelines: Arc<[Timeline]>,
    pub last_update: DateTime<Utc>,
}

/// Holds the current [`RefreshState`], replaced as a whole after each successful round.
///
/// Readers clone the `Arc` under the lock and release it right away; merging
/// and subtraction never run while the lock is held.
#[derive(Default)]
pub struct SharedCalendarState {
    current: Mutex<Option<Arc<RefreshState>>>,
}

impl SharedCalendarState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest complete round, or `None` before the first one succeeded.
    pub async fn snapshot(&self) -> Option<Arc<RefreshState>> {
        self.current.lock().await.clone()
    }

    pub async fn replace(&self, timelines: Vec<Timeline>, last_update: DateTime<Utc>) {
        let state = Arc::new(RefreshState {
            timelines: timelines.into(),
            last_update,
        });
        *self.current.lock().await = Some(state);
    }
}
