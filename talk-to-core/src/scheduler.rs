//! Periodic refresh of every calendar source.
//!
//! A launched refresh chain is one long-lived task: fetch all sources, swap
//! the shared state, sleep for the configured delay, repeat. A failed round
//! ends the chain and leaves the previous state in place until the next
//! [`RefreshScheduler::restart`]. Restarting cancels the chain that was
//! current and launches a fresh one that fetches immediately.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ConfigStore;
use crate::ics::FeedOptions;
use crate::source::{CalendarSource, fetch_all};
use crate::state::SharedCalendarState;

/// What the current refresh chain is doing.
///
/// A chain never finishes on its own while rounds succeed, so there is no
/// "completed" state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshStatus {
    Running,
    Failed(String),
    Cancelled,
}

/// Status of the most recently launched chain.
///
/// Every launch bumps the generation; writes tagged with an older generation
/// are dropped, so a superseded chain reporting its own cancellation never
/// overwrites the status of the chain that replaced it.
struct StatusCell {
    generation: AtomicU64,
    tx: watch::Sender<Option<RefreshStatus>>,
}

impl StatusCell {
    fn new() -> Self {
        StatusCell {
            generation: AtomicU64::new(0),
            tx: watch::Sender::new(None),
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn publish(&self, generation: u64, status: RefreshStatus) -> bool {
        self.tx.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *current = Some(status);
            true
        })
    }
}

/// Identifies one launched refresh chain.
struct RefreshHandle {
    generation: u64,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Best effort: the chain notices at its next suspension point.
    fn cancel(&self) {
        self.cancel.send_replace(true);
    }
}

struct Shared {
    config: Arc<ConfigStore>,
    state: Arc<SharedCalendarState>,
    source: Arc<dyn CalendarSource>,
    status: StatusCell,
}

pub struct RefreshScheduler {
    shared: Arc<Shared>,
    current: Mutex<Option<RefreshHandle>>,
}

impl RefreshScheduler {
    pub fn new(
        config: Arc<ConfigStore>,
        state: Arc<SharedCalendarState>,
        source: Arc<dyn CalendarSource>,
    ) -> Self {
        RefreshScheduler {
            shared: Arc::new(Shared {
                config,
                state,
                source,
                status: StatusCell::new(),
            }),
            current: Mutex::new(None),
        }
    }

    /// Launch the first chain. Returns its generation.
    pub fn start(&self) -> u64 {
        self.launch()
    }

    /// Cancel the current chain, if any, and launch a new one that fetches right away.
    ///
    /// Does not wait for anything: the new chain runs in the background.
    pub fn restart(&self) -> u64 {
        self.launch()
    }

    fn launch(&self) -> u64 {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);

        let generation = self.shared.status.next_generation();
        if let Some(previous) = current.take() {
            info!(generation = previous.generation, "cancelling refresh chain");
            previous.cancel();
        }
        self.shared.status.publish(generation, RefreshStatus::Running);

        let (cancel, cancelled) = watch::channel(false);
        let task = tokio::spawn(run_chain(self.shared.clone(), generation, cancelled));

        *current = Some(RefreshHandle {
            generation,
            cancel,
            task,
        });
        generation
    }

    /// Cancel the current chain and wait for its task to wind down.
    pub async fn shutdown(&self) {
        let handle = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            handle.cancel();
            if let Err(e) = handle.task.await {
                warn!(error = %e, "refresh task did not shut down cleanly");
            }
        }
    }

    /// Status of the current chain, `None` if none was launched yet.
    pub fn status(&self) -> Option<RefreshStatus> {
        self.shared.status.tx.borrow().clone()
    }

    /// Watch status changes of whichever chain is current.
    pub fn subscribe(&self) -> watch::Receiver<Option<RefreshStatus>> {
        self.shared.status.tx.subscribe()
    }
}

/// Resolves once the chain's handle is cancelled (or dropped).
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|cancelled| *cancelled).await;
}

async fn run_chain(shared: Arc<Shared>, generation: u64, mut cancel: watch::Receiver<bool>) {
    let mut first_run = true;

    loop {
        if !first_run {
            let delay = shared.config.current().refresh_delay;
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancelled(&mut cancel) => {
                    info!(generation, "refresh chain cancelled while waiting");
                    shared.status.publish(generation, RefreshStatus::Cancelled);
                    return;
                }
            }
        }
        first_run = false;

        // Read the config after the delay so a reload applies to this round
        let config = shared.config.current();
        let options = FeedOptions::new(config.timezone, Utc::now(), config.recurrence_horizon_days);
        info!(generation, sources = config.calendars.len(), "will refresh the calendars");

        let result = tokio::select! {
            result = fetch_all(shared.source.as_ref(), &config.calendars, &options) => result,
            _ = cancelled(&mut cancel) => {
                info!(generation, "refresh chain cancelled during fetch");
                shared.status.publish(generation, RefreshStatus::Cancelled);
                return;
            }
        };

        match result {
            Ok(timelines) => {
                if *cancel.borrow() {
                    shared.status.publish(generation, RefreshStatus::Cancelled);
                    return;
                }
                let events: usize = timelines.iter().map(Vec::len).sum();
                shared.state.replace(timelines, Utc::now()).await;
                info!(generation, events, "refreshed the calendars");
            }
            Err(e) => {
                error!(generation, error = %e, "calendar refresh failed, keeping previous calendars");
                shared.status.publish(generation, RefreshStatus::Failed(e.to_string()));
                return;
            }
        }
    }
}
