//! Subtracting busy events from a day's availability windows.

use std::collections::VecDeque;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::event::Event;
use crate::merge::HoldingCursor;
use crate::window::LocalWindow;
use crate::zone::anchor;

/// A window pinned to absolute instants on a given date.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Span {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Span {
    fn to_local(self, tz: Tz) -> LocalWindow {
        LocalWindow::new(
            self.start.with_timezone(&tz).time(),
            self.end.with_timezone(&tz).time(),
        )
    }
}

/// Free windows on `date`, given the windows configured for its weekday.
///
/// `windows` is this call's own copy of the template (sorted, non-overlapping)
/// and is consumed as a worklist. `cursor` must be positioned at or before
/// the first event that can touch `date`; on return it holds the first event
/// this day did not fully consume, so the next date can resume from it.
///
/// Windows are anchored to `date` in `tz` and compared with events in UTC.
/// Each step compares the current event with the front window and either
/// emits free time, shrinks or drops the window, or moves to the next event.
pub fn date_availability<I>(
    date: NaiveDate,
    windows: Vec<LocalWindow>,
    cursor: &mut HoldingCursor<I>,
    tz: Tz,
) -> Vec<LocalWindow>
where
    I: Iterator<Item = Event>,
{
    let mut pending: VecDeque<Span> = windows
        .into_iter()
        .filter_map(|window| anchor_window(date, window, tz))
        .collect();

    if pending.is_empty() {
        return Vec::new();
    }

    let mut free = Vec::new();
    let mut current = cursor.current();

    while let Some(window) = pending.front().copied() {
        // Nothing left in the stream: the rest of the day is free
        let Some(event) = current else {
            free.push(window);
            pending.pop_front();
            continue;
        };

        // -------WWWWWWWWWWWWW-------
        // --------------------EEEEE--
        if event.begin >= window.end {
            debug!(case = 1, ?window, ?event, "window ends before event");
            free.push(window);
            pending.pop_front();
            continue;
        }

        // -------WWWWWWWWWWWWW-------
        // --EEEEE--------------------
        if event.end <= window.start {
            debug!(case = 2, ?window, ?event, "event ends before window");
            current = cursor.advance();
            continue;
        }

        // -------WWWWWWWWWWWWW-------
        // -----EEEEEEEEEEEEEEEEE-----
        if event.begin <= window.start && event.end >= window.end {
            debug!(case = 3, ?window, ?event, "event covers window");
            pending.pop_front();
            if event.end == window.end {
                current = cursor.advance();
            }
            continue;
        }

        // -------WWWWWWWWWWWWW-------
        // -----EEEEEEEEEEE-----------
        if event.begin <= window.start {
            debug!(case = 4, ?window, ?event, "event covers window head");
            pending[0] = Span {
                start: event.end,
                end: window.end,
            };
            current = cursor.advance();
            continue;
        }

        // -------WWWWWWWWWWWWW-------
        // -----------EEEEEEEEEEE-----
        if event.end >= window.end {
            debug!(case = 5, ?window, ?event, "event covers window tail");
            free.push(Span {
                start: window.start,
                end: event.begin,
            });
            pending.pop_front();
            if event.end == window.end {
                current = cursor.advance();
            }
            continue;
        }

        // -------WWWWWWWWWWWWW-------
        // ----------EEEEEE-----------
        debug!(case = 6, ?window, ?event, "event inside window");
        free.push(Span {
            start: window.start,
            end: event.begin,
        });
        pending[0] = Span {
            start: event.end,
            end: window.end,
        };
        current = cursor.advance();
    }

    free.into_iter().map(|span| span.to_local(tz)).collect()
}

fn anchor_window(date: NaiveDate, window: LocalWindow, tz: Tz) -> Option<Span> {
    if window.is_degenerate() {
        warn!(%date, %window, "skipping availability window that holds no time");
        return None;
    }

    let span = Span {
        start: anchor(tz, date.and_time(window.start)),
        end: anchor(tz, date.and_time(window.end)),
    };
    if span.end <= span.start {
        warn!(%date, %window, "availability window collapses across a DST transition");
        return None;
    }
    Some(span)
}
