//! Lazy k-way merge of per-source timelines and the resumable cursor over it.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::iter::Fuse;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::event::{Event, Timeline};

/// Merges N timelines (each ascending by begin) into one ascending stream.
///
/// Only the front event of each source sits in the heap, so pulling an event
/// costs O(log N) and nothing is materialized up front. Ties on `begin` come
/// out in source order.
pub struct TimelineMerger {
    timelines: Arc<[Timeline]>,
    positions: Vec<usize>,
    heap: BinaryHeap<Reverse<(DateTime<Utc>, usize)>>,
}

impl TimelineMerger {
    pub fn new(timelines: Arc<[Timeline]>) -> Self {
        let positions = vec![0; timelines.len()];
        Self::with_positions(timelines, positions)
    }

    /// Merge starting, in each timeline, at the first event still running at `from`.
    pub fn starting_at(timelines: Arc<[Timeline]>, from: DateTime<Utc>) -> Self {
        let positions = timelines
            .iter()
            .map(|timeline| {
                timeline
                    .iter()
                    .position(|event| event.end > from)
                    .unwrap_or(timeline.len())
            })
            .collect();
        Self::with_positions(timelines, positions)
    }

    fn with_positions(timelines: Arc<[Timeline]>, positions: Vec<usize>) -> Self {
        let heap = positions
            .iter()
            .enumerate()
            .filter_map(|(source, &pos)| {
                timelines[source]
                    .get(pos)
                    .map(|event| Reverse((event.begin, source)))
            })
            .collect();

        TimelineMerger {
            timelines,
            positions,
            heap,
        }
    }
}

impl Iterator for TimelineMerger {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        let Reverse((_, source)) = self.heap.pop()?;
        let timeline = &self.timelines[source];
        let event = timeline[self.positions[source]];

        self.positions[source] += 1;
        if let Some(next) = timeline.get(self.positions[source]) {
            self.heap.push(Reverse((next.begin, source)));
        }

        Some(event)
    }
}

/// A resumable pointer into an event stream that remembers the last pulled event.
///
/// The availability computation for one day stops with the first event it
/// has not fully consumed still held here, and the next day picks it up
/// again through [`current`](HoldingCursor::current) without pulling twice.
pub struct HoldingCursor<I: Iterator<Item = Event>> {
    stream: Fuse<I>,
    last_value: Option<Event>,
    advanced: bool,
}

impl<I: Iterator<Item = Event>> HoldingCursor<I> {
    pub fn new(stream: I) -> Self {
        HoldingCursor {
            stream: stream.fuse(),
            last_value: None,
            advanced: false,
        }
    }

    /// Pull the next event. `None` once the stream is exhausted, and on every call after.
    pub fn advance(&mut self) -> Option<Event> {
        self.last_value = self.stream.next();
        self.advanced = true;
        self.last_value
    }

    /// The held event, pulling the first one if nothing was pulled yet.
    pub fn current(&mut self) -> Option<Event> {
        if self.advanced {
            self.last_value
        } else {
            self.advance()
        }
    }
}
