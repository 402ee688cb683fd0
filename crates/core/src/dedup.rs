//! New-event detection and unique-event views over the acquisition log.
//!
//! The poll loop and the summary queries look at the same array in two
//! unrelated ways. Delta mode treats it as an append-only log and returns the
//! suffix since the last poll. Unique-summary mode collapses events sharing an
//! `(item, location)` pair; the ascending variant keeps the earliest event of a
//! pair, the recent variant keeps the latest.

use crate::types::{AcquisitionEvent, EventPair};
use std::collections::HashSet;

/// Events appended since the previous poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Delta<'a> {
    /// New events, in file order.
    pub events: &'a [AcquisitionEvent],
    /// Array length observed by this poll.
    pub observed_len: usize,
    /// The array shrank: the file was replaced or truncated.
    pub reset: bool,
}

impl Delta<'_> {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Suffix of `events` past `seen_count`.
///
/// When the array is not longer than `seen_count` the delta is empty. A
/// shorter array is flagged as a reset rather than diffed.
pub fn delta(events: &[AcquisitionEvent], seen_count: usize) -> Delta<'_> {
    let observed_len = events.len();
    if observed_len <= seen_count {
        return Delta {
            events: &[],
            observed_len,
            reset: observed_len < seen_count,
        };
    }
    Delta {
        events: &events[seen_count..],
        observed_len,
        reset: false,
    }
}

/// Number of events handled by the previous poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeenCounter(usize);

impl SeenCounter {
    pub fn new(initial: usize) -> Self {
        Self(initial)
    }

    pub fn value(&self) -> usize {
        self.0
    }

    /// Record that a poll's delta has been fully handled.
    pub fn commit(&mut self, delta: &Delta<'_>) {
        self.0 = delta.observed_len;
    }

    /// Forget history and treat `len` events as already announced.
    pub fn reset(&mut self, len: usize) {
        self.0 = len;
    }
}

/// Events sorted by sequence index ascending, first occurrence of each pair kept.
pub fn unique_ascending(events: &[AcquisitionEvent]) -> Vec<&AcquisitionEvent> {
    let mut sorted: Vec<&AcquisitionEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.sequence_index);
    first_per_pair(sorted, usize::MAX)
}

/// Most recent unique events: sequence index descending, at most `limit`.
///
/// Events with equal indexes keep their file order.
pub fn unique_recent(events: &[AcquisitionEvent], limit: usize) -> Vec<&AcquisitionEvent> {
    let mut sorted: Vec<&AcquisitionEvent> = events.iter().collect();
    sorted.sort_by_key(|e| std::cmp::Reverse(e.sequence_index));
    first_per_pair(sorted, limit)
}

fn first_per_pair(sorted: Vec<&AcquisitionEvent>, limit: usize) -> Vec<&AcquisitionEvent> {
    let mut seen: HashSet<EventPair> = HashSet::new();
    let mut unique = Vec::new();
    for event in sorted {
        if unique.len() >= limit {
            break;
        }
        if seen.insert(event.pair()) {
            unique.push(event);
        }
    }
    unique
}
