//! Delayed responses
//!
//! Responses with a delay are parked here and released by the coordinator's
//! tick once due. Nothing in here sleeps or spawns.

use std::time::Instant;

/// A response waiting for its due time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledResponse {
    pub due: Instant,
    /// Insertion order, breaks ties between equal due times
    pub sequence: u64,
    pub rule: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct ResponseSchedule {
    /// Sorted by (due, sequence)
    entries: Vec<ScheduledResponse>,
    next_sequence: u64,
}

impl ResponseSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Instant, rule: impl Into<String>, bytes: Vec<u8>) {
        let entry = ScheduledResponse {
            due,
            sequence: self.next_sequence,
            rule: rule.into(),
            bytes,
        };
        self.next_sequence += 1;
        let index = self
            .entries
            .partition_point(|e| (e.due, e.sequence) <= (entry.due, entry.sequence));
        self.entries.insert(index, entry);
    }

    /// Remove and return every entry due at or before `now`, in order.
    pub fn take_due(&mut self, now: Instant) -> Vec<ScheduledResponse> {
        let split = self.entries.partition_point(|e| e.due <= now);
        self.entries.drain(..split).collect()
    }

    /// Earliest pending due time
    pub fn next_due(&self) -> Option<Instant> {
        self.entries.first().map(|e| e.due)
    }

    /// Cancel everything. Returns how many responses were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
