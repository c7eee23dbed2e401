//! Time-ordered expiration schedule
//!
//! A min-heap of `(expires_at, key)` records. A record is pushed every time a
//! key is written with a TTL and is never removed eagerly, so the heap may
//! hold stale records for keys that were deleted or overwritten. Callers
//! compare a popped record against the live entry before acting on it.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// A pending expiration
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExpiryRecord {
    /// Expiration timestamp in Unix milliseconds
    pub expires_at: u64,
    pub key: String,
}

/// Min-ordered priority queue of expiry records
#[derive(Debug, Default, Clone)]
pub struct ExpirySchedule {
    heap: BinaryHeap<Reverse<ExpiryRecord>>,
}

impl ExpirySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: String, expires_at: u64) {
        self.heap.push(Reverse(ExpiryRecord { expires_at, key }));
    }

    /// Earliest scheduled expiry, stale or not
    pub fn next_deadline(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse(record)| record.expires_at)
    }

    /// Pop the earliest record if it is due at `now`
    pub fn pop_due(&mut self, now: u64) -> Option<ExpiryRecord> {
        if self.next_deadline()? <= now {
            self.heap.pop().map(|Reverse(record)| record)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Records in ascending expiry order
    pub fn to_sorted_vec(&self) -> Vec<ExpiryRecord> {
        let mut records: Vec<ExpiryRecord> =
            self.heap.iter().map(|Reverse(record)| record.clone()).collect();
        records.sort_unstable();
        records
    }
}

impl FromIterator<ExpiryRecord> for ExpirySchedule {
    fn from_iter<I: IntoIterator<Item = ExpiryRecord>>(iter: I) -> Self {
        Self {
            heap: iter.into_iter().map(Reverse).collect(),
        }
    }
}
