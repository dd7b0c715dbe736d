//! Bounded in-memory history of trigger outcomes.

use super::types::{TriggerOutcome, TriggerRecord};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Fixed-capacity ledger; the oldest record is evicted first.
pub struct TriggerLedger {
    records: Mutex<VecDeque<TriggerRecord>>,
    capacity: usize,
}

impl TriggerLedger {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, record: TriggerRecord) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Most recent records, newest first
    pub fn recent(&self, limit: usize) -> Vec<TriggerRecord> {
        self.records
            .lock()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Time of the newest successful trigger still in the ledger
    pub fn last_triggered_at(&self) -> Option<DateTime<Utc>> {
        self.records
            .lock()
            .iter()
            .rev()
            .find(|r| r.outcome == TriggerOutcome::Triggered)
            .map(|r| r.at)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
