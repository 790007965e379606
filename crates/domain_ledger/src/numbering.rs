//! Per-owner, per-day document numbers
//!
//! Numbers look like `RCP-20240401-0001`: prefix, business date, and a
//! four-digit counter that restarts every day for every owner.

use chrono::NaiveDate;
use std::collections::HashMap;

use core_kernel::OwnerId;

/// Key of one counter
pub type SequenceKey = (OwnerId, String, NaiveDate);

/// Daily counters for every owner and prefix
#[derive(Debug, Clone, Default)]
pub struct DocumentSequences {
    counters: HashMap<SequenceKey, u32>,
}

impl DocumentSequences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next number for `prefix` on `date`
    pub fn next(&mut self, owner: OwnerId, prefix: &str, date: NaiveDate) -> String {
        let counter = self
            .counters
            .entry((owner, prefix.to_string(), date))
            .or_insert(0);
        *counter += 1;
        format_number(prefix, date, *counter)
    }

    /// Current value of a counter, if it has been used
    pub fn current(&self, key: &SequenceKey) -> Option<u32> {
        self.counters.get(key).copied()
    }

    /// Seeds a counter when loading persisted documents
    pub fn seed(&mut self, key: SequenceKey, value: u32) {
        let counter = self.counters.entry(key).or_insert(0);
        *counter = (*counter).max(value);
    }

    pub(crate) fn restore(&mut self, key: SequenceKey, prior: Option<u32>) {
        match prior {
            Some(value) => {
                self.counters.insert(key, value);
            }
            None => {
                self.counters.remove(&key);
            }
        }
    }
}

pub fn format_number(prefix: &str, date: NaiveDate, counter: u32) -> String {
    format!("{}-{}-{:04}", prefix, date.format("%Y%m%d"), counter)
}
