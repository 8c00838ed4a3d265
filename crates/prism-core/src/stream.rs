//! # Command Stream
//!
//! Append-only log of [`WorkloadRecord`]s owned by one command buffer.

use alloc::vec::Vec;

use crate::labels::Labels;
use crate::workload::{Workload, WorkloadRecord};

/// Ordered workload log for one recording buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandStream {
    records: Vec<WorkloadRecord>,
}

impl CommandStream {
    /// Create an empty stream
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Append a record, returning its position
    pub fn push(&mut self, workload: Workload, labels: Labels) -> usize {
        self.records.push(WorkloadRecord::new(workload, labels));
        self.records.len() - 1
    }

    /// Append copies of another stream's records (secondary execution)
    pub fn extend_from(&mut self, other: &CommandStream) {
        self.records.extend_from_slice(&other.records);
    }

    /// Drop every record (buffer reset or re-record)
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get a record by position
    pub fn get(&self, index: usize) -> Option<&WorkloadRecord> {
        self.records.get(index)
    }

    /// Get a record mutably by position
    pub fn get_mut(&mut self, index: usize) -> Option<&mut WorkloadRecord> {
        self.records.get_mut(index)
    }

    /// Iterate in issue order
    pub fn iter(&self) -> core::slice::Iter<'_, WorkloadRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a CommandStream {
    type Item = &'a WorkloadRecord;
    type IntoIter = core::slice::Iter<'a, WorkloadRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
