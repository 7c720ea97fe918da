// SPDX-License-Identifier: MIT OR Apache-2.0
//! Worker status bookkeeping.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Snapshot of the worker's groups and their consumer loops.
///
/// Appended to while groups start, then read-only for the rest of the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerStatus {
    /// One entry per worker group.
    pub processes: Vec<ProcessStatus>,
}

/// One worker group: its host process id, group index, and loop ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessStatus {
    /// Host process id (shared by every in-process group).
    pub pid: u32,
    /// Zero-based group index.
    pub group: u32,
    /// Ids of the consumer loops in this group.
    pub workers: Vec<String>,
}

impl ProcessStatus {
    /// Create an empty entry for `group`.
    #[must_use]
    pub fn new(pid: u32, group: u32) -> Self {
        Self {
            pid,
            group,
            workers: Vec::new(),
        }
    }

    /// Register a consumer loop and return its generated id.
    pub fn add_worker(&mut self) -> String {
        let id = format!("worker-{}", Uuid::new_v4());
        self.workers.push(id.clone());
        id
    }
}

impl WorkerStatus {
    /// Total consumer loops across all groups.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.processes.iter().map(|p| p.workers.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_worker_generates_unique_ids() {
        let mut process = ProcessStatus::new(42, 0);
        let a = process.add_worker();
        let b = process.add_worker();
        assert_ne!(a, b);
        assert!(a.starts_with("worker-"));
        assert_eq!(process.workers.len(), 2);
    }

    #[test]
    fn worker_count_sums_across_groups() {
        let mut status = WorkerStatus::default();
        let mut p0 = ProcessStatus::new(1, 0);
        p0.add_worker();
        p0.add_worker();
        let mut p1 = ProcessStatus::new(1, 1);
        p1.add_worker();
        status.processes.push(p0);
        status.processes.push(p1);
        assert_eq!(status.worker_count(), 3);
    }

    #[test]
    fn status_serializes() {
        let mut status = WorkerStatus::default();
        status.processes.push(ProcessStatus::new(7, 0));
        let json = serde_json::to_string(&status).unwrap();
        let back: WorkerStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }
}
