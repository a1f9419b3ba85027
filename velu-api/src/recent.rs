//! The in-memory ring `GET /tasks` serves from, so a poll doesn't cost a database query.
//!
//! Write-append / read-snapshot, guarded by a plain mutex since writes are short and rare.

use std::collections::VecDeque;
use std::sync::Mutex;

use queue_core::Job;

const CAPACITY: usize = 100;

pub struct RecentRing {
    jobs: Mutex<VecDeque<Job>>,
}

impl RecentRing {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(VecDeque::with_capacity(CAPACITY)),
        }
    }

    /// Records a newly accepted job. Evicts the oldest entry once at capacity.
    pub fn push(&self, job: Job) {
        let mut jobs = self.jobs.lock().expect("poisoned recent-ring mutex");
        if jobs.len() == CAPACITY {
            jobs.pop_back();
        }
        jobs.push_front(job);
    }

    /// Newest-first snapshot, bounded by `limit`.
    pub fn snapshot(&self, limit: usize) -> Vec<Job> {
        let jobs = self.jobs.lock().expect("poisoned recent-ring mutex");
        jobs.iter().take(limit.max(1)).cloned().collect()
    }
}

impl Default for RecentRing {
    fn default() -> Self {
        Self::new()
    }
}
