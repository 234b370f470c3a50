//! Work hand-out for both phases, plus the run's failure latch.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Pending map inputs behind one lock. Each name is handed out exactly once.
#[derive(Debug, Default)]
pub struct FileQueue {
    pending: Mutex<VecDeque<String>>,
}

impl FileQueue {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { pending: Mutex::new(inputs.into_iter().map(Into::into).collect()) }
    }

    /// Pops the next input, or `None` when the map phase has no work left.
    pub fn claim_next_file(&self) -> Option<String> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
    }

    pub fn remaining(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Monotonic cursor handing partitions to reducer threads, guarded by its own lock
/// and never held while a partition lock is taken.
#[derive(Debug)]
pub struct JobCursor {
    next: Mutex<usize>,
    end: usize,
}

impl JobCursor {
    pub fn new(num_jobs: usize) -> Self {
        Self { next: Mutex::new(0), end: num_jobs }
    }

    /// Claims the next partition index; `None` once all `num_jobs` were handed out.
    pub fn claim_next(&self) -> Option<usize> {
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        if *next >= self.end {
            return None;
        }
        let job = *next;
        *next += 1;
        Some(job)
    }

    pub fn position(&self) -> usize {
        *self.next.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps the first fatal error of a run; workers stop claiming work once it is set.
#[derive(Debug, Default)]
pub struct FirstFailure {
    set: AtomicBool,
    error: Mutex<Option<anyhow::Error>>,
}

impl FirstFailure {
    pub fn record(&self, err: anyhow::Error) {
        let mut slot = self.error.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err);
        }
        self.set.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    pub fn take(&self) -> Option<anyhow::Error> {
        self.error.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}
