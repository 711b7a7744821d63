//! Bounded FIFO of pending jobs.
//!
//! Producers never wait: a push on a full queue is rejected. The single
//! consumer parks on `pop` until a job arrives.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

use super::models::{Job, QueueError};

struct QueueInner {
    jobs: VecDeque<Job>,
    /// Jobs pushed but not yet marked done via `task_done`.
    unfinished: usize,
}

pub struct JobQueue {
    capacity: usize,
    inner: Mutex<QueueInner>,
    available: Notify,
    drained: Notify,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(QueueInner {
                jobs: VecDeque::with_capacity(capacity),
                unfinished: 0,
            }),
            available: Notify::new(),
            drained: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().jobs.is_empty()
    }

    /// Appends a job and returns its 1-based position.
    pub fn try_push(&self, job: Job) -> Result<usize, QueueError> {
        let position = {
            let mut inner = self.lock();
            if inner.jobs.len() >= self.capacity {
                return Err(QueueError::QueueFull {
                    capacity: self.capacity,
                });
            }
            inner.jobs.push_back(job);
            inner.unfinished += 1;
            inner.jobs.len()
        };
        self.available.notify_one();
        Ok(position)
    }

    pub fn try_pop(&self) -> Option<Job> {
        self.lock().jobs.pop_front()
    }

    /// Waits until a job is available and removes it.
    pub async fn pop(&self) -> Job {
        loop {
            let notified = self.available.notified();
            if let Some(job) = self.try_pop() {
                return job;
            }
            notified.await;
        }
    }

    /// Marks a previously popped job as fully processed.
    pub fn task_done(&self) {
        let all_done = {
            let mut inner = self.lock();
            inner.unfinished = inner.unfinished.saturating_sub(1);
            inner.unfinished == 0
        };
        if all_done {
            self.drained.notify_waiters();
        }
    }

    /// Waits until every pushed job has been marked done.
    pub async fn join(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.lock().unfinished == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Copies the queued jobs in dequeue order.
    pub fn snapshot(&self) -> Vec<Job> {
        self.lock().jobs.iter().cloned().collect()
    }
}
