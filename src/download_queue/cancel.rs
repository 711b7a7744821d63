use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag for the job in progress.
///
/// Set by request handlers, cleared by the worker when a job starts, and
/// read by the worker only at its checkpoints.
#[derive(Debug, Default)]
pub struct CancelToken {
    requested: AtomicBool,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
