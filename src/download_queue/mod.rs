//! Bounded download queue, its shared status and the background worker.

mod cancel;
mod models;
mod queue;
mod service;
#[cfg(test)]
pub(crate) mod testing;
mod worker;

pub use cancel::CancelToken;
pub use models::*;
pub use queue::JobQueue;
pub use service::QueueService;
pub use worker::QueueWorker;
