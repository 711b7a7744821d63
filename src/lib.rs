//! SongSurf Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod download_queue;
pub mod downloader;
pub mod library;
pub mod server;

// Re-export commonly used types for convenience
pub use download_queue::{QueueService, QueueWorker};
pub use downloader::{Downloader, YtDlpDownloader};
pub use library::{LibraryOrganizer, Organizer};
pub use server::{run_server, RequestsLoggingLevel};
