//! Shared constants for end-to-end tests
//!
//! When test data changes (URLs, metadata, limits), update only this file.

#![allow(dead_code)]

// ============================================================================
// Test Data
// ============================================================================

pub const SONG_URL: &str = "https://music.youtube.com/watch?v=abc123";
pub const OTHER_SONG_URL: &str = "https://music.youtube.com/watch?v=def456";
pub const PLAYLIST_URL: &str = "https://music.youtube.com/playlist?list=OLAK5uy_test";

pub const ARTIST: &str = "Alice";
pub const ALBUM: &str = "First Album";

/// Message yt-dlp reports for unavailable videos
pub const DOWNLOAD_FAILURE: &str = "ERROR: [youtube] abc123: Video unavailable";

pub const CANCELLED_ERROR: &str = "Download cancelled by user";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Queue capacity of the test server
pub const TEST_QUEUE_CAPACITY: usize = 3;

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Maximum time to wait for the worker to reach an expected state (milliseconds)
pub const WORKER_TIMEOUT_MS: u64 = 5000;

/// Polling interval for /status (milliseconds)
pub const STATUS_POLL_INTERVAL_MS: u64 = 20;
