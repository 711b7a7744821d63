//! Data types shared by the queue, the worker and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::downloader::DownloadProgress;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Target tags for a track. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub artist: String,
    pub album: String,
    pub title: String,
    pub year: String,
}

impl Default for TrackMetadata {
    fn default() -> Self {
        Self {
            artist: UNKNOWN_ARTIST.to_string(),
            album: UNKNOWN_ALBUM.to_string(),
            title: UNKNOWN_TITLE.to_string(),
            year: String::new(),
        }
    }
}

impl TrackMetadata {
    /// Builds metadata from optional caller-provided fields. Missing or blank
    /// values get the placeholder for that field.
    pub fn from_fields(
        artist: Option<String>,
        album: Option<String>,
        title: Option<String>,
        year: Option<String>,
    ) -> Self {
        fn or_placeholder(value: Option<String>, placeholder: &str) -> String {
            match value {
                Some(v) if !v.trim().is_empty() => v.trim().to_string(),
                _ => placeholder.to_string(),
            }
        }

        Self {
            artist: or_placeholder(artist, UNKNOWN_ARTIST),
            album: or_placeholder(album, UNKNOWN_ALBUM),
            title: or_placeholder(title, UNKNOWN_TITLE),
            year: or_placeholder(year, ""),
        }
    }
}

/// Where a job sits inside the playlist it was enqueued from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistPosition {
    pub playlist_title: String,
    pub song_index: usize,
    pub total_songs: usize,
}

/// One requested download. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub url: String,
    pub metadata: TrackMetadata,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist: Option<PlaylistPosition>,
}

impl Job {
    pub fn new(url: impl Into<String>, metadata: TrackMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            metadata,
            submitted_at: Utc::now(),
            playlist: None,
        }
    }

    pub fn with_playlist(mut self, position: PlaylistPosition) -> Self {
        self.playlist = Some(position);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedRecord {
    /// Path of the organized file, relative to the music directory.
    pub final_path: String,
    pub metadata: TrackMetadata,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub error: String,
    pub metadata: TrackMetadata,
    pub timestamp: DateTime<Utc>,
}

/// Worker-owned state guarded by the service's status lock.
///
/// `in_progress` is true exactly when `current_job` is set.
#[derive(Debug, Clone, Default)]
pub(crate) struct DownloadStatus {
    pub in_progress: bool,
    pub current_job: Option<Job>,
    pub last_completed: Option<CompletedRecord>,
    pub last_error: Option<ErrorRecord>,
}

/// Point-in-time copy of the status served by `/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub in_progress: bool,
    pub current_job: Option<Job>,
    pub last_completed: Option<CompletedRecord>,
    pub last_error: Option<ErrorRecord>,
    /// Only present while a job is in progress.
    pub progress: Option<DownloadProgress>,
    pub queue_size: usize,
    pub queue: Vec<Job>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("{0}")]
    Validation(String),

    #[error("Queue is full ({capacity} downloads pending), try again later")]
    QueueFull { capacity: usize },
}

/// Terminal outcome of a failed job, recorded in `last_error`.
#[derive(Debug, Error)]
pub enum JobFailure {
    #[error("{0}")]
    Download(String),

    #[error("Download cancelled by user")]
    Cancelled,

    #[error("{0}")]
    Organize(String),

    #[error("Job aborted: {0}")]
    Aborted(String),
}
