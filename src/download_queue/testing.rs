//! Scripted collaborators for queue and worker tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use super::models::TrackMetadata;
use crate::downloader::{
    DownloadError, DownloadProgress, DownloadedFile, Downloader, ExtractError,
    MetadataExtractor, Phase, PlaylistInfo, PlaylistKind, PlaylistSong, ProgressTracker,
    TrackInfo,
};
use crate::library::{FeaturingInfo, OrganizeError, OrganizedFile, Organizer};

pub enum FakeDownload {
    Success,
    Failure(&'static str),
}

pub struct FakeDownloader {
    temp_dir: PathBuf,
    tracker: ProgressTracker,
    script: Mutex<VecDeque<FakeDownload>>,
    gate: Option<Arc<Semaphore>>,
    calls: Mutex<Vec<String>>,
}

impl FakeDownloader {
    pub fn new(temp_dir: &Path) -> Self {
        Self {
            temp_dir: temp_dir.to_path_buf(),
            tracker: ProgressTracker::new(),
            script: Mutex::new(VecDeque::new()),
            gate: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every download waits for a permit on the returned semaphore.
    pub fn gated(temp_dir: &Path) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let mut downloader = Self::new(temp_dir);
        downloader.gate = Some(gate.clone());
        (downloader, gate)
    }

    pub fn push(&self, outcome: FakeDownload) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(
        &self,
        url: &str,
        metadata: &TrackMetadata,
    ) -> Result<DownloadedFile, DownloadError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.tracker.start();
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FakeDownload::Success);
        match outcome {
            FakeDownload::Success => {
                let path = self
                    .temp_dir
                    .join(format!("{} - {}.mp3", metadata.artist, metadata.title));
                std::fs::write(&path, b"ID3")?;
                std::fs::write(path.with_extension("jpg"), b"thumb")?;
                self.tracker.set_phase(Phase::Completed);
                Ok(DownloadedFile { path })
            }
            FakeDownload::Failure(message) => {
                self.tracker.set_phase(Phase::Error);
                Err(DownloadError::ToolFailed(message.to_string()))
            }
        }
    }

    fn progress(&self) -> DownloadProgress {
        self.tracker.snapshot()
    }

    fn reset_progress(&self) {
        self.tracker.reset();
    }
}

#[derive(Debug, Clone)]
pub struct OrganizeCall {
    pub file: PathBuf,
    pub metadata: TrackMetadata,
    pub featuring: FeaturingInfo,
}

#[derive(Default)]
pub struct FakeOrganizer {
    fail_with: Mutex<VecDeque<Option<&'static str>>>,
    calls: Mutex<Vec<OrganizeCall>>,
}

impl FakeOrganizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_failure(&self, message: &'static str) {
        self.fail_with.lock().unwrap().push_back(Some(message));
    }

    pub fn push_success(&self) {
        self.fail_with.lock().unwrap().push_back(None);
    }

    pub fn calls(&self) -> Vec<OrganizeCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Organizer for FakeOrganizer {
    async fn organize(
        &self,
        file: &DownloadedFile,
        metadata: &TrackMetadata,
        featuring: &FeaturingInfo,
    ) -> Result<OrganizedFile, OrganizeError> {
        self.calls.lock().unwrap().push(OrganizeCall {
            file: file.path.clone(),
            metadata: metadata.clone(),
            featuring: featuring.clone(),
        });
        if let Some(Some(message)) = self.fail_with.lock().unwrap().pop_front() {
            return Err(OrganizeError::Io(std::io::Error::other(message)));
        }
        let final_path = format!(
            "{}/{}/{}.mp3",
            featuring.main_artist, metadata.album, featuring.clean_title
        );
        Ok(OrganizedFile {
            absolute_path: PathBuf::from("/music").join(&final_path),
            final_path,
        })
    }
}

/// Canned yt-dlp metadata. With `fail` set every lookup errors out.
#[derive(Default)]
pub struct FakeExtractor {
    pub fail: bool,
}

#[async_trait]
impl MetadataExtractor for FakeExtractor {
    async fn extract_track(&self, _url: &str) -> Result<TrackInfo, ExtractError> {
        if self.fail {
            return Err(ExtractError::ToolFailed("Video unavailable".to_string()));
        }
        Ok(TrackInfo {
            title: "Song (feat. Bob)".to_string(),
            artist: "Alice".to_string(),
            album: "Album".to_string(),
            year: "2021".to_string(),
            thumbnail_url: "https://i.ytimg.com/vi/abc/maxresdefault.jpg".to_string(),
            duration: 200,
        })
    }

    async fn extract_playlist(&self, url: &str) -> Result<PlaylistInfo, ExtractError> {
        if self.fail {
            return Err(ExtractError::NotAPlaylist);
        }
        let songs: Vec<PlaylistSong> = (1..=2)
            .map(|n| PlaylistSong {
                title: format!("Track {}", n),
                artist: "Alice".to_string(),
                url: format!("{}&index={}", url, n),
                id: Some(format!("id{}", n)),
                duration: 100,
            })
            .collect();
        Ok(PlaylistInfo {
            kind: PlaylistKind::Album,
            title: "Album".to_string(),
            artist: "Alice".to_string(),
            year: "2021".to_string(),
            total_songs: songs.len(),
            total_duration: 200,
            songs,
        })
    }
}
