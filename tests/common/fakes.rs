//! In-process stand-in for yt-dlp
//!
//! Downloads write a small placeholder MP3 (plus a thumbnail) into the temp
//! directory, so the real library organizer runs on the result. A gated
//! instance holds every download until the test releases it.

use async_trait::async_trait;
use songsurf_server::download_queue::TrackMetadata;
use songsurf_server::downloader::{
    DownloadError, DownloadProgress, DownloadedFile, Downloader, ExtractError, MetadataExtractor,
    Phase, PlaylistInfo, PlaylistKind, PlaylistSong, ProgressTracker, TrackInfo,
};
use songsurf_server::library::sanitize_filename;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::Semaphore;

use super::constants::*;

pub struct FakeYtDlp {
    temp_dir: PathBuf,
    tracker: ProgressTracker,
    gate: Option<Semaphore>,
    failures: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeYtDlp {
    pub fn new(temp_dir: PathBuf, gated: bool) -> Self {
        Self {
            temp_dir,
            tracker: ProgressTracker::new(),
            gate: gated.then(|| Semaphore::new(0)),
            failures: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Lets one held download finish.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// The next download fails with `message`.
    pub fn fail_next(&self, message: &str) {
        self.failures.lock().unwrap().push_back(message.to_string());
    }

    /// URLs passed to `download`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for FakeYtDlp {
    async fn download(
        &self,
        url: &str,
        metadata: &TrackMetadata,
    ) -> Result<DownloadedFile, DownloadError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.tracker.start();
        self.tracker.update(512, Some(1024), Some(2048.0), Some(1));

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| DownloadError::Launch(e.to_string()))?
                .forget();
        }

        if let Some(message) = self.failures.lock().unwrap().pop_front() {
            self.tracker.set_phase(Phase::Error);
            return Err(DownloadError::ToolFailed(message));
        }

        let stem = sanitize_filename(&format!("{} - {}", metadata.artist, metadata.title));
        let path = self.temp_dir.join(format!("{}.mp3", stem));
        std::fs::write(&path, b"ID3 placeholder audio")?;
        std::fs::write(self.temp_dir.join(format!("{}.jpg", stem)), b"not a jpeg")?;
        self.tracker.finish_download();
        self.tracker.set_phase(Phase::Completed);
        Ok(DownloadedFile { path })
    }

    fn progress(&self) -> DownloadProgress {
        self.tracker.snapshot()
    }

    fn reset_progress(&self) {
        self.tracker.reset();
    }
}

#[async_trait]
impl MetadataExtractor for FakeYtDlp {
    async fn extract_track(&self, url: &str) -> Result<TrackInfo, ExtractError> {
        if let Some(message) = self.failures.lock().unwrap().pop_front() {
            return Err(ExtractError::ToolFailed(message));
        }
        Ok(TrackInfo {
            title: format!("Song for {}", url),
            artist: ARTIST.to_string(),
            album: ALBUM.to_string(),
            year: "2024".to_string(),
            thumbnail_url: "https://i.ytimg.com/vi/abc123/maxresdefault.jpg".to_string(),
            duration: 180,
        })
    }

    async fn extract_playlist(&self, url: &str) -> Result<PlaylistInfo, ExtractError> {
        if let Some(message) = self.failures.lock().unwrap().pop_front() {
            return Err(ExtractError::ToolFailed(message));
        }
        let songs: Vec<PlaylistSong> = ["Intro", "Second Song", "Outro"]
            .iter()
            .enumerate()
            .map(|(i, title)| PlaylistSong {
                title: title.to_string(),
                artist: ARTIST.to_string(),
                url: format!("{}&index={}", url, i + 1),
                id: Some(format!("vid{}", i + 1)),
                duration: 120,
            })
            .collect();
        Ok(PlaylistInfo {
            kind: PlaylistKind::Album,
            title: ALBUM.to_string(),
            artist: ARTIST.to_string(),
            year: "2024".to_string(),
            total_songs: songs.len(),
            total_duration: 360,
            songs,
        })
    }
}
