use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::featuring::FeaturingInfo;
use super::stats::{self, LibraryStats, LibraryStructure};
use super::tags::{self, TagValues};
use crate::download_queue::{TrackMetadata, UNKNOWN_ALBUM, UNKNOWN_ARTIST, UNKNOWN_TITLE};
use crate::downloader::DownloadedFile;

const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizedFile {
    /// Relative to the music directory, always with `/` separators.
    pub final_path: String,
    pub absolute_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("Downloaded file not found: {}", .0.display())]
    MissingSource(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Organizer task failed: {0}")]
    Task(String),
}

#[async_trait]
pub trait Organizer: Send + Sync {
    async fn organize(
        &self,
        file: &DownloadedFile,
        metadata: &TrackMetadata,
        featuring: &FeaturingInfo,
    ) -> Result<OrganizedFile, OrganizeError>;
}

/// Removes characters that are not allowed in file names on common
/// filesystems and trims the result.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c) && !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

pub(super) fn sanitize_or(name: &str, placeholder: &str) -> String {
    let clean = sanitize_filename(name);
    // "." and ".." would escape the library layout
    if clean.is_empty() || clean.chars().all(|c| c == '.') {
        placeholder.to_string()
    } else {
        clean
    }
}

/// First free `<title>.mp3`, `<title> (1).mp3`, ... inside `dir`.
pub(super) fn unique_destination(dir: &Path, title: &str) -> PathBuf {
    let candidate = dir.join(format!("{}.mp3", title));
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| dir.join(format!("{} ({}).mp3", title, n)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Thumbnails yt-dlp wrote next to `audio`, sharing its file stem.
pub fn thumbnails_of(audio: &Path) -> Vec<PathBuf> {
    let (Some(stem), Some(dir)) = (audio.file_stem(), audio.parent()) else {
        return Vec::new();
    };
    let stem = stem.to_string_lossy();
    THUMBNAIL_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", stem, ext)))
        .filter(|p| p.is_file())
        .collect()
}

fn find_thumbnail(audio: &Path) -> Option<PathBuf> {
    thumbnails_of(audio).into_iter().next()
}

pub(super) fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    // rename fails across filesystems, e.g. temp on tmpfs
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to)?;
    std::fs::remove_file(from)
}

/// Files downloads into `<music>/<Artist>/<Album>/<Title>.mp3`.
#[derive(Debug, Clone)]
pub struct LibraryOrganizer {
    music_dir: PathBuf,
}

impl LibraryOrganizer {
    pub fn new(music_dir: PathBuf) -> Self {
        Self { music_dir }
    }

    pub fn music_dir(&self) -> &Path {
        &self.music_dir
    }

    pub fn stats(&self) -> LibraryStats {
        stats::library_stats(&self.music_dir)
    }

    pub fn library_structure(&self) -> LibraryStructure {
        stats::library_structure(&self.music_dir)
    }

    fn organize_blocking(
        &self,
        file: &DownloadedFile,
        metadata: &TrackMetadata,
        featuring: &FeaturingInfo,
    ) -> Result<OrganizedFile, OrganizeError> {
        if !file.path.is_file() {
            return Err(OrganizeError::MissingSource(file.path.clone()));
        }

        let title = if featuring.has_feat {
            format!(
                "{} (feat. {})",
                featuring.clean_title,
                featuring.feat_artists.join(", ")
            )
        } else {
            featuring.clean_title.clone()
        };
        let artist = sanitize_or(&featuring.main_artist, UNKNOWN_ARTIST);
        let album = sanitize_or(&metadata.album, UNKNOWN_ALBUM);
        let title = sanitize_or(&title, UNKNOWN_TITLE);

        let album_dir = self.music_dir.join(&artist).join(&album);
        std::fs::create_dir_all(&album_dir)?;
        let destination = unique_destination(&album_dir, &title);

        let thumbnail = find_thumbnail(&file.path);
        move_file(&file.path, &destination)?;
        debug!("Moved {:?} to {:?}", file.path, destination);

        let cover = thumbnail.as_deref().and_then(|path| match tags::cover_jpeg(path) {
            Ok(data) => Some(data),
            Err(err) => {
                warn!("Could not convert cover {:?}: {}", path, err);
                None
            }
        });
        let values = TagValues {
            title: &title,
            artist: &artist,
            album: &album,
            year: &metadata.year,
        };
        if let Err(err) = tags::write_tags(&destination, &values, cover) {
            warn!("Could not write tags to {:?}: {}", destination, err);
        }

        if let Some(thumbnail) = thumbnail {
            if let Err(err) = std::fs::remove_file(&thumbnail) {
                debug!("Could not remove thumbnail {:?}: {}", thumbnail, err);
            }
        }

        let file_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let final_path = format!("{}/{}/{}", artist, album, file_name);
        info!("Organized into {}", final_path);

        Ok(OrganizedFile {
            final_path,
            absolute_path: destination,
        })
    }
}

#[async_trait]
impl Organizer for LibraryOrganizer {
    async fn organize(
        &self,
        file: &DownloadedFile,
        metadata: &TrackMetadata,
        featuring: &FeaturingInfo,
    ) -> Result<OrganizedFile, OrganizeError> {
        let organizer = self.clone();
        let file = file.clone();
        let metadata = metadata.clone();
        let featuring = featuring.clone();
        tokio::task::spawn_blocking(move || {
            organizer.organize_blocking(&file, &metadata, &featuring)
        })
        .await
        .map_err(|e| OrganizeError::Task(e.to_string()))?
    }
}
