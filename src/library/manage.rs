//! Edits of an already organized library: moving, renaming and featuring
//! corrections, plus album cover lookups.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::organizer::{move_file, sanitize_or, unique_destination, LibraryOrganizer};
use super::stats::songs_in;
use super::tags::{self, CoverImage};
use crate::download_queue::{UNKNOWN_ALBUM, UNKNOWN_ARTIST, UNKNOWN_TITLE};

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Invalid library path: {0}")]
    InvalidPath(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("A file with this name already exists: {0}")]
    AlreadyExists(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Empty file")]
    EmptyFile,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Correction {
    pub song_path: String,
    pub target_artist: String,
    pub feat_artist: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectionResult {
    pub song_path: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Parses a `/`-separated path relative to the library, rejecting anything
/// that could leave it.
fn relative_path(raw: &str) -> Result<PathBuf, LibraryError> {
    let mut clean = PathBuf::new();
    for component in Path::new(raw.trim()).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return Err(LibraryError::InvalidPath(raw.to_string())),
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(LibraryError::InvalidPath(raw.to_string()));
    }
    Ok(clean)
}

/// A single path segment such as an artist or album folder name.
fn segment(raw: &str) -> Result<&str, LibraryError> {
    let mut components = Path::new(raw).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(raw),
        _ => Err(LibraryError::InvalidPath(raw.to_string())),
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

impl LibraryOrganizer {
    fn song_file(&self, song_path: &str) -> Result<PathBuf, LibraryError> {
        let relative = relative_path(song_path)?;
        let is_mp3 = relative
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
        if !is_mp3 {
            return Err(LibraryError::InvalidPath(song_path.to_string()));
        }
        let absolute = self.music_dir().join(relative);
        if !absolute.is_file() {
            return Err(LibraryError::NotFound(song_path.to_string()));
        }
        Ok(absolute)
    }

    fn relative_to_library(&self, path: &Path) -> String {
        path.strip_prefix(self.music_dir())
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Removes `dir` and its parents while they are empty, stopping at the
    /// music directory.
    fn remove_empty_dirs(&self, dir: Option<&Path>) {
        let mut current = dir;
        while let Some(dir) = current {
            if dir == self.music_dir() || !dir.starts_with(self.music_dir()) {
                break;
            }
            let is_empty = match std::fs::read_dir(dir) {
                Ok(mut entries) => entries.next().is_none(),
                Err(_) => false,
            };
            if !is_empty {
                break;
            }
            if let Err(err) = std::fs::remove_dir(dir) {
                warn!("Could not remove empty directory {:?}: {}", dir, err);
                break;
            }
            debug!("Removed empty directory {:?}", dir);
            current = dir.parent();
        }
    }

    /// Moves a song into `<target_artist>/<target_album>`, keeping its file
    /// name unless it collides. Returns the new relative path.
    pub fn move_song(
        &self,
        song_path: &str,
        target_artist: &str,
        target_album: &str,
    ) -> Result<String, LibraryError> {
        let source = self.song_file(song_path)?;
        let album_dir = self
            .music_dir()
            .join(sanitize_or(target_artist, UNKNOWN_ARTIST))
            .join(sanitize_or(target_album, UNKNOWN_ALBUM));
        if source.parent() == Some(album_dir.as_path()) {
            return Ok(self.relative_to_library(&source));
        }

        std::fs::create_dir_all(&album_dir)?;
        let destination = unique_destination(&album_dir, &stem_of(&source));
        move_file(&source, &destination)?;
        self.remove_empty_dirs(source.parent());

        let new_path = self.relative_to_library(&destination);
        info!("Moved {} to {}", song_path, new_path);
        Ok(new_path)
    }

    /// Renames a song in place and updates its title tag.
    pub fn rename_song(&self, song_path: &str, new_title: &str) -> Result<String, LibraryError> {
        let source = self.song_file(song_path)?;
        let file_name = format!("{}.mp3", sanitize_or(new_title, UNKNOWN_TITLE));
        let destination = source.with_file_name(&file_name);
        if destination != source && destination.exists() {
            return Err(LibraryError::AlreadyExists(file_name));
        }

        if let Err(err) = tags::update_text_tags(&source, Some(new_title.trim()), None) {
            warn!("Could not update title of {:?}: {}", source, err);
        }
        if destination != source {
            move_file(&source, &destination)?;
        }

        let new_path = self.relative_to_library(&destination);
        info!("Renamed {} to {}", song_path, new_path);
        Ok(new_path)
    }

    /// Files a song under `target_artist` with `feat_artist` appended to its
    /// title, keeping the album. Title and album come from the tags, or from
    /// the current location when the tags are missing.
    pub fn apply_correction(&self, correction: &Correction) -> Result<String, LibraryError> {
        let source = self.song_file(&correction.song_path)?;
        let current = tags::read_song_tags(&source);
        let title = current.title.unwrap_or_else(|| stem_of(&source));
        let album = current.album.unwrap_or_else(|| {
            source
                .parent()
                .and_then(|dir| dir.file_name())
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| UNKNOWN_ALBUM.to_string())
        });
        let artist = correction.target_artist.trim();
        let new_title = format!("{} (feat. {})", title, correction.feat_artist.trim());

        let album_dir = self
            .music_dir()
            .join(sanitize_or(artist, UNKNOWN_ARTIST))
            .join(sanitize_or(&album, UNKNOWN_ALBUM));
        std::fs::create_dir_all(&album_dir)?;
        let destination =
            unique_destination(&album_dir, &sanitize_or(&new_title, UNKNOWN_TITLE));

        if let Err(err) = tags::update_text_tags(&source, Some(&new_title), Some(artist)) {
            warn!("Could not update tags of {:?}: {}", source, err);
        }
        move_file(&source, &destination)?;
        self.remove_empty_dirs(source.parent());

        let new_path = self.relative_to_library(&destination);
        info!("Corrected {} to {}", correction.song_path, new_path);
        Ok(new_path)
    }

    /// Applies every correction, carrying on past failures.
    pub fn apply_corrections(&self, corrections: &[Correction]) -> Vec<CorrectionResult> {
        corrections
            .iter()
            .map(|correction| match self.apply_correction(correction) {
                Ok(new_path) => CorrectionResult {
                    song_path: correction.song_path.clone(),
                    success: true,
                    new_path: Some(new_path),
                    error: None,
                },
                Err(err) => {
                    warn!("Correction of {} failed: {}", correction.song_path, err);
                    CorrectionResult {
                        song_path: correction.song_path.clone(),
                        success: false,
                        new_path: None,
                        error: Some(err.to_string()),
                    }
                }
            })
            .collect()
    }

    /// Cover embedded in the first song of an album that has one.
    pub fn album_cover(&self, artist: &str, album: &str) -> Result<Option<CoverImage>, LibraryError> {
        let album_dir = self.music_dir().join(segment(artist)?).join(segment(album)?);
        if !album_dir.is_dir() {
            return Ok(None);
        }
        Ok(songs_in(&album_dir).iter().find_map(|song| tags::read_cover(song)))
    }

    /// Same as [`Self::album_cover`], addressed as `<Artist>_<Album>.jpg`.
    pub fn cover_by_file_name(&self, file_name: &str) -> Result<Option<CoverImage>, LibraryError> {
        let name = file_name.strip_suffix(".jpg").unwrap_or(file_name);
        match name.split_once('_') {
            Some((artist, album)) => self.album_cover(artist, album),
            None => Ok(None),
        }
    }
}
