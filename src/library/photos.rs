//! Artist photos uploaded from the dashboard, one image per artist.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::manage::LibraryError;
use super::organizer::sanitize_filename;

const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistPhoto {
    pub data: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct ArtistPhotoStore {
    dir: PathBuf,
}

fn photo_stem(artist: &str) -> Result<String, LibraryError> {
    let stem = sanitize_filename(artist);
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        return Err(LibraryError::InvalidPath(artist.to_string()));
    }
    Ok(stem)
}

impl ArtistPhotoStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn find(&self, stem: &str) -> Option<PathBuf> {
        PHOTO_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{}.{}", stem, ext)))
            .find(|p| p.is_file())
    }

    /// The stored photo of `artist`, if any.
    pub fn load(&self, artist: &str) -> Result<Option<ArtistPhoto>, LibraryError> {
        let Some(path) = self.find(&photo_stem(artist)?) else {
            return Ok(None);
        };
        let data = std::fs::read(&path)?;
        match infer::get(&data) {
            Some(kind) if kind.mime_type().starts_with("image/") => Ok(Some(ArtistPhoto {
                mime_type: kind.mime_type().to_string(),
                data,
            })),
            _ => {
                debug!("Ignoring non-image artist photo {:?}", path);
                Ok(None)
            }
        }
    }

    /// Stores `data` as the photo of `artist`, replacing any previous one.
    /// `file_name` is the uploaded name and only decides the extension.
    pub fn save(&self, artist: &str, file_name: &str, data: &[u8]) -> Result<PathBuf, LibraryError> {
        let stem = photo_stem(artist)?;
        let extension = Path::new(file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .filter(|ext| PHOTO_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| LibraryError::UnsupportedFormat(file_name.to_string()))?;
        if data.is_empty() {
            return Err(LibraryError::EmptyFile);
        }
        if !infer::is_image(data) {
            return Err(LibraryError::UnsupportedFormat(file_name.to_string()));
        }

        std::fs::create_dir_all(&self.dir)?;
        while let Some(previous) = self.find(&stem) {
            std::fs::remove_file(&previous)?;
        }
        let path = self.dir.join(format!("{}.{}", stem, extension));
        std::fs::write(&path, data)?;
        info!("Saved photo for {} at {:?}", artist, path);
        Ok(path)
    }
}
