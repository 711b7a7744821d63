use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub temp_dir: Option<String>,
    pub music_dir: Option<String>,
    pub artist_photos_dir: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub queue_capacity: Option<usize>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,

    // Feature configs
    pub downloader: Option<DownloaderConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Executable name or path of yt-dlp.
    pub ytdlp_path: Option<String>,
    /// Directory containing the ffmpeg binary, passed to yt-dlp as-is.
    pub ffmpeg_location: Option<String>,
    /// VBR quality for the MP3 conversion, 0 (best) to 9 (worst).
    pub audio_quality: Option<u8>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
