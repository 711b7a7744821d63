mod file_config;

pub use file_config::{DownloaderConfig, FileConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;
pub const DEFAULT_YTDLP_PATH: &str = "yt-dlp";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub temp_dir: PathBuf,
    pub music_dir: PathBuf,
    pub artist_photos_dir: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub queue_capacity: usize,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub ytdlp_path: Option<String>,
    pub ffmpeg_location: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("temp"),
            music_dir: PathBuf::from("music"),
            artist_photos_dir: PathBuf::from("artist_photos"),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            logging_level: RequestsLoggingLevel::default(),
            frontend_dir_path: None,
            ytdlp_path: None,
            ffmpeg_location: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub temp_dir: PathBuf,
    pub music_dir: PathBuf,
    pub artist_photos_dir: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub queue_capacity: usize,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,

    // Feature configs (with defaults)
    pub downloader: DownloaderSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let temp_dir = absolute_path(
            &file
                .temp_dir
                .map(PathBuf::from)
                .unwrap_or_else(|| cli.temp_dir.clone()),
        )?;
        let music_dir = absolute_path(
            &file
                .music_dir
                .map(PathBuf::from)
                .unwrap_or_else(|| cli.music_dir.clone()),
        )?;

        let artist_photos_dir = absolute_path(
            &file
                .artist_photos_dir
                .map(PathBuf::from)
                .unwrap_or_else(|| cli.artist_photos_dir.clone()),
        )?;

        // The cleanup endpoint wipes every file in temp_dir
        if temp_dir == music_dir {
            bail!(
                "temp_dir and music_dir must be different directories: {:?}",
                temp_dir
            );
        }
        if artist_photos_dir == temp_dir || artist_photos_dir == music_dir {
            bail!(
                "artist_photos_dir must differ from temp_dir and music_dir: {:?}",
                artist_photos_dir
            );
        }
        for (name, dir) in [
            ("temp_dir", &temp_dir),
            ("music_dir", &music_dir),
            ("artist_photos_dir", &artist_photos_dir),
        ] {
            if dir.exists() && !dir.is_dir() {
                bail!("{} is not a directory: {:?}", name, dir);
            }
        }

        let bind_address = file
            .bind_address
            .unwrap_or_else(|| cli.bind_address.clone());
        let port = file.port.unwrap_or(cli.port);

        let queue_capacity = file.queue_capacity.unwrap_or(cli.queue_capacity);
        if queue_capacity == 0 {
            bail!("queue_capacity must be at least 1");
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        // Downloader settings - merge file config with CLI and defaults
        let dl_file = file.downloader.unwrap_or_default();
        let audio_quality = dl_file.audio_quality.unwrap_or(0);
        if audio_quality > 9 {
            bail!(
                "downloader.audio_quality must be between 0 and 9, got {}",
                audio_quality
            );
        }
        let downloader = DownloaderSettings {
            ytdlp_path: dl_file
                .ytdlp_path
                .or_else(|| cli.ytdlp_path.clone())
                .unwrap_or_else(|| DEFAULT_YTDLP_PATH.to_string()),
            ffmpeg_location: dl_file
                .ffmpeg_location
                .map(PathBuf::from)
                .or_else(|| cli.ffmpeg_location.clone()),
            audio_quality,
        };

        Ok(Self {
            temp_dir,
            music_dir,
            artist_photos_dir,
            bind_address,
            port,
            queue_capacity,
            logging_level,
            frontend_dir_path,
            downloader,
        })
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct DownloaderSettings {
    pub ytdlp_path: String,
    /// None means "look ffmpeg up on PATH at startup".
    pub ffmpeg_location: Option<PathBuf>,
    pub audio_quality: u8,
}

impl Default for DownloaderSettings {
    fn default() -> Self {
        Self {
            ytdlp_path: DEFAULT_YTDLP_PATH.to_string(),
            ffmpeg_location: None,
            audio_quality: 0,
        }
    }
}

/// Makes `path` absolute against the working directory and folds `.` and
/// `..` components, without touching the filesystem.
fn absolute_path(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to get current dir")?
            .join(path)
    };
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
