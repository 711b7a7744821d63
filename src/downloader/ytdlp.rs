//! yt-dlp backed downloader and metadata extractor.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::OnceLock;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{
    DownloadError, DownloadProgress, DownloadedFile, Downloader, ExtractError, MetadataExtractor,
    Phase, PlaylistInfo, PlaylistKind, PlaylistSong, ProgressTracker, TrackInfo,
};
use crate::config::DownloaderSettings;
use crate::download_queue::{TrackMetadata, UNKNOWN_ALBUM, UNKNOWN_ARTIST, UNKNOWN_TITLE};
use crate::library::sanitize_filename;

const PROGRESS_PREFIX: &str = "SONGSURF_PROGRESS|";
const PROGRESS_TEMPLATE: &str = "download:SONGSURF_PROGRESS|%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.eta)s";
const TOPIC_SUFFIX: &str = " - Topic";

pub struct YtDlpDownloader {
    ytdlp_path: String,
    ffmpeg_location: Option<PathBuf>,
    audio_quality: u8,
    temp_dir: PathBuf,
    progress: ProgressTracker,
}

impl YtDlpDownloader {
    pub fn new(settings: &DownloaderSettings, temp_dir: PathBuf) -> Self {
        let ffmpeg_location = settings.ffmpeg_location.clone().or_else(find_ffmpeg_dir);
        match &ffmpeg_location {
            Some(dir) => info!("Using ffmpeg from {:?}", dir),
            None => warn!("ffmpeg not found on PATH, MP3 conversion will fail"),
        }
        Self {
            ytdlp_path: settings.ytdlp_path.clone(),
            ffmpeg_location,
            audio_quality: settings.audio_quality,
            temp_dir,
            progress: ProgressTracker::new(),
        }
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.progress
    }

    fn download_args(&self, url: &str, stem: &str) -> Vec<OsString> {
        // yt-dlp expands %(...)s sequences in the output template
        let output = self
            .temp_dir
            .join(format!("{}.%(ext)s", stem.replace('%', "%%")));

        let mut args: Vec<OsString> = [
            "-f",
            "bestaudio/best",
            "-x",
            "--audio-format",
            "mp3",
            "--audio-quality",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        args.push(self.audio_quality.to_string().into());
        args.extend(
            [
                "--no-playlist",
                "--write-thumbnail",
                "--no-check-certificates",
                "--newline",
                "--progress-template",
                PROGRESS_TEMPLATE,
                "-o",
            ]
            .iter()
            .map(OsString::from),
        );
        args.push(output.into_os_string());
        if let Some(dir) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(dir.clone().into_os_string());
        }
        args.push("--".into());
        args.push(url.into());
        args
    }

    async fn run_download(&self, url: &str, stem: &str) -> Result<(), DownloadError> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;

        let mut child = Command::new(&self.ytdlp_path)
            .args(self.download_args(url, stem))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DownloadError::Launch(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::Launch("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::Launch("stderr was not captured".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buffer = Vec::new();
            if let Err(err) = BufReader::new(stderr).read_to_end(&mut buffer).await {
                debug!("Failed to read yt-dlp stderr: {}", err);
            }
            String::from_utf8_lossy(&buffer).into_owned()
        });

        // Output follows the console code page on Windows, not always UTF-8
        let mut reader = BufReader::new(stdout);
        let mut line = Vec::new();
        while reader.read_until(b'\n', &mut line).await? > 0 {
            let decoded = String::from_utf8_lossy(&line);
            self.handle_output_line(decoded.trim_end_matches(['\r', '\n']));
            line.clear();
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(DownloadError::ToolFailed(tool_error_message(&stderr, status)));
        }
        Ok(())
    }

    fn handle_output_line(&self, line: &str) {
        if let Some(update) = parse_progress_line(line) {
            match update.status.as_str() {
                "downloading" => self.progress.update(
                    update.downloaded.unwrap_or(0),
                    update.total.or(update.total_estimate),
                    update.speed,
                    update.eta,
                ),
                "finished" => self.progress.finish_download(),
                _ => {}
            }
        } else if line.starts_with("[ExtractAudio]") {
            self.progress.finish_download();
            debug!("yt-dlp: {}", line);
        } else {
            debug!("yt-dlp: {}", line);
        }
    }

    async fn run_json(&self, extra_args: &[&str], url: &str) -> Result<YtDlpInfo, ExtractError> {
        let output = Command::new(&self.ytdlp_path)
            .args(["-J", "--skip-download", "--no-warnings"])
            .args(extra_args)
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtractError::Launch(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::ToolFailed(tool_error_message(
                &stderr,
                output.status,
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ExtractError::InvalidOutput(format!("JSON parse error: {}", e)))
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn download(
        &self,
        url: &str,
        metadata: &TrackMetadata,
    ) -> Result<DownloadedFile, DownloadError> {
        let url = normalize_url(url);
        let stem = temp_file_stem(metadata);
        let expected = self.temp_dir.join(format!("{}.mp3", stem));
        info!("Downloading {} into {:?}", url, expected);

        self.progress.start();
        let result = match self.run_download(&url, &stem).await {
            Ok(()) if expected.is_file() => Ok(DownloadedFile { path: expected }),
            Ok(()) => Err(DownloadError::MissingOutput(expected)),
            Err(err) => Err(err),
        };

        match &result {
            Ok(_) => self.progress.set_phase(Phase::Completed),
            Err(err) => {
                warn!("Download of {} failed: {}", url, err);
                self.progress.set_phase(Phase::Error);
            }
        }
        result
    }

    fn progress(&self) -> DownloadProgress {
        self.progress.snapshot()
    }

    fn reset_progress(&self) {
        self.progress.reset();
    }
}

#[async_trait]
impl MetadataExtractor for YtDlpDownloader {
    async fn extract_track(&self, url: &str) -> Result<TrackInfo, ExtractError> {
        let url = normalize_url(url);
        info!("Extracting metadata for {}", url);
        let info = self.run_json(&["--no-playlist"], &url).await?;
        Ok(track_from_info(info))
    }

    async fn extract_playlist(&self, url: &str) -> Result<PlaylistInfo, ExtractError> {
        info!("Extracting playlist {}", url);
        let info = self.run_json(&["--flat-playlist"], url).await?;
        if info.entries.is_none() {
            return Err(ExtractError::NotAPlaylist);
        }

        let mut artist = first_present([
            &info.artist,
            &info.creator,
            &info.uploader,
            &info.channel,
        ])
        .map(|a| strip_topic(&a).to_string());
        let mut year = String::new();

        // Album pages often carry no artist; borrow it from the first track.
        if artist.is_none() {
            let first_id = info
                .entries
                .iter()
                .flatten()
                .flatten()
                .find_map(|entry| entry.id.clone());
            if let Some(id) = first_id {
                match self.extract_track(&watch_url(&id)).await {
                    Ok(track) => {
                        artist = Some(track.artist);
                        year = track.year;
                    }
                    Err(err) => warn!("Could not resolve playlist artist: {}", err),
                }
            }
        }

        let playlist = playlist_from_info(url, info, artist, year);
        info!(
            "Playlist '{}' by {}: {} songs",
            playlist.title, playlist.artist, playlist.total_songs
        );
        Ok(playlist)
    }
}

/// Subset of the yt-dlp info JSON we care about.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct YtDlpInfo {
    id: Option<String>,
    url: Option<String>,
    title: Option<String>,
    artist: Option<String>,
    creator: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    album: Option<String>,
    release_date: Option<String>,
    upload_date: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    entries: Option<Vec<Option<YtDlpInfo>>>,
}

fn first_present<const N: usize>(candidates: [&Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn strip_topic(name: &str) -> &str {
    name.strip_suffix(TOPIC_SUFFIX).unwrap_or(name)
}

fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

fn duration_secs(duration: Option<f64>) -> u64 {
    duration.filter(|d| *d > 0.0).map(|d| d as u64).unwrap_or(0)
}

fn track_from_info(info: YtDlpInfo) -> TrackInfo {
    let artist = first_present([&info.artist, &info.creator, &info.uploader])
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    let year = first_present([&info.release_date, &info.upload_date])
        .filter(|date| date.len() >= 4)
        .and_then(|date| date.get(..4).map(str::to_string))
        .unwrap_or_default();

    TrackInfo {
        title: info.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
        artist: strip_topic(&artist).to_string(),
        album: info.album.unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
        year,
        thumbnail_url: info.thumbnail.unwrap_or_default(),
        duration: duration_secs(info.duration),
    }
}

fn playlist_from_info(
    url: &str,
    info: YtDlpInfo,
    artist: Option<String>,
    year: String,
) -> PlaylistInfo {
    let kind = if url.contains("browse") {
        PlaylistKind::Album
    } else {
        PlaylistKind::Playlist
    };

    let raw_title = info.title.unwrap_or_else(|| "Unknown Playlist".to_string());
    let title = raw_title
        .strip_prefix("Album - ")
        .unwrap_or(&raw_title)
        .to_string();

    // Titles are often "<Album> - <Artist>"
    let artist = artist
        .filter(|a| a != UNKNOWN_ARTIST)
        .or_else(|| {
            let parts: Vec<&str> = title.split(" - ").collect();
            if parts.len() < 2 || parts[0].trim().eq_ignore_ascii_case("album") {
                return None;
            }
            let candidate = parts[parts.len() - 1].trim();
            (!candidate.is_empty() && !candidate.to_lowercase().starts_with("album"))
                .then(|| candidate.to_string())
        })
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

    let songs: Vec<PlaylistSong> = info
        .entries
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .map(|entry| {
            let song_artist = first_present([&entry.artist, &entry.creator, &entry.uploader])
                .unwrap_or_else(|| artist.clone());
            let url = entry
                .url
                .clone()
                .or_else(|| entry.id.as_deref().map(watch_url))
                .unwrap_or_default();
            PlaylistSong {
                title: entry.title.unwrap_or_else(|| "Unknown".to_string()),
                artist: strip_topic(&song_artist).to_string(),
                url,
                id: entry.id,
                duration: duration_secs(entry.duration),
            }
        })
        .collect();

    PlaylistInfo {
        kind,
        title,
        artist,
        year,
        total_songs: songs.len(),
        total_duration: songs.iter().map(|s| s.duration).sum(),
        songs,
    }
}

/// Rewrites YouTube Music watch links to the plain YouTube form.
pub fn normalize_url(url: &str) -> String {
    static VIDEO_ID_RE: OnceLock<Regex> = OnceLock::new();
    if !url.contains("music.youtube.com") {
        return url.to_string();
    }
    let re = VIDEO_ID_RE.get_or_init(|| Regex::new(r"[?&]v=([^&#]+)").expect("valid regex"));
    match re.captures(url).and_then(|c| c.get(1)) {
        Some(id) => watch_url(id.as_str()),
        None => url.to_string(),
    }
}

/// Directory holding an `ffmpeg` executable found on PATH.
pub fn find_ffmpeg_dir() -> Option<PathBuf> {
    ffmpeg_dir_in(std::env::var_os("PATH"))
}

fn ffmpeg_dir_in(paths: Option<OsString>) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    which::which_in("ffmpeg", paths, cwd)
        .ok()
        .and_then(|binary| binary.parent().map(Path::to_path_buf))
}

/// File name (without extension) of the download inside the temp directory.
pub(crate) fn temp_file_stem(metadata: &TrackMetadata) -> String {
    let artist = sanitize_filename(&metadata.artist);
    let title = sanitize_filename(&metadata.title);
    format!(
        "{} - {}",
        if artist.is_empty() { UNKNOWN_ARTIST } else { &artist },
        if title.is_empty() { UNKNOWN_TITLE } else { &title }
    )
}

#[derive(Debug, PartialEq)]
struct ProgressLine {
    status: String,
    downloaded: Option<u64>,
    total: Option<u64>,
    total_estimate: Option<u64>,
    speed: Option<f64>,
    eta: Option<u64>,
}

fn parse_number(field: Option<&str>) -> Option<f64> {
    field
        .map(str::trim)
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}

fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let fields: Vec<&str> = line.trim().strip_prefix(PROGRESS_PREFIX)?.split('|').collect();
    let status = fields.first()?.trim().to_string();
    if status.is_empty() {
        return None;
    }
    let as_u64 = |i: usize| parse_number(fields.get(i).copied()).map(|v| v as u64);
    Some(ProgressLine {
        status,
        downloaded: as_u64(1),
        total: as_u64(2),
        total_estimate: as_u64(3),
        speed: parse_number(fields.get(4).copied()),
        eta: as_u64(5),
    })
}

fn tool_error_message(stderr: &str, status: ExitStatus) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR"))
        .or_else(|| lines.last())
        .map(|l| l.to_string())
        .unwrap_or_else(|| format!("yt-dlp exited with {}", status))
}
