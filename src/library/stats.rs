//! Read-only views over the organized music directory.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use super::tags;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryStats {
    pub artists: usize,
    pub albums: usize,
    pub songs: usize,
    pub total_duration_seconds: u64,
    pub total_duration_formatted: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtistEntry {
    pub name: String,
    pub albums_count: usize,
    pub songs_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumEntry {
    pub name: String,
    pub artist: String,
    pub songs_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SongEntry {
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Relative to the music directory.
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryStructure {
    pub artists: Vec<ArtistEntry>,
    pub albums: Vec<AlbumEntry>,
    pub songs: Vec<SongEntry>,
}

/// Immediate children of `dir` matching `keep`, sorted by name.
fn children(dir: &Path, keep: fn(&walkdir::DirEntry) -> bool) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Skipping unreadable library entry: {}", err);
                None
            }
        })
        .filter(keep)
        .map(|entry| entry.into_path())
        .collect()
}

/// MP3 files directly inside `dir`, sorted by name.
pub(super) fn songs_in(dir: &Path) -> Vec<PathBuf> {
    children(dir, is_mp3)
}

fn is_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
}

fn is_mp3(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_file()
        && entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"))
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn title_of(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    if hours > 0 {
        format!("{}h {}min", hours, minutes)
    } else {
        format!("{}min", minutes)
    }
}

/// Counts `<Artist>/<Album>/<Song>.mp3` entries. A missing directory is an
/// empty library.
pub fn library_stats(music_dir: &Path) -> LibraryStats {
    let mut stats = LibraryStats::default();
    if !music_dir.is_dir() {
        stats.total_duration_formatted = format_duration(0);
        return stats;
    }

    for artist in children(music_dir, is_dir) {
        stats.artists += 1;
        for album in children(&artist, is_dir) {
            stats.albums += 1;
            for song in children(&album, is_mp3) {
                stats.songs += 1;
                if let Some(duration) = tags::audio_duration(&song) {
                    stats.total_duration_seconds += duration.as_secs();
                }
            }
        }
    }
    stats.total_duration_formatted = format_duration(stats.total_duration_seconds);
    stats
}

pub fn library_structure(music_dir: &Path) -> LibraryStructure {
    let mut structure = LibraryStructure::default();
    if !music_dir.is_dir() {
        return structure;
    }

    for artist_dir in children(music_dir, is_dir) {
        let artist = name_of(&artist_dir);
        let mut artist_entry = ArtistEntry {
            name: artist.clone(),
            albums_count: 0,
            songs_count: 0,
        };

        for album_dir in children(&artist_dir, is_dir) {
            let album = name_of(&album_dir);
            let songs = children(&album_dir, is_mp3);

            artist_entry.albums_count += 1;
            artist_entry.songs_count += songs.len();
            structure.albums.push(AlbumEntry {
                name: album.clone(),
                artist: artist.clone(),
                songs_count: songs.len(),
            });
            structure.songs.extend(songs.iter().map(|song| SongEntry {
                title: title_of(song),
                artist: artist.clone(),
                album: album.clone(),
                path: format!("{}/{}/{}", artist, album, name_of(song)),
            }));
        }
        structure.artists.push(artist_entry);
    }
    structure
}
