//! Featuring-artist detection on raw `(title, artist)` pairs.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeaturingInfo {
    pub main_artist: String,
    pub feat_artists: Vec<String>,
    pub clean_title: String,
    pub has_feat: bool,
}

struct Patterns {
    title: Vec<Regex>,
    feat_separator: Regex,
    artist_separator: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        // Bracketed forms first so the bare forms only see what is left.
        let title = [
            r"(?i)\(feat\.?\s+([^)]+)\)",
            r"(?i)\(ft\.?\s+([^)]+)\)",
            r"(?i)\(featuring\s+([^)]+)\)",
            r"(?i)\[feat\.?\s+([^\]]+)\]",
            r"(?i)\[ft\.?\s+([^\]]+)\]",
            r"(?i)\bfeat\.?\s+([^\-(\[]+)",
            r"(?i)\bft\.?\s+([^\-(\[]+)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid featuring pattern"))
        .collect();

        Patterns {
            title,
            feat_separator: Regex::new(r"(?i)\s*(?:&|,|\band\b)\s*").expect("valid regex"),
            artist_separator: Regex::new(r"(?i)\s*(?:&|,|\band\b|\bet\b)\s*")
                .expect("valid regex"),
        }
    })
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    let name = name.trim();
    if !name.is_empty() && !list.iter().any(|n| n.eq_ignore_ascii_case(name)) {
        list.push(name.to_string());
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits `title` and `artist` into a main artist, the featured artists and
/// a title without the featuring marker.
pub fn detect_featuring(title: &str, artist: &str) -> FeaturingInfo {
    let patterns = patterns();
    let mut feat_artists = Vec::new();
    let mut clean_title = title.to_string();

    for pattern in &patterns.title {
        let found: Vec<String> = pattern
            .captures_iter(&clean_title)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect();
        if found.is_empty() {
            continue;
        }
        for names in &found {
            for name in patterns.feat_separator.split(names) {
                push_unique(&mut feat_artists, name);
            }
        }
        clean_title = collapse_whitespace(&pattern.replace_all(&clean_title, " "));
    }

    let clean_title = clean_title
        .trim()
        .trim_end_matches(|c: char| c == '-' || c.is_whitespace())
        .to_string();
    let clean_title = if clean_title.is_empty() {
        title.trim().to_string()
    } else {
        clean_title
    };

    let has_separator = [" & ", " and ", ", ", " et "]
        .iter()
        .any(|sep| artist.to_lowercase().contains(sep));
    let main_artist = if has_separator {
        let mut parts = patterns
            .artist_separator
            .split(artist)
            .map(str::trim)
            .filter(|p| !p.is_empty());
        let main = parts.next().unwrap_or(artist).to_string();
        for name in parts {
            push_unique(&mut feat_artists, name);
        }
        main
    } else {
        artist.trim().to_string()
    };

    feat_artists.retain(|name| !name.eq_ignore_ascii_case(&main_artist));

    FeaturingInfo {
        has_feat: !feat_artists.is_empty(),
        main_artist,
        feat_artists,
        clean_title,
    }
}
