//! ID3 tag writing and cover art preparation.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageError, Rgb, RgbImage};
use lofty::config::WriteOptions;
use lofty::error::LoftyError;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::{Picture, PictureType};
use lofty::prelude::Accessor;
use lofty::read_from_path;
use lofty::tag::{ItemKey, Tag, TagType};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const MAX_COVER_SIZE: u32 = 1000;
const COVER_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum TagError {
    #[error("Failed to read tags: {0}")]
    Read(LoftyError),

    #[error("No writable tag available for {0:?}")]
    NoTag(TagType),

    #[error("Failed to write tags: {0}")]
    Write(LoftyError),
}

pub struct TagValues<'a> {
    pub title: &'a str,
    pub artist: &'a str,
    pub album: &'a str,
    pub year: &'a str,
}

/// Rewrites the text tags of `path` and, when given, replaces the front
/// cover with `cover_jpeg`.
pub fn write_tags(
    path: &Path,
    values: &TagValues<'_>,
    cover_jpeg: Option<Vec<u8>>,
) -> Result<(), TagError> {
    let mut tagged_file = read_from_path(path).map_err(TagError::Read)?;
    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file
        .tag_mut(tag_type)
        .ok_or(TagError::NoTag(tag_type))?;

    tag.set_title(values.title.to_string());
    tag.set_artist(values.artist.to_string());
    tag.set_album(values.album.to_string());
    if !values.year.is_empty() {
        tag.insert_text(ItemKey::RecordingDate, values.year.to_string());
    }

    if let Some(data) = cover_jpeg {
        let mut picture = Picture::from_reader(&mut data.as_slice()).map_err(TagError::Read)?;
        picture.set_pic_type(PictureType::CoverFront);
        tag.remove_picture_type(PictureType::CoverFront);
        tag.push_picture(picture);
    }

    tagged_file
        .save_to_path(path, WriteOptions::default())
        .map_err(TagError::Write)
}

/// Replaces only the given text fields, keeping the rest of the tag.
pub fn update_text_tags(
    path: &Path,
    title: Option<&str>,
    artist: Option<&str>,
) -> Result<(), TagError> {
    let mut tagged_file = read_from_path(path).map_err(TagError::Read)?;
    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file
        .tag_mut(tag_type)
        .ok_or(TagError::NoTag(tag_type))?;
    if let Some(title) = title {
        tag.set_title(title.to_string());
    }
    if let Some(artist) = artist {
        tag.set_artist(artist.to_string());
    }
    tagged_file
        .save_to_path(path, WriteOptions::default())
        .map_err(TagError::Write)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SongTags {
    pub title: Option<String>,
    pub album: Option<String>,
}

/// Title and album of `path`. Blank values count as missing.
pub fn read_song_tags(path: &Path) -> SongTags {
    let Ok(tagged_file) = read_from_path(path) else {
        return SongTags::default();
    };
    let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
        return SongTags::default();
    };
    let present = |value: Option<std::borrow::Cow<'_, str>>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    SongTags {
        title: present(tag.title()),
        album: present(tag.album()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverImage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Embedded cover of `path`, preferring the front cover.
pub fn read_cover(path: &Path) -> Option<CoverImage> {
    let tagged_file = read_from_path(path).ok()?;
    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag())?;
    let picture = tag
        .pictures()
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .or_else(|| tag.pictures().first())?;

    let mime_type = picture
        .mime_type()
        .map(|m| m.as_str().to_string())
        .or_else(|| infer::get(picture.data()).map(|k| k.mime_type().to_string()))?;
    Some(CoverImage {
        data: picture.data().to_vec(),
        mime_type,
    })
}

/// Decodes any supported image and re-encodes it as a JPEG no larger than
/// 1000x1000. Transparent areas become white.
pub fn cover_jpeg(path: &Path) -> Result<Vec<u8>, ImageError> {
    let mut img = image::open(path)?;
    let (width, height) = img.dimensions();
    if width > MAX_COVER_SIZE || height > MAX_COVER_SIZE {
        img = img.thumbnail(MAX_COVER_SIZE, MAX_COVER_SIZE);
    }

    let rgb = flatten_on_white(&img);
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, COVER_JPEG_QUALITY).encode_image(&rgb)?;
    Ok(buffer)
}

fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Playback length, or None when the file cannot be parsed.
pub fn audio_duration(path: &Path) -> Option<Duration> {
    read_from_path(path).ok().map(|f| f.properties().duration())
}

/// A few silent MPEG-1 Layer III frames (128 kbps, 44.1 kHz).
#[cfg(test)]
pub(crate) fn silent_mp3() -> Vec<u8> {
    const FRAME_LEN: usize = 417;
    let mut data = Vec::with_capacity(FRAME_LEN * 20);
    for _ in 0..20 {
        data.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
        data.resize(data.len() + FRAME_LEN - 4, 0);
    }
    data
}
