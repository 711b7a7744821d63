//! Metadata correction and the on-disk music library.

mod featuring;
mod manage;
mod organizer;
mod photos;
mod stats;
pub mod tags;

pub use featuring::{detect_featuring, FeaturingInfo};
pub use manage::{Correction, CorrectionResult, LibraryError};
pub use organizer::{
    sanitize_filename, thumbnails_of, LibraryOrganizer, OrganizeError, OrganizedFile, Organizer,
};
pub use photos::{ArtistPhoto, ArtistPhotoStore};
pub use stats::{
    format_duration, AlbumEntry, ArtistEntry, LibraryStats, LibraryStructure, SongEntry,
};
pub use tags::CoverImage;
