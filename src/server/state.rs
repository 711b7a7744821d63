use axum::extract::FromRef;

use crate::download_queue::QueueService;
use crate::downloader::MetadataExtractor;
use crate::library::{ArtistPhotoStore, LibraryOrganizer};
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedQueueService = Arc<QueueService>;
pub type GuardedLibrary = Arc<LibraryOrganizer>;
pub type GuardedArtistPhotos = Arc<ArtistPhotoStore>;
pub type GuardedMetadataExtractor = Arc<dyn MetadataExtractor>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub queue: GuardedQueueService,
    pub library: GuardedLibrary,
    pub photos: GuardedArtistPhotos,
    pub extractor: GuardedMetadataExtractor,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        queue: GuardedQueueService,
        library: GuardedLibrary,
        photos: GuardedArtistPhotos,
        extractor: GuardedMetadataExtractor,
    ) -> Self {
        ServerState {
            config,
            start_time: Instant::now(),
            hash: env!("SONGSURF_BUILD_HASH").to_owned(),
            queue,
            library,
            photos,
            extractor,
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedQueueService {
    fn from_ref(input: &ServerState) -> Self {
        input.queue.clone()
    }
}

impl FromRef<ServerState> for GuardedLibrary {
    fn from_ref(input: &ServerState) -> Self {
        input.library.clone()
    }
}

impl FromRef<ServerState> for GuardedArtistPhotos {
    fn from_ref(input: &ServerState) -> Self {
        input.photos.clone()
    }
}

impl FromRef<ServerState> for GuardedMetadataExtractor {
    fn from_ref(input: &ServerState) -> Self {
        input.extractor.clone()
    }
}
