//! Cache-or-download resolution shared by the prefetch coordinator and the
//! live worker.

use crate::cache::DiskCache;
use crate::clock::Clock;
use crate::remote::RemoteSource;
use crate::types::{Frame, ImageMetadata};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cached,
    Downloaded,
}

/// Collaborators every worker needs. Cheap to clone.
#[derive(Clone)]
pub struct FetchContext {
    pub remote: Arc<dyn RemoteSource>,
    pub cache: Arc<DiskCache>,
    pub clock: Arc<dyn Clock>,
    pub image_width: u32,
}

impl FetchContext {
    pub fn new(
        remote: Arc<dyn RemoteSource>,
        cache: Arc<DiskCache>,
        clock: Arc<dyn Clock>,
        image_width: u32,
    ) -> Self {
        Self {
            remote,
            cache,
            clock,
            image_width,
        }
    }

    /// Turn metadata into a frame, preferring the disk cache.
    ///
    /// An index entry whose file cannot be loaded falls through to a fresh
    /// download. Downloads are saved back to the cache. `None` means the
    /// image could not be obtained this time.
    pub fn acquire(&self, meta: &ImageMetadata) -> Option<(Frame, Origin)> {
        if self.cache.is_cached(meta.source_id, &meta.id) {
            if let Some(image) = self.cache.load(meta.source_id, &meta.id) {
                return Some((
                    Frame::new(image, meta.timestamp.clone(), meta.id.clone()),
                    Origin::Cached,
                ));
            }
            tracing::debug!(
                source_id = meta.source_id,
                image_id = %meta.id,
                "Indexed image unreadable, downloading again"
            );
        }

        match self.remote.download(&meta.id, self.image_width) {
            Ok(image) => {
                self.cache
                    .save(meta.source_id, &meta.id, &image, &meta.timestamp);
                Some((
                    Frame::new(image, meta.timestamp.clone(), meta.id.clone()),
                    Origin::Downloaded,
                ))
            }
            Err(e) => {
                tracing::debug!(
                    source_id = meta.source_id,
                    image_id = %meta.id,
                    error = %e,
                    "Download failed"
                );
                None
            }
        }
    }
}
