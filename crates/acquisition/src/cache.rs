//! Persistent image cache keyed by `(source id, image id)`.
//!
//! Image bytes live in one file per image. A whole-file JSON index
//! (`{"<source>": {"<image>": {"timestamp", "cached_at"}}}`) is mirrored in
//! memory, consulted by [`DiskCache::is_cached`], and rewritten in full after
//! every save. The index is written to a sibling temp file and renamed into
//! place so an interrupted write never leaves a truncated index behind.

use crate::errors::CacheError;
use crate::paths;
use crate::types::{DecodedImage, SourceId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub timestamp: String,
    /// Unix epoch seconds at which the image was written
    #[serde(alias = "cachedAt")]
    pub cached_at: f64,
}

type MetadataIndex = BTreeMap<SourceId, BTreeMap<String, CacheEntry>>;

pub struct DiskCache {
    dir: PathBuf,
    metadata: Mutex<MetadataIndex>,
}

impl DiskCache {
    /// Open (creating if needed) a cache rooted at `dir`.
    ///
    /// A missing or unreadable index starts the cache empty.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let metadata = load_metadata(&dir.join(paths::METADATA_FILE_NAME));
        tracing::info!(
            dir = %dir.display(),
            sources = metadata.len(),
            images = metadata.values().map(BTreeMap::len).sum::<usize>(),
            "Disk cache opened"
        );

        Ok(Self {
            dir,
            metadata: Mutex::new(metadata),
        })
    }

    pub fn image_path(&self, source_id: SourceId, image_id: &str) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.{}",
            source_id,
            sanitize(image_id),
            paths::IMAGE_EXTENSION
        ))
    }

    /// Index lookup only; does not touch the disk.
    pub fn is_cached(&self, source_id: SourceId, image_id: &str) -> bool {
        self.metadata
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&source_id)
            .is_some_and(|images| images.contains_key(image_id))
    }

    /// Number of indexed images across all sources.
    pub fn len(&self) -> usize {
        self.metadata
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(BTreeMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read and decode a cached image. Absent or undecodable files are a miss.
    pub fn load(&self, source_id: SourceId, image_id: &str) -> Option<DecodedImage> {
        let path = self.image_path(source_id, image_id);
        match self.try_load(&path) {
            Ok(image) => Some(image),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Cache miss");
                None
            }
        }
    }

    fn try_load(&self, path: &Path) -> Result<DecodedImage, CacheError> {
        let bytes = fs::read(path)?;
        Ok(DecodedImage::decode(bytes)?)
    }

    /// Write the image and record it in the index. Best-effort: failures are
    /// logged and leave the image uncached.
    pub fn save(&self, source_id: SourceId, image_id: &str, image: &DecodedImage, timestamp: &str) {
        if let Err(e) = self.try_save(source_id, image_id, image, timestamp) {
            tracing::warn!(source_id, image_id, error = %e, "Failed to cache image");
        }
    }

    fn try_save(
        &self,
        source_id: SourceId,
        image_id: &str,
        image: &DecodedImage,
        timestamp: &str,
    ) -> Result<(), CacheError> {
        fs::write(self.image_path(source_id, image_id), image.encoded())?;

        let mut metadata = self.metadata.lock().unwrap_or_else(|e| e.into_inner());
        metadata.entry(source_id).or_default().insert(
            image_id.to_string(),
            CacheEntry {
                timestamp: timestamp.to_string(),
                cached_at: Utc::now().timestamp_millis() as f64 / 1000.0,
            },
        );

        self.persist_metadata(&metadata)
    }

    fn persist_metadata(&self, metadata: &MetadataIndex) -> Result<(), CacheError> {
        let path = self.dir.join(paths::METADATA_FILE_NAME);
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, serde_json::to_vec(metadata)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

fn load_metadata(path: &Path) -> MetadataIndex {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(_) => return MetadataIndex::new(),
    };

    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt cache index");
        MetadataIndex::new()
    })
}

/// Keep image ids from escaping the cache directory.
///
/// Bytes outside `[A-Za-z0-9-]` become `_XX` (uppercase hex), so distinct ids
/// never share a file.
fn sanitize(image_id: &str) -> String {
    let mut out = String::with_capacity(image_id.len());
    for byte in image_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_{:02X}", byte));
        }
    }
    out
}
