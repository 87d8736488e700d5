use std::io;
use thiserror::Error;

/// Failures of a single remote call. Callers treat every variant as
/// "no image for this request" and move on to the next unit of work.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Remote returned status {0}")]
    Status(u16),

    #[error("Remote returned no image")]
    NoImage,

    #[error("Image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Failures inside the disk cache. Never surfaced to callers: a failed save
/// degrades to "not cached", a failed load to a miss.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Metadata serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}
