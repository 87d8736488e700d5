use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use image::RgbImage;
use std::fmt;
use std::sync::Arc;

/// Remote imagery channel identifier (one instrument/wavelength)
pub type SourceId = u32;

/// Result of a "closest image" lookup. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    pub id: String,
    pub timestamp: String,
    pub source_id: SourceId,
}

/// Decoded image handle.
///
/// Keeps the encoded bytes exactly as received next to the decoded pixels so
/// the disk cache can persist them without re-encoding. Clones share both.
#[derive(Clone)]
pub struct DecodedImage {
    encoded: Arc<[u8]>,
    pixels: Arc<RgbImage>,
}

impl DecodedImage {
    /// Decode JPEG/PNG bytes to RGB. The format is sniffed from the content.
    pub fn decode(encoded: Vec<u8>) -> Result<Self, image::ImageError> {
        let _s = common::span_debug!("decode");

        let pixels = image::load_from_memory(&encoded)?.to_rgb8();
        Ok(Self {
            encoded: encoded.into(),
            pixels: Arc::new(pixels),
        })
    }

    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("encoded_len", &self.encoded.len())
            .finish()
    }
}

/// One decoded image belonging to exactly one source buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DecodedImage,
    pub timestamp: String,
    pub id: String,
}

impl Frame {
    pub fn new(image: DecodedImage, timestamp: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            image,
            timestamp: timestamp.into(),
            id: id.into(),
        }
    }

    /// Observation time, if the timestamp is in a recognised UTC format.
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    /// How long before `now` the frame was observed.
    pub fn age(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.observed_at().map(|observed| now - observed)
    }
}

/// Parse RFC 3339 or the remote's `YYYY-MM-DD HH:MM:SS[.fff]` form (UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}
