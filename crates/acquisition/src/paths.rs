//! Fixed names and endpoints shared by the remote client and the disk cache.

use std::path::PathBuf;

/// Root of the Helioviewer v2 API
pub const API_BASE: &str = "https://api.helioviewer.org/v2/";

/// Endpoint resolving the image closest to a requested instant
pub const CLOSEST_IMAGE_ENDPOINT: &str = "getClosestImage/";

/// Endpoint returning the encoded bytes of one image
pub const DOWNLOAD_IMAGE_ENDPOINT: &str = "downloadImage/";

/// Directory name of the disk cache inside the system temp dir
pub const CACHE_DIR_NAME: &str = "sun_viewer_cache";

/// Whole-file JSON index of cached images
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// Extension of cached image files
pub const IMAGE_EXTENSION: &str = "jpg";

/// Default cache directory: `<tmp>/sun_viewer_cache`
pub fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join(CACHE_DIR_NAME)
}
