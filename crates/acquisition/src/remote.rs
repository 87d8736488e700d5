use crate::errors::FetchError;
use crate::paths;
use crate::types::{DecodedImage, ImageMetadata, SourceId};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(15);

/// Network contract of the imagery source.
///
/// Every call blocks its thread for at most the client's timeout. No retries
/// happen here: the workers simply try again on their next iteration or poll.
pub trait RemoteSource: Send + Sync {
    /// Resolve the image of `source_id` observed closest to `target`.
    fn closest_image(
        &self,
        source_id: SourceId,
        target: DateTime<Utc>,
    ) -> Result<ImageMetadata, FetchError>;

    /// Fetch and decode the `width`x`width` rendition of `image_id`.
    fn download(&self, image_id: &str, width: u32) -> Result<DecodedImage, FetchError>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageIdRepr {
    Text(String),
    Number(u64),
}

#[derive(Debug, Deserialize)]
struct ClosestImageResponse {
    id: Option<ImageIdRepr>,
    date: Option<String>,
}

fn metadata_from_response(
    response: ClosestImageResponse,
    source_id: SourceId,
) -> Result<ImageMetadata, FetchError> {
    let id = match response.id {
        Some(ImageIdRepr::Text(id)) if !id.is_empty() => id,
        Some(ImageIdRepr::Number(id)) => id.to_string(),
        _ => return Err(FetchError::NoImage),
    };
    let timestamp = response.date.ok_or(FetchError::NoImage)?;

    Ok(ImageMetadata {
        id,
        timestamp,
        source_id,
    })
}

fn ensure_success(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FetchError::Status(status.as_u16()))
    }
}

/// Helioviewer v2 API client. Holds one connection pool; otherwise stateless.
pub struct HelioviewerClient {
    client: Client,
    api_base: String,
    lookup_timeout: Duration,
    download_timeout: Duration,
}

impl HelioviewerClient {
    pub fn new(api_base: impl Into<String>) -> Result<Self, FetchError> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        let mut api_base = api_base.into();
        if !api_base.ends_with('/') {
            api_base.push('/');
        }

        Ok(Self {
            client,
            api_base,
            lookup_timeout: LOOKUP_TIMEOUT,
            download_timeout: DOWNLOAD_TIMEOUT,
        })
    }

    pub fn with_timeouts(mut self, lookup: Duration, download: Duration) -> Self {
        self.lookup_timeout = lookup;
        self.download_timeout = download;
        self
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}{}", self.api_base, name)
    }
}

impl RemoteSource for HelioviewerClient {
    fn closest_image(
        &self,
        source_id: SourceId,
        target: DateTime<Utc>,
    ) -> Result<ImageMetadata, FetchError> {
        let date = target.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let source = source_id.to_string();

        tracing::trace!(source_id, date = %date, "Requesting closest image");

        let response = self
            .client
            .get(self.endpoint(paths::CLOSEST_IMAGE_ENDPOINT))
            .query(&[("date", date.as_str()), ("sourceId", source.as_str())])
            .timeout(self.lookup_timeout)
            .send()?;

        let body: ClosestImageResponse = ensure_success(response)?.json()?;
        metadata_from_response(body, source_id)
    }

    fn download(&self, image_id: &str, width: u32) -> Result<DecodedImage, FetchError> {
        let size = width.to_string();

        tracing::trace!(image_id, width, "Downloading image");

        let response = self
            .client
            .get(self.endpoint(paths::DOWNLOAD_IMAGE_ENDPOINT))
            .query(&[
                ("id", image_id),
                ("width", size.as_str()),
                ("height", size.as_str()),
                ("type", "jpg"),
            ])
            .timeout(self.download_timeout)
            .send()?;

        let bytes = ensure_success(response)?.bytes()?;
        Ok(DecodedImage::decode(bytes.to_vec())?)
    }
}
