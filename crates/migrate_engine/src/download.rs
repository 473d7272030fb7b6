use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use thiserror::Error;

use migrate_core::{extract_image_id, file_extension, original_image_url};
use migrate_logging::{migrate_debug, migrate_info, migrate_warn};

use crate::persist::{atomic_write, ensure_dir, PersistError};
use crate::retry::{retry_with_backoff, BackoffSchedule};

// Some origins block default client user agents.
const BROWSER_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
    pub backoff: BackoffSchedule,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 20 * 1024 * 1024,
            backoff: BackoffSchedule::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid source url: {0}")]
    InvalidUrl(String),
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("response too large (max {max_bytes}, actual {actual})")]
    TooLarge { max_bytes: u64, actual: u64 },
    #[error("unexpected content type: {0}")]
    UnexpectedContentType(String),
    #[error("downloaded body is empty")]
    EmptyBody,
    #[error("scratch write failed: {0}")]
    Scratch(#[from] PersistError),
}

impl DownloadError {
    /// Transient failures are retried within the backoff budget; everything
    /// else fails the attempt outright.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DownloadError::Timeout(_)
                | DownloadError::Network(_)
                | DownloadError::EmptyBody
                | DownloadError::HttpStatus(500..=599)
        )
    }
}

/// Fetches legacy image bytes into a scratch file for file-mode uploads.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(
        &self,
        source_url: &str,
        scratch_dir: &Path,
    ) -> Result<PathBuf, DownloadError>;
}

#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
    settings: DownloadSettings,
}

impl HttpDownloader {
    pub fn new(settings: DownloadSettings) -> Result<Self, DownloadError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));
        headers.insert(ACCEPT, HeaderValue::from_static("image/*,*/*"));
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| DownloadError::Network(err.to_string()))?;
        Ok(Self { client, settings })
    }

    async fn fetch_image_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(DownloadError::UnexpectedContentType(content_type));
        }

        if let Some(len) = response.content_length() {
            if len > self.settings.max_bytes {
                return Err(DownloadError::TooLarge {
                    max_bytes: self.settings.max_bytes,
                    actual: len,
                });
            }
        }

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        if bytes.is_empty() {
            return Err(DownloadError::EmptyBody);
        }
        if bytes.len() as u64 > self.settings.max_bytes {
            return Err(DownloadError::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual: bytes.len() as u64,
            });
        }
        Ok(bytes.to_vec())
    }

    /// Fetch the untransformed image; when the origin serves a non-image
    /// payload for it, fall back to the transformed URL as-is.
    async fn fetch_with_fallback(
        &self,
        original_url: &str,
        transformed_url: &str,
    ) -> Result<Vec<u8>, DownloadError> {
        match self.fetch_image_bytes(original_url).await {
            Err(DownloadError::UnexpectedContentType(ct)) if original_url != transformed_url => {
                migrate_warn!(
                    "non-image content type {ct} from {original_url}, retrying transformed url"
                );
                self.fetch_image_bytes(transformed_url).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(
        &self,
        source_url: &str,
        scratch_dir: &Path,
    ) -> Result<PathBuf, DownloadError> {
        let image_id = extract_image_id(source_url)
            .map_err(|err| DownloadError::InvalidUrl(err.to_string()))?;
        let original_url = original_image_url(source_url)
            .map_err(|err| DownloadError::InvalidUrl(err.to_string()))?;
        let extension = file_extension(source_url);

        ensure_dir(scratch_dir)?;
        let target = scratch_dir.join(format!("{image_id}.{extension}"));

        // A previous interrupted run may have left the bytes in place.
        if let Ok(meta) = std::fs::metadata(&target) {
            if meta.len() > 0 {
                migrate_debug!("scratch file already present: {}", target.display());
                return Ok(target);
            }
        }

        let original = original_url.as_str();
        let bytes = retry_with_backoff(
            self.settings.backoff,
            move |_| self.fetch_with_fallback(original, source_url),
            DownloadError::is_transient,
        )
        .await?;

        if !looks_like_image(&bytes) {
            migrate_warn!("unrecognized image signature for {source_url}, keeping bytes anyway");
        }

        atomic_write(&target, &bytes)?;
        migrate_info!("downloaded {} bytes to {}", bytes.len(), target.display());
        Ok(target)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> DownloadError {
    if err.is_timeout() {
        DownloadError::Timeout(err.to_string())
    } else {
        DownloadError::Network(err.to_string())
    }
}

/// Magic-byte check for the formats seen in the legacy catalog. Unknown
/// signatures pass with a warning, as oddball-but-valid files exist.
fn looks_like_image(bytes: &[u8]) -> bool {
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";
    const JPEG: &[u8] = b"\xff\xd8\xff";
    const GIF87: &[u8] = b"GIF87a";
    const GIF89: &[u8] = b"GIF89a";

    if bytes.starts_with(PNG)
        || bytes.starts_with(JPEG)
        || bytes.starts_with(GIF87)
        || bytes.starts_with(GIF89)
    {
        return true;
    }
    // WEBP: RIFF....WEBP
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
}

#[cfg(test)]
mod tests {
    use super::looks_like_image;

    #[test]
    fn recognizes_common_signatures() {
        assert!(looks_like_image(b"\x89PNG\r\n\x1a\n....."));
        assert!(looks_like_image(b"\xff\xd8\xff\xe0rest"));
        assert!(looks_like_image(b"GIF89a..."));
        assert!(looks_like_image(b"RIFF\x00\x00\x00\x00WEBPVP8 "));
        assert!(!looks_like_image(b"<html>not an image</html>"));
    }
}
