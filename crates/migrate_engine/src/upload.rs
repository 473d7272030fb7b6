use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use thiserror::Error;

use migrate_logging::{migrate_debug, migrate_info};

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com";
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Provider account credentials plus the target folder.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadErrorKind {
    /// Invalid credentials; fatal for the whole run.
    Auth,
    /// Rate limit or quota exhausted; fatal for the whole run.
    Quota,
    /// The provider rejected this asset; permanent for the item only.
    Content,
    /// Transport-level failure; retryable on the next resume.
    Network,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("upload failed ({kind:?}): {message}")]
pub struct UploadError {
    pub kind: UploadErrorKind,
    pub message: String,
}

impl UploadError {
    fn new(kind: UploadErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Auth and quota failures abort the remaining batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, UploadErrorKind::Auth | UploadErrorKind::Quota)
    }
}

/// Provider-assigned asset reference for an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    /// Full public id including the folder prefix.
    pub public_id: String,
    /// Delivery URL as echoed by the provider, without transform params.
    pub secure_url: Option<String>,
}

/// Submits images to the hosting provider, either by source URL (the
/// provider fetches server-side) or as local file bytes.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload_from_url(
        &self,
        source_url: &str,
        public_id: &str,
    ) -> Result<UploadedAsset, UploadError>;

    async fn upload_file(
        &self,
        path: &Path,
        public_id: &str,
    ) -> Result<UploadedAsset, UploadError>;

    /// Cheap credential probe, run once before a non-dry run starts.
    async fn ping(&self) -> Result<(), UploadError>;
}

#[derive(Debug, Clone)]
pub struct CloudinaryUploader {
    client: reqwest::Client,
    credentials: ProviderCredentials,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ApiErrorMessage {
    message: String,
}

impl CloudinaryUploader {
    pub fn new(credentials: ProviderCredentials) -> Result<Self, UploadError> {
        Self::with_api_base(credentials, DEFAULT_API_BASE)
    }

    /// Point the uploader at a different API host. Tests use this to target
    /// a local mock server.
    pub fn with_api_base(
        credentials: ProviderCredentials,
        api_base: impl Into<String>,
    ) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|err| UploadError::new(UploadErrorKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            credentials,
            api_base: api_base.into(),
        })
    }

    fn upload_endpoint(&self) -> String {
        format!(
            "{}/v1_1/{}/image/upload",
            self.api_base, self.credentials.cloud_name
        )
    }

    /// Signed upload parameters: everything except `file` and `api_key`
    /// participates in the signature, sorted by key.
    fn signed_params(&self, public_id: &str) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("folder".to_string(), self.credentials.folder.clone());
        params.insert("overwrite".to_string(), "true".to_string());
        params.insert("public_id".to_string(), public_id.to_string());
        params.insert(
            "timestamp".to_string(),
            chrono::Utc::now().timestamp().to_string(),
        );
        params
    }

    fn signature(&self, params: &BTreeMap<String, String>) -> String {
        let mut to_sign = params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        to_sign.push_str(&self.credentials.api_secret);

        let mut hasher = Sha1::new();
        hasher.update(to_sign.as_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest.iter() {
            let _ = write!(&mut hex, "{byte:02x}");
        }
        hex
    }

    fn build_form(&self, public_id: &str) -> multipart::Form {
        let params = self.signed_params(public_id);
        let signature = self.signature(&params);
        let mut form = multipart::Form::new();
        for (key, value) in params {
            form = form.text(key, value);
        }
        form.text("api_key", self.credentials.api_key.clone())
            .text("signature", signature)
    }

    async fn submit(
        &self,
        form: multipart::Form,
        source: &str,
    ) -> Result<UploadedAsset, UploadError> {
        migrate_debug!("uploading {source} to {}", self.upload_endpoint());
        let response = self
            .client
            .post(self.upload_endpoint())
            .multipart(form)
            .send()
            .await
            .map_err(|err| UploadError::new(UploadErrorKind::Network, err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: UploadResponse = response
                .json()
                .await
                .map_err(|err| UploadError::new(UploadErrorKind::Network, err.to_string()))?;
            migrate_info!("uploaded as {}", body.public_id);
            return Ok(UploadedAsset {
                public_id: body.public_id,
                secure_url: body.secure_url,
            });
        }

        let kind = classify_status(status.as_u16());
        let message = match response.json::<ApiErrorBody>().await {
            Ok(body) => format!("{} ({})", body.error.message, status),
            Err(_) => status.to_string(),
        };
        Err(UploadError::new(kind, message))
    }
}

fn classify_status(status: u16) -> UploadErrorKind {
    match status {
        401 | 403 => UploadErrorKind::Auth,
        420 | 429 => UploadErrorKind::Quota,
        400..=499 => UploadErrorKind::Content,
        _ => UploadErrorKind::Network,
    }
}

#[async_trait]
impl Uploader for CloudinaryUploader {
    async fn upload_from_url(
        &self,
        source_url: &str,
        public_id: &str,
    ) -> Result<UploadedAsset, UploadError> {
        let form = self
            .build_form(public_id)
            .text("file", source_url.to_string());
        self.submit(form, source_url).await
    }

    async fn upload_file(
        &self,
        path: &Path,
        public_id: &str,
    ) -> Result<UploadedAsset, UploadError> {
        let bytes = tokio::fs::read(path).await.map_err(|err| {
            UploadError::new(
                UploadErrorKind::Content,
                format!("cannot read {}: {err}", path.display()),
            )
        })?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let part = multipart::Part::bytes(bytes).file_name(filename);
        let form = self.build_form(public_id).part("file", part);
        self.submit(form, &path.display().to_string()).await
    }

    async fn ping(&self) -> Result<(), UploadError> {
        let url = format!("{}/v1_1/{}/usage", self.api_base, self.credentials.cloud_name);
        let response = self
            .client
            .get(url)
            .basic_auth(
                &self.credentials.api_key,
                Some(&self.credentials.api_secret),
            )
            .send()
            .await
            .map_err(|err| UploadError::new(UploadErrorKind::Network, err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(UploadError::new(
                classify_status(status.as_u16()),
                format!("credential check failed: {status}"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploader() -> CloudinaryUploader {
        CloudinaryUploader::new(ProviderCredentials {
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            folder: "product-images".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn signature_covers_sorted_params() {
        let up = uploader();
        let mut params = BTreeMap::new();
        params.insert("public_id".to_string(), "abc".to_string());
        params.insert("folder".to_string(), "f".to_string());
        params.insert("timestamp".to_string(), "1000".to_string());
        // folder=f&public_id=abc&timestamp=1000secret
        let expected = {
            let mut hasher = Sha1::new();
            hasher.update(b"folder=f&public_id=abc&timestamp=1000secret");
            let digest = hasher.finalize();
            let mut hex = String::new();
            for byte in digest.iter() {
                use std::fmt::Write;
                let _ = write!(&mut hex, "{byte:02x}");
            }
            hex
        };
        assert_eq!(up.signature(&params), expected);
    }

    #[test]
    fn status_classification_matches_taxonomy() {
        assert_eq!(classify_status(401), UploadErrorKind::Auth);
        assert_eq!(classify_status(403), UploadErrorKind::Auth);
        assert_eq!(classify_status(420), UploadErrorKind::Quota);
        assert_eq!(classify_status(429), UploadErrorKind::Quota);
        assert_eq!(classify_status(400), UploadErrorKind::Content);
        assert_eq!(classify_status(500), UploadErrorKind::Network);
    }
}
