//! Google Drive upload client.
//!
//! Uploads a single image with Drive v3's multipart upload: one JSON
//! metadata part followed by the file bytes. The access token belongs to the
//! staff member's Google account and is supplied per call; the server never
//! stores it.

mod types;

pub use types::*;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::config::DriveConfig;

/// Errors that can occur when uploading to Drive.
#[derive(Debug, Error)]
pub enum DriveError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The token was rejected or lacks access to the folder.
    #[error("Could not upload to Google Drive. Check permissions.")]
    Permission,

    /// Drive returned another error status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by Drive.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Failed to build or parse a message.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Drive upload client.
#[derive(Clone)]
pub struct DriveClient {
    inner: Arc<DriveClientInner>,
}

struct DriveClientInner {
    client: reqwest::Client,
    upload_url: Url,
    folder_id: Option<String>,
}

impl std::fmt::Debug for DriveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveClient")
            .field("upload_url", &self.inner.upload_url.as_str())
            .field("folder_id", &self.inner.folder_id)
            .finish_non_exhaustive()
    }
}

impl DriveClient {
    /// Create a new Drive client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &DriveConfig) -> Result<Self, DriveError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(DriveClientInner {
                client,
                upload_url: config.upload_url.clone(),
                folder_id: config.folder_id.clone(),
            }),
        })
    }

    /// Upload an image into the configured folder.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::Permission`] when the token is rejected, or
    /// another error if the upload fails.
    #[instrument(skip(self, file, access_token), fields(name = %file.name, bytes = file.image.len()))]
    pub async fn upload(
        &self,
        file: &UploadFile,
        access_token: &SecretString,
    ) -> Result<StoredFile, DriveError> {
        let metadata = FileMetadata {
            name: &file.name,
            mime_type: file.image.mime_type(),
            parents: self.inner.folder_id.iter().map(String::as_str).collect(),
        };
        let metadata = serde_json::to_string(&metadata)
            .map_err(|e| DriveError::Parse(format!("Failed to encode metadata: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata)
                    .mime_str("application/json")
                    .map_err(|e| DriveError::Parse(e.to_string()))?,
            )
            .part(
                "file",
                reqwest::multipart::Part::bytes(file.image.bytes().to_vec())
                    .file_name(file.name.clone())
                    .mime_str(file.image.mime_type())
                    .map_err(|e| DriveError::Parse(e.to_string()))?,
            );

        let response = self
            .inner
            .client
            .post(self.inner.upload_url.clone())
            .bearer_auth(access_token.expose_secret())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let stored: StoredFile = response
                .json()
                .await
                .map_err(|e| DriveError::Parse(format!("Failed to parse response: {e}")))?;
            tracing::info!(file_id = %stored.id, "Uploaded image to Drive");
            return Ok(stored);
        }

        match status {
            reqwest::StatusCode::UNAUTHORIZED
            | reqwest::StatusCode::FORBIDDEN
            | reqwest::StatusCode::NOT_FOUND => {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(status = status.as_u16(), body = %body, "Drive rejected upload");
                Err(DriveError::Permission)
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60);
                Err(DriveError::RateLimited(retry_after))
            }
            _ => {
                let message = response.text().await.unwrap_or_default();
                Err(DriveError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}
