//! Remote service seams used by the orchestrator.
//!
//! The orchestrator only sees these traits, so tests and the CLI can swap
//! in other implementations. Production wiring lives in
//! [`Backends::from_config`].

use std::sync::Arc;

use async_trait::async_trait;
use cm_studio_core::{CaptionRequest, EditRequest, ImageAsset, SaleRecord, TranscriptionRequest};
use secrecy::SecretString;
use thiserror::Error;

use crate::config::StudioConfig;
use crate::drive::{DriveClient, DriveError, StoredFile, UploadFile};
use crate::gemini::{GeminiClient, GeminiError};
use crate::ledger::{LedgerClient, LedgerError};

/// A failed remote call, classified for the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Credentials were rejected.
    #[error("{0}")]
    Permission(String),
    /// The service asked us to slow down.
    #[error("The service is busy, try again in {0} seconds.")]
    RateLimited(u64),
    /// The call succeeded but the expected payload was missing.
    #[error("{0}")]
    MissingPayload(String),
    /// Anything else: network failure, error status, unparseable body.
    #[error("{0}")]
    Failed(String),
}

impl From<GeminiError> for RemoteError {
    fn from(err: GeminiError) -> Self {
        match err {
            GeminiError::Unauthorized(message) => Self::Permission(message),
            GeminiError::RateLimited(secs) => Self::RateLimited(secs),
            GeminiError::NoImage | GeminiError::NoText => Self::MissingPayload(err.to_string()),
            other => Self::Failed(other.to_string()),
        }
    }
}

impl From<DriveError> for RemoteError {
    fn from(err: DriveError) -> Self {
        match err {
            DriveError::Permission => Self::Permission(err.to_string()),
            DriveError::RateLimited(secs) => Self::RateLimited(secs),
            other => Self::Failed(other.to_string()),
        }
    }
}

impl From<LedgerError> for RemoteError {
    fn from(err: LedgerError) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Produces an edited image.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    async fn edit_image(&self, request: &EditRequest) -> Result<ImageAsset, RemoteError>;
}

/// Turns recorded speech into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String, RemoteError>;
}

/// Writes social-media captions.
#[async_trait]
pub trait CaptionWriter: Send + Sync {
    async fn write_caption(&self, request: &CaptionRequest) -> Result<String, RemoteError>;
}

/// Appends sales to the ledger. `Ok` means the ledger acknowledged the row.
#[async_trait]
pub trait SaleLedger: Send + Sync {
    async fn append(&self, record: &SaleRecord) -> Result<(), RemoteError>;
}

/// Stores images in the cloud.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn upload(
        &self,
        file: &UploadFile,
        access_token: &SecretString,
    ) -> Result<StoredFile, RemoteError>;
}

#[async_trait]
impl ImageEditor for GeminiClient {
    async fn edit_image(&self, request: &EditRequest) -> Result<ImageAsset, RemoteError> {
        Ok(Self::edit_image(self, request).await?)
    }
}

#[async_trait]
impl Transcriber for GeminiClient {
    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String, RemoteError> {
        Ok(Self::transcribe(self, request).await?)
    }
}

#[async_trait]
impl CaptionWriter for GeminiClient {
    async fn write_caption(&self, request: &CaptionRequest) -> Result<String, RemoteError> {
        Ok(Self::write_caption(self, request).await?)
    }
}

#[async_trait]
impl SaleLedger for LedgerClient {
    async fn append(&self, record: &SaleRecord) -> Result<(), RemoteError> {
        Ok(Self::append(self, record).await?)
    }
}

#[async_trait]
impl FileStore for DriveClient {
    async fn upload(
        &self,
        file: &UploadFile,
        access_token: &SecretString,
    ) -> Result<StoredFile, RemoteError> {
        Ok(Self::upload(self, file, access_token).await?)
    }
}

/// Errors building the production clients.
#[derive(Debug, Error)]
pub enum BackendInitError {
    #[error("Gemini client: {0}")]
    Gemini(#[from] GeminiError),
    #[error("Drive client: {0}")]
    Drive(#[from] DriveError),
    #[error("Ledger client: {0}")]
    Ledger(#[from] LedgerError),
}

/// The set of remote services a studio talks to.
#[derive(Clone)]
pub struct Backends {
    pub editor: Arc<dyn ImageEditor>,
    pub transcriber: Arc<dyn Transcriber>,
    pub captions: Arc<dyn CaptionWriter>,
    /// `None` when no ledger webhook is configured.
    pub ledger: Option<Arc<dyn SaleLedger>>,
    pub storage: Arc<dyn FileStore>,
}

impl Backends {
    /// Build the production clients.
    ///
    /// # Errors
    ///
    /// Returns an error if any HTTP client fails to build.
    pub fn from_config(config: &StudioConfig) -> Result<Self, BackendInitError> {
        let gemini = Arc::new(GeminiClient::new(&config.gemini)?);
        let ledger = config
            .ledger()
            .map(LedgerClient::new)
            .transpose()?
            .map(|client| Arc::new(client) as Arc<dyn SaleLedger>);
        let storage = Arc::new(DriveClient::new(&config.drive)?);

        Ok(Self {
            editor: gemini.clone(),
            transcriber: gemini.clone(),
            captions: gemini,
            ledger,
            storage,
        })
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("ledger", &self.ledger.is_some())
            .finish_non_exhaustive()
    }
}
