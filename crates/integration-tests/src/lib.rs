//! Integration test support for CM Studio.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cm-integration-tests
//! ```
//!
//! No network access is needed. Remote services are replaced either by
//! in-process trait fakes ([`FakeGemini`], [`FakeLedger`], [`FakeStore`])
//! or by small axum servers bound to a loopback port ([`spawn_server`]).
//!
//! # Test Categories
//!
//! - `studio_orchestrator` - Edit, dictation and caption flows
//! - `sales` - Staff sign-in and the sale ledger
//! - `http_clients` - Gemini, ledger and Drive clients against fake servers
//! - `router` - The HTTP API end to end

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cm_studio::capture::{AudioSource, AudioTrack, CaptureError};
use cm_studio::drive::{StoredFile, UploadFile};
use cm_studio::services::{
    Backends, CaptionWriter, FileStore, ImageEditor, RemoteError, SaleLedger, StudioService,
    Transcriber, Workspace,
};
use cm_studio::state::{AppState, StudioOptions};
use cm_studio_core::{
    AudioClip, CaptionRequest, EditRequest, ImageAsset, Operation, SaleRecord,
    TranscriptionRequest, WorkspaceId,
};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Notify, Semaphore};

// =============================================================================
// Media fixtures
// =============================================================================

/// A small PNG-typed image whose last byte is `tag`.
#[must_use]
pub fn image(tag: u8) -> ImageAsset {
    ImageAsset::new("image/png", vec![0x89, b'P', b'N', b'G', tag]).expect("valid image")
}

/// A short WebM-typed audio clip.
#[must_use]
pub fn audio() -> AudioClip {
    AudioClip::new("audio/webm", vec![0x1a, 0x45, 0xdf, 0xa3]).expect("valid audio")
}

/// The image [`FakeGemini`] returns for an edit with `prompt`.
#[must_use]
pub fn edited(prompt: &str) -> ImageAsset {
    ImageAsset::new("image/png", format!("edited:{prompt}").into_bytes()).expect("valid image")
}

// =============================================================================
// Gate
// =============================================================================

/// Holds fake calls open until the test releases them.
#[derive(Debug, Clone)]
pub struct Gate {
    started: Arc<Notify>,
    release: Arc<Semaphore>,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            started: Arc::new(Notify::new()),
            release: Arc::new(Semaphore::new(0)),
        }
    }
}

impl Gate {
    /// Wait until a call has entered the gate.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Let one held call finish.
    pub fn release(&self) {
        self.release.add_permits(1);
    }

    async fn pass(&self) {
        self.started.notify_one();
        if let Ok(permit) = self.release.acquire().await {
            permit.forget();
        }
    }
}

// =============================================================================
// Gemini fake
// =============================================================================

/// Scripted stand-in for the image and text models.
#[derive(Debug, Default)]
pub struct FakeGemini {
    calls: Mutex<Vec<Operation>>,
    failure: Mutex<Option<RemoteError>>,
    transcripts: Mutex<Vec<String>>,
    caption: Mutex<String>,
    caption_images: Mutex<Vec<ImageAsset>>,
    gate: Mutex<Option<Gate>>,
}

impl FakeGemini {
    #[must_use]
    pub fn new() -> Self {
        Self {
            caption: Mutex::new("Gold hoops ✨ #CMJewelry".to_string()),
            ..Self::default()
        }
    }

    /// Fail every following call with `err`.
    pub fn fail_with(&self, err: RemoteError) {
        *self.failure.lock().expect("lock") = Some(err);
    }

    /// Let following calls succeed again.
    pub fn recover(&self) {
        *self.failure.lock().expect("lock") = None;
    }

    /// Queue a transcript; the default is empty speech.
    pub fn push_transcript(&self, text: &str) {
        self.transcripts.lock().expect("lock").push(text.to_string());
    }

    /// Hold following calls until the returned gate releases them.
    pub fn hold(&self) -> Gate {
        let gate = Gate::default();
        *self.gate.lock().expect("lock") = Some(gate.clone());
        gate
    }

    /// Stop holding calls.
    pub fn unhold(&self) {
        *self.gate.lock().expect("lock") = None;
    }

    /// Number of calls made for `operation`.
    #[must_use]
    pub fn calls(&self, operation: Operation) -> usize {
        self.calls
            .lock()
            .expect("lock")
            .iter()
            .filter(|op| **op == operation)
            .count()
    }

    /// Images sent along with caption requests.
    #[must_use]
    pub fn caption_images(&self) -> Vec<ImageAsset> {
        self.caption_images.lock().expect("lock").clone()
    }

    async fn begin(&self, operation: Operation) -> Result<(), RemoteError> {
        self.calls.lock().expect("lock").push(operation);
        let gate = self.gate.lock().expect("lock").clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        match self.failure.lock().expect("lock").clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ImageEditor for FakeGemini {
    async fn edit_image(&self, request: &EditRequest) -> Result<ImageAsset, RemoteError> {
        self.begin(Operation::Edit).await?;
        Ok(edited(request.prompt()))
    }
}

#[async_trait]
impl Transcriber for FakeGemini {
    async fn transcribe(&self, _request: &TranscriptionRequest) -> Result<String, RemoteError> {
        self.begin(Operation::Transcription).await?;
        let mut queue = self.transcripts.lock().expect("lock");
        Ok(if queue.is_empty() {
            String::new()
        } else {
            queue.remove(0)
        })
    }
}

#[async_trait]
impl CaptionWriter for FakeGemini {
    async fn write_caption(&self, request: &CaptionRequest) -> Result<String, RemoteError> {
        self.caption_images
            .lock()
            .expect("lock")
            .push(request.image().clone());
        self.begin(Operation::Caption).await?;
        Ok(self.caption.lock().expect("lock").clone())
    }
}

// =============================================================================
// Ledger and storage fakes
// =============================================================================

/// Records every sale it acknowledges.
#[derive(Debug, Default)]
pub struct FakeLedger {
    records: Mutex<Vec<SaleRecord>>,
    failure: Mutex<Option<RemoteError>>,
}

impl FakeLedger {
    pub fn fail_with(&self, err: RemoteError) {
        *self.failure.lock().expect("lock") = Some(err);
    }

    #[must_use]
    pub fn records(&self) -> Vec<SaleRecord> {
        self.records.lock().expect("lock").clone()
    }
}

#[async_trait]
impl SaleLedger for FakeLedger {
    async fn append(&self, record: &SaleRecord) -> Result<(), RemoteError> {
        if let Some(err) = self.failure.lock().expect("lock").clone() {
            return Err(err);
        }
        self.records.lock().expect("lock").push(record.clone());
        Ok(())
    }
}

/// One upload seen by [`FakeStore`].
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub name: String,
    pub image: ImageAsset,
    pub token: String,
}

/// Accepts uploads unless the token is `"revoked"`.
#[derive(Debug, Default)]
pub struct FakeStore {
    uploads: Mutex<Vec<StoredUpload>>,
}

impl FakeStore {
    #[must_use]
    pub fn uploads(&self) -> Vec<StoredUpload> {
        self.uploads.lock().expect("lock").clone()
    }
}

#[async_trait]
impl FileStore for FakeStore {
    async fn upload(
        &self,
        file: &UploadFile,
        access_token: &SecretString,
    ) -> Result<StoredFile, RemoteError> {
        let token = access_token.expose_secret().to_string();
        if token == "revoked" {
            return Err(RemoteError::Permission(
                "Could not upload to Google Drive. Check permissions.".to_string(),
            ));
        }
        let mut uploads = self.uploads.lock().expect("lock");
        uploads.push(StoredUpload {
            name: file.name.clone(),
            image: file.image.clone(),
            token,
        });
        Ok(StoredFile {
            id: format!("file-{}", uploads.len()),
            web_view_link: Some(format!("https://drive.example/file-{}", uploads.len())),
            name: file.name.clone(),
        })
    }
}

// =============================================================================
// Microphone fake
// =============================================================================

/// Audio source that counts acquisitions and releases.
#[derive(Debug, Clone, Default)]
pub struct FakeMic {
    pub acquired: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
    pub denied: bool,
    pub silent: bool,
}

impl FakeMic {
    #[must_use]
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

struct FakeTrack {
    released: Arc<AtomicUsize>,
    silent: bool,
}

impl AudioTrack for FakeTrack {
    fn mime_type(&self) -> &str {
        "audio/webm"
    }

    fn finish(&mut self) -> Vec<u8> {
        if self.silent {
            Vec::new()
        } else {
            audio().into_bytes()
        }
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AudioSource for FakeMic {
    async fn acquire(&self) -> Result<Box<dyn AudioTrack>, CaptureError> {
        if self.denied {
            return Err(CaptureError::PermissionDenied);
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeTrack {
            released: Arc::clone(&self.released),
            silent: self.silent,
        }))
    }
}

// =============================================================================
// Harness
// =============================================================================

/// Fakes wired into a studio.
#[derive(Debug, Clone)]
pub struct Harness {
    pub gemini: Arc<FakeGemini>,
    pub ledger: Arc<FakeLedger>,
    pub store: Arc<FakeStore>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        Self {
            gemini: Arc::new(FakeGemini::new()),
            ledger: Arc::new(FakeLedger::default()),
            store: Arc::new(FakeStore::default()),
        }
    }

    /// Backends backed by the fakes. `with_ledger` toggles sale recording.
    #[must_use]
    pub fn backends(&self, with_ledger: bool) -> Backends {
        Backends {
            editor: self.gemini.clone(),
            transcriber: self.gemini.clone(),
            captions: self.gemini.clone(),
            ledger: with_ledger.then(|| self.ledger.clone() as Arc<dyn SaleLedger>),
            storage: self.store.clone(),
        }
    }

    /// Orchestrator with the given per-call timeout.
    #[must_use]
    pub fn studio(&self, request_timeout: Duration) -> StudioService {
        StudioService::new(self.backends(true), request_timeout)
    }

    /// Full application state with default options.
    #[must_use]
    pub fn state(&self) -> AppState {
        AppState::new(self.backends(true), StudioOptions::default())
    }
}

/// A standalone workspace with the default history capacity.
#[must_use]
pub fn workspace() -> Workspace {
    Workspace::new(
        WorkspaceId::generate(),
        cm_studio_core::DEFAULT_HISTORY_CAPACITY,
    )
}

// =============================================================================
// Fake HTTP servers
// =============================================================================

/// Serve `router` on a loopback port and return its address.
pub async fn spawn_server(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    addr
}
