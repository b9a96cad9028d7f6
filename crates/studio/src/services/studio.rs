//! Remote edit orchestrator.
//!
//! Every remote operation follows the same steps:
//!
//! 1. Build and validate the request from the session under the lock, and
//!    capture the session's context epoch. Validation failures return here,
//!    before any network call.
//! 2. Claim the operation's slot (one call per operation type) and run the
//!    call under the slot's cancellation token and the request timeout.
//! 3. Merge the result into the session in one locked step, tagged with the
//!    captured epoch so results for an abandoned context are discarded.
//!
//! Failures leave the session untouched apart from its error message. The
//! slot is released by its guard on every path.

use std::future::Future;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use cm_studio_core::{
    AspectRatio, AudioClip, ContextEpoch, HistoryEntryId, ImageAsset, Operation, SessionError,
    StudioSession, TranscriptionRequest, ValidationError, find_preset,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::capture::{CaptureError, Recording};
use crate::drive::{StoredFile, UploadFile, default_file_name};

use super::backend::{Backends, RemoteError};
use super::slot::{Interrupted, run_cancellable};
use super::workspaces::Workspace;

/// Orchestrator errors.
#[derive(Debug, Error)]
pub enum StudioError {
    /// A local rule failed; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The same operation is already in flight.
    #[error("{} is already in progress.", operation_label(.0))]
    Busy(Operation),

    /// The call was aborted.
    #[error("The {0} request was cancelled.")]
    Cancelled(Operation),

    /// The call ran past the deadline.
    #[error("The {0} request timed out after {secs} seconds.", secs = .1.as_secs())]
    TimedOut(Operation, Duration),

    /// The result belongs to a context that has since been replaced.
    #[error("The image changed while the request was running; the result was discarded.")]
    Superseded(Operation),

    /// The remote service failed.
    #[error("{message}")]
    Remote {
        operation: Option<Operation>,
        message: String,
        #[source]
        source: RemoteError,
    },

    /// Audio capture failed.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// No cloud-storage token was supplied.
    #[error("Connect a Google account to upload to Drive.")]
    MissingToken,

    /// No history entry with that id.
    #[error("History entry not found.")]
    EntryNotFound(HistoryEntryId),

    /// No preset with that id.
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    /// The workspace has been closed.
    #[error("This workspace has been closed.")]
    Closed,
}

const fn operation_label(operation: &Operation) -> &'static str {
    match operation {
        Operation::Edit => "An edit",
        Operation::Transcription => "A transcription",
        Operation::Caption => "A caption",
    }
}

impl StudioError {
    fn remote(operation: Operation, source: RemoteError) -> Self {
        let message = match (&source, operation) {
            (RemoteError::Failed(_), Operation::Edit) => "Error generating edit.".to_string(),
            (RemoteError::Failed(_), Operation::Transcription) => {
                "Transcription failed. Try recording again.".to_string()
            }
            (RemoteError::Failed(_), Operation::Caption) => {
                "Error generating caption.".to_string()
            }
            _ => source.to_string(),
        };
        Self::Remote {
            operation: Some(operation),
            message,
            source,
        }
    }

    fn interrupted(operation: Operation, interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::Cancelled => Self::Cancelled(operation),
            Interrupted::TimedOut(after) => Self::TimedOut(operation, after),
        }
    }

    fn from_session(operation: Operation, err: SessionError) -> Self {
        match err {
            SessionError::Validation(e) => Self::Validation(e),
            SessionError::Superseded => Self::Superseded(operation),
            SessionError::EntryNotFound(id) => Self::EntryNotFound(id),
        }
    }

    /// Whether this error should be shown in the session's error banner.
    const fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Remote { .. } | Self::TimedOut(..) | Self::Capture(_)
        )
    }
}

/// Result of a successful edit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOutcome {
    pub entry_id: HistoryEntryId,
    pub processed: ImageAsset,
}

/// Result of a successful transcription.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptOutcome {
    /// Text returned by the model (trimmed, possibly empty).
    pub transcript: String,
    /// Prompt after appending.
    pub prompt: String,
    /// Whether the prompt changed.
    pub appended: bool,
}

/// Changes to the prompt controls. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptUpdate {
    /// Replace the prompt text.
    pub prompt: Option<String>,
    /// Replace the prompt with a preset's instruction. Applied after `prompt`.
    pub preset_id: Option<String>,
    /// Change the framing.
    pub aspect_ratio: Option<AspectRatio>,
}

/// A download-ready image.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub image: ImageAsset,
}

/// Coordinates session state with the remote services.
#[derive(Clone, Debug)]
pub struct StudioService {
    backends: Backends,
    request_timeout: Duration,
}

impl StudioService {
    #[must_use]
    pub const fn new(backends: Backends, request_timeout: Duration) -> Self {
        Self {
            backends,
            request_timeout,
        }
    }

    #[must_use]
    pub const fn backends(&self) -> &Backends {
        &self.backends
    }

    // -------------------------------------------------------------------------
    // Session transitions
    // -------------------------------------------------------------------------

    /// Start a fresh editing context from a new original image.
    #[instrument(skip(self, workspace, image), fields(workspace_id = %workspace.id(), mime_type = image.mime_type()))]
    pub fn set_original(&self, workspace: &Workspace, image: ImageAsset) {
        workspace.with_session(|session| session.set_original(image));
    }

    /// Clear the working state, keeping history.
    pub fn reset(&self, workspace: &Workspace) {
        workspace.with_session(StudioSession::reset);
    }

    /// Make a past edit the active state.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::EntryNotFound`] for an unknown entry.
    pub fn restore(&self, workspace: &Workspace, id: HistoryEntryId) -> Result<(), StudioError> {
        workspace
            .with_session(|session| session.restore(id))
            .map_err(|e| StudioError::from_session(Operation::Edit, e))
    }

    /// Apply changes to the prompt, preset and aspect ratio.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::UnknownPreset`] without changing anything if
    /// the preset id is unknown.
    pub fn update_prompt(
        &self,
        workspace: &Workspace,
        update: PromptUpdate,
    ) -> Result<(), StudioError> {
        let preset = update
            .preset_id
            .as_deref()
            .map(|id| find_preset(id).ok_or_else(|| StudioError::UnknownPreset(id.to_string())))
            .transpose()?;

        workspace.with_session(|session| {
            if let Some(prompt) = update.prompt {
                session.set_prompt(prompt);
            }
            if let Some(preset) = preset {
                session.apply_preset(preset);
            }
            if let Some(aspect_ratio) = update.aspect_ratio {
                session.set_aspect_ratio(aspect_ratio);
            }
            session.clear_error();
        });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Remote operations
    // -------------------------------------------------------------------------

    /// Edit the original image with the current prompt and aspect ratio.
    ///
    /// # Errors
    ///
    /// Returns a validation error (no call made), [`StudioError::Busy`], or
    /// the remote/cancellation failure. On failure the images are unchanged.
    #[instrument(skip(self, workspace), fields(workspace_id = %workspace.id()))]
    pub async fn apply_edit(&self, workspace: &Workspace) -> Result<EditOutcome, StudioError> {
        let (request, epoch) = prepare(workspace, StudioSession::edit_request)?;

        let result = self
            .run_remote(
                workspace,
                Operation::Edit,
                self.backends.editor.edit_image(&request),
            )
            .await
            .and_then(|processed| {
                workspace
                    .with_session(|session| {
                        session.commit_edit(
                            epoch,
                            processed.clone(),
                            request.prompt(),
                            request.aspect_ratio(),
                            Utc::now(),
                        )
                    })
                    .map(|entry_id| EditOutcome {
                        entry_id,
                        processed,
                    })
                    .map_err(|e| StudioError::from_session(Operation::Edit, e))
            });

        finish(workspace, epoch, result)
    }

    /// Transcribe a clip and append the text to the prompt.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::Busy`] or the remote/cancellation failure.
    #[instrument(skip(self, workspace, clip), fields(workspace_id = %workspace.id(), audio_bytes = clip.len()))]
    pub async fn transcribe(
        &self,
        workspace: &Workspace,
        clip: AudioClip,
    ) -> Result<TranscriptOutcome, StudioError> {
        let request = TranscriptionRequest::new(clip);
        let epoch = workspace.with_session(|session| session.epoch());

        let result = self
            .run_remote(
                workspace,
                Operation::Transcription,
                self.backends.transcriber.transcribe(&request),
            )
            .await
            .and_then(|transcript| {
                workspace
                    .with_session(|session| {
                        let appended = session.append_transcript(epoch, &transcript)?;
                        Ok(TranscriptOutcome {
                            transcript,
                            prompt: session.prompt().to_string(),
                            appended,
                        })
                    })
                    .map_err(|e| StudioError::from_session(Operation::Transcription, e))
            });

        finish(workspace, epoch, result)
    }

    /// Stop a recording and transcribe it.
    ///
    /// The device is released before the transcription call starts, so it
    /// is free whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns a capture error if nothing was recorded, otherwise as
    /// [`Self::transcribe`].
    pub async fn dictate(
        &self,
        workspace: &Workspace,
        recording: Recording,
    ) -> Result<TranscriptOutcome, StudioError> {
        let clip = match recording.stop() {
            Ok(clip) => clip,
            Err(e) => {
                let err = StudioError::Capture(e);
                workspace.with_session(|session| session.set_error(err.to_string()));
                return Err(err);
            }
        };
        self.transcribe(workspace, clip).await
    }

    /// Generate a caption for the processed image (else the original).
    ///
    /// # Errors
    ///
    /// Returns a validation error if there is no image, [`StudioError::Busy`],
    /// or the remote/cancellation failure.
    #[instrument(skip(self, workspace, idea), fields(workspace_id = %workspace.id()))]
    pub async fn generate_caption(
        &self,
        workspace: &Workspace,
        idea: &str,
    ) -> Result<String, StudioError> {
        let (request, epoch) = prepare(workspace, |session| session.caption_request(idea))?;

        let result = self
            .run_remote(
                workspace,
                Operation::Caption,
                self.backends.captions.write_caption(&request),
            )
            .await
            .and_then(|caption| {
                workspace
                    .with_session(|session| session.set_caption(epoch, caption.clone()))
                    .map(|()| caption)
                    .map_err(|e| StudioError::from_session(Operation::Caption, e))
            });

        finish(workspace, epoch, result)
    }

    /// Cancel an in-flight operation. Returns whether one was running.
    pub fn abort(&self, workspace: &Workspace, operation: Operation) -> bool {
        let aborted = workspace.abort(operation);
        if aborted {
            tracing::info!(workspace_id = %workspace.id(), %operation, "Operation aborted");
        }
        aborted
    }

    // -------------------------------------------------------------------------
    // Export
    // -------------------------------------------------------------------------

    /// The processed image with its download file name.
    #[must_use]
    pub fn download(&self, workspace: &Workspace, today: NaiveDate) -> Option<Download> {
        workspace.with_session(|session| {
            session.processed().map(|image| Download {
                file_name: default_file_name(today, image.mime_type()),
                image: image.clone(),
            })
        })
    }

    /// Upload the processed image (else the original) to cloud storage.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::MissingToken`] without a token, a validation
    /// error without an image, or the remote failure.
    #[instrument(skip(self, workspace, file_name, access_token), fields(workspace_id = %workspace.id()))]
    pub async fn upload(
        &self,
        workspace: &Workspace,
        file_name: Option<String>,
        access_token: Option<SecretString>,
    ) -> Result<StoredFile, StudioError> {
        let access_token = access_token.ok_or(StudioError::MissingToken)?;
        let image = workspace
            .with_session(|session| session.display_image().cloned())
            .ok_or(ValidationError::MissingImage)?;
        let name = file_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| default_file_name(Utc::now().date_naive(), image.mime_type()));
        let file = UploadFile { name, image };

        run_cancellable(
            workspace.cancel_token(),
            self.request_timeout,
            self.backends.storage.upload(&file, &access_token),
        )
        .await
        .map_err(|interrupted| match interrupted {
            Interrupted::Cancelled => StudioError::Closed,
            Interrupted::TimedOut(after) => StudioError::Remote {
                operation: None,
                message: format!("The upload timed out after {} seconds.", after.as_secs()),
                source: RemoteError::Failed("timeout".to_string()),
            },
        })?
        .map_err(|source| StudioError::Remote {
            operation: None,
            message: source.to_string(),
            source,
        })
    }

    /// Claim the operation's slot and drive `call` under its token.
    async fn run_remote<T, F>(
        &self,
        workspace: &Workspace,
        operation: Operation,
        call: F,
    ) -> Result<T, StudioError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        if workspace.is_closed() {
            return Err(StudioError::Closed);
        }
        let guard = workspace
            .slot(operation)
            .try_begin(workspace.cancel_token())
            .ok_or(StudioError::Busy(operation))?;
        // Only a call that owns its slot may clear the banner.
        workspace.with_session(StudioSession::clear_error);

        match guard.run(self.request_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => {
                tracing::warn!(%operation, error = ?source, "Remote call failed");
                Err(StudioError::remote(operation, source))
            }
            Err(interrupted) => {
                tracing::info!(%operation, ?interrupted, "Remote call interrupted");
                Err(StudioError::interrupted(operation, interrupted))
            }
        }
    }
}

/// Build a request from the session, recording validation failures.
fn prepare<T>(
    workspace: &Workspace,
    build: impl FnOnce(&StudioSession) -> Result<T, ValidationError>,
) -> Result<(T, ContextEpoch), StudioError> {
    workspace.with_session(|session| match build(session) {
        Ok(request) => Ok((request, session.epoch())),
        Err(e) => {
            session.set_error(e.to_string());
            Err(StudioError::Validation(e))
        }
    })
}

/// Surface a failure in the session if it still belongs to `epoch`.
fn finish<T>(
    workspace: &Workspace,
    epoch: ContextEpoch,
    result: Result<T, StudioError>,
) -> Result<T, StudioError> {
    if let Err(err) = &result
        && err.is_user_visible()
    {
        workspace.with_session(|session| {
            if session.epoch() == epoch {
                session.set_error(err.to_string());
            }
        });
    }
    result
}
