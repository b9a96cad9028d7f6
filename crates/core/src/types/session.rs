//! The live editing session: current image pair, prompt and history.
//!
//! All transitions are synchronous. Remote calls happen elsewhere; their
//! results are merged here in a single step so that a failed or abandoned
//! call never leaves partial state behind.
//!
//! Every transition that establishes a new editing context (new original,
//! reset, restore) advances the session's [`ContextEpoch`]. Callers capture
//! the epoch before a remote call and pass it back when merging the result,
//! so a result that belongs to an abandoned context is rejected.

use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::edit::{AspectRatio, CaptionRequest, EditRequest, ValidationError};
use super::history::{EditHistory, HistoryEntry};
use super::id::HistoryEntryId;
use super::media::ImageAsset;
use super::preset::Preset;
use super::status::{LedgerStatus, PendingOperations};

/// Monotonic counter identifying an editing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct ContextEpoch(u64);

impl ContextEpoch {
    const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Errors from merging results or restoring entries.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A local validation rule failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The result belongs to an editing context that has since been replaced.
    #[error("The image changed while the request was running; the result was discarded.")]
    Superseded,
    /// No history entry with that id.
    #[error("History entry not found.")]
    EntryNotFound(HistoryEntryId),
}

/// Single-session editing state.
#[derive(Debug, Clone, Default)]
pub struct StudioSession {
    original: Option<ImageAsset>,
    processed: Option<ImageAsset>,
    prompt: String,
    aspect_ratio: AspectRatio,
    caption: Option<String>,
    error: Option<String>,
    ledger_status: LedgerStatus,
    history: EditHistory,
    epoch: ContextEpoch,
}

impl StudioSession {
    /// Empty session with a history of the given capacity.
    #[must_use]
    pub fn new(history_capacity: NonZeroUsize) -> Self {
        Self {
            history: EditHistory::with_capacity(history_capacity),
            ..Self::default()
        }
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Start a fresh editing context from a new original image.
    pub fn set_original(&mut self, image: ImageAsset) {
        self.original = Some(image);
        self.processed = None;
        self.prompt.clear();
        self.caption = None;
        self.error = None;
        self.ledger_status = LedgerStatus::Idle;
        self.epoch = self.epoch.next();
    }

    /// Record a successful edit made in context `epoch`.
    ///
    /// Sets the processed image and prepends a history entry.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Superseded`] if the context changed since
    /// `epoch`, or a validation error if there is no original image.
    pub fn commit_edit(
        &mut self,
        epoch: ContextEpoch,
        processed: ImageAsset,
        prompt: &str,
        aspect_ratio: AspectRatio,
        now: DateTime<Utc>,
    ) -> Result<HistoryEntryId, SessionError> {
        self.ensure_current(epoch)?;
        let original = self
            .original
            .clone()
            .ok_or(ValidationError::MissingImage)?;

        let entry = HistoryEntry::new(
            original,
            processed.clone(),
            prompt.to_string(),
            aspect_ratio,
            now,
        );
        let id = entry.id();
        self.history.record(entry);
        self.processed = Some(processed);
        self.error = None;
        self.ledger_status = LedgerStatus::Idle;
        Ok(id)
    }

    /// Make a past edit the active state. History is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EntryNotFound`] if no entry has that id.
    pub fn restore(&mut self, id: HistoryEntryId) -> Result<(), SessionError> {
        let entry = self
            .history
            .find(id)
            .ok_or(SessionError::EntryNotFound(id))?;

        self.original = Some(entry.original().clone());
        self.processed = Some(entry.processed().clone());
        self.prompt = entry.prompt().to_string();
        self.aspect_ratio = entry.aspect_ratio();
        self.caption = None;
        self.error = None;
        self.epoch = self.epoch.next();
        Ok(())
    }

    /// Clear the working state. History is kept.
    pub fn reset(&mut self) {
        self.original = None;
        self.processed = None;
        self.prompt.clear();
        self.caption = None;
        self.error = None;
        self.ledger_status = LedgerStatus::Idle;
        self.epoch = self.epoch.next();
    }

    /// Replace the prompt text.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    /// Replace the prompt with a preset's instruction.
    pub fn apply_preset(&mut self, preset: &Preset) {
        self.prompt = preset.prompt.to_string();
    }

    /// Choose the framing for the next edit.
    pub const fn set_aspect_ratio(&mut self, aspect_ratio: AspectRatio) {
        self.aspect_ratio = aspect_ratio;
    }

    /// Append dictated text to the prompt, separated by a space.
    ///
    /// Blank transcripts leave the prompt unchanged. Returns whether the
    /// prompt changed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Superseded`] if the context changed since
    /// `epoch`.
    pub fn append_transcript(
        &mut self,
        epoch: ContextEpoch,
        transcript: &str,
    ) -> Result<bool, SessionError> {
        self.ensure_current(epoch)?;
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Ok(false);
        }
        if !self.prompt.is_empty() {
            self.prompt.push(' ');
        }
        self.prompt.push_str(transcript);
        self.error = None;
        Ok(true)
    }

    /// Store a generated caption.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Superseded`] if the context changed since
    /// `epoch`.
    pub fn set_caption(
        &mut self,
        epoch: ContextEpoch,
        caption: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.ensure_current(epoch)?;
        self.caption = Some(caption.into());
        self.error = None;
        Ok(())
    }

    /// Surface an error message to the user.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Dismiss the current error message.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Update the sale-ledger submission state.
    pub const fn set_ledger_status(&mut self, status: LedgerStatus) {
        self.ledger_status = status;
    }

    // -------------------------------------------------------------------------
    // Request builders
    // -------------------------------------------------------------------------

    /// Build an edit request from the current original, prompt and ratio.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the image or prompt is missing.
    pub fn edit_request(&self) -> Result<EditRequest, ValidationError> {
        EditRequest::new(self.original.clone(), &self.prompt, self.aspect_ratio)
    }

    /// Build a caption request for the processed image, falling back to the
    /// original.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingImage`] if neither image is set.
    pub fn caption_request(&self, idea: &str) -> Result<CaptionRequest, ValidationError> {
        CaptionRequest::new(self.display_image().cloned(), idea)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Current editing context.
    #[must_use]
    pub const fn epoch(&self) -> ContextEpoch {
        self.epoch
    }

    /// The uploaded image.
    #[must_use]
    pub const fn original(&self) -> Option<&ImageAsset> {
        self.original.as_ref()
    }

    /// The latest edit result.
    #[must_use]
    pub const fn processed(&self) -> Option<&ImageAsset> {
        self.processed.as_ref()
    }

    /// Processed image if there is one, else the original.
    #[must_use]
    pub fn display_image(&self) -> Option<&ImageAsset> {
        self.processed.as_ref().or(self.original.as_ref())
    }

    /// Current prompt text.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Framing for the next edit.
    #[must_use]
    pub const fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    /// Last generated caption.
    #[must_use]
    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    /// Current error message.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Sale-ledger submission state.
    #[must_use]
    pub const fn ledger_status(&self) -> LedgerStatus {
        self.ledger_status
    }

    /// Past edits, newest first.
    #[must_use]
    pub const fn history(&self) -> &EditHistory {
        &self.history
    }

    /// Render-ready view of the session.
    #[must_use]
    pub fn snapshot(&self, pending: PendingOperations) -> SessionSnapshot {
        SessionSnapshot {
            original: self.original.clone(),
            processed: self.processed.clone(),
            prompt: self.prompt.clone(),
            aspect_ratio: self.aspect_ratio,
            caption: self.caption.clone(),
            error: self.error.clone(),
            ledger_status: self.ledger_status,
            pending,
            history: self.history.iter().map(HistorySummary::from).collect(),
        }
    }

    fn ensure_current(&self, epoch: ContextEpoch) -> Result<(), SessionError> {
        if epoch == self.epoch {
            Ok(())
        } else {
            Err(SessionError::Superseded)
        }
    }
}

/// Serializable view of a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub original: Option<ImageAsset>,
    pub processed: Option<ImageAsset>,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub caption: Option<String>,
    pub error: Option<String>,
    pub ledger_status: LedgerStatus,
    pub pending: PendingOperations,
    pub history: Vec<HistorySummary>,
}

/// History entry without the image payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub id: HistoryEntryId,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub created_at: DateTime<Utc>,
}

impl From<&HistoryEntry> for HistorySummary {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            id: entry.id(),
            prompt: entry.prompt().to_string(),
            aspect_ratio: entry.aspect_ratio(),
            created_at: entry.created_at(),
        }
    }
}
