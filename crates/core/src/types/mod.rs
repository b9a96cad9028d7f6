//! Core types for CM Studio.
//!
//! This module provides type-safe wrappers for the studio's domain concepts.

pub mod edit;
pub mod history;
pub mod id;
pub mod media;
pub mod preset;
pub mod sale;
pub mod session;
pub mod staff;
pub mod status;

pub use edit::{AspectRatio, CaptionRequest, EditRequest, TranscriptionRequest, ValidationError};
pub use history::{DEFAULT_HISTORY_CAPACITY, EditHistory, HistoryEntry};
pub use id::*;
pub use media::{AudioClip, ImageAsset, MediaError};
pub use preset::{Preset, builtin_presets, find_preset};
pub use sale::{SaleError, SaleFigures, SaleInput, SaleRecord};
pub use session::{ContextEpoch, HistorySummary, SessionError, SessionSnapshot, StudioSession};
pub use staff::{StaffError, StaffMember, StaffRoster, StaffSession};
pub use status::{LedgerStatus, Operation, PendingOperations, UnknownOperation};
