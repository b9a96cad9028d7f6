//! Business logic services for the studio.
//!
//! # Services
//!
//! - `backend` - Trait seams over the remote services
//! - `slot` - One-call-per-operation guard with cancellation and timeout
//! - `studio` - Edit, transcription and caption orchestration
//! - `sales` - Staff sign-in and sale recording
//! - `workspaces` - Live workspace registry with idle eviction

pub mod backend;
pub mod sales;
pub mod slot;
pub mod studio;
pub mod workspaces;

pub use backend::{
    BackendInitError, Backends, CaptionWriter, FileStore, ImageEditor, RemoteError, SaleLedger,
    Transcriber,
};
pub use sales::{SalePreview, SaleReceipt, SalesError, SalesService};
pub use slot::{Interrupted, OperationSlot, SlotGuard};
pub use studio::{
    Download, EditOutcome, PromptUpdate, StudioError, StudioService, TranscriptOutcome,
};
pub use workspaces::{Workspace, WorkspaceRegistry};
