//! Status enums shared between the orchestrator and its clients.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three remote operations a studio session can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// AI image edit.
    Edit,
    /// Voice dictation to text.
    Transcription,
    /// Social-media caption.
    Caption,
}

impl Operation {
    /// All operations.
    pub const ALL: [Self; 3] = [Self::Edit, Self::Transcription, Self::Caption];

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Transcription => "transcription",
            Self::Caption => "caption",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`Operation`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown operation: {0}")]
pub struct UnknownOperation(pub String);

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

/// Which operations are currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PendingOperations {
    /// An image edit is running.
    pub edit: bool,
    /// A transcription is running.
    pub transcription: bool,
    /// A caption is being generated.
    pub caption: bool,
}

impl PendingOperations {
    /// Whether the given operation is in flight.
    #[must_use]
    pub const fn is_pending(&self, operation: Operation) -> bool {
        match operation {
            Operation::Edit => self.edit,
            Operation::Transcription => self.transcription,
            Operation::Caption => self.caption,
        }
    }

    /// `true` when nothing is in flight.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        !(self.edit || self.transcription || self.caption)
    }
}

/// State of the most recent sale-ledger submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Failed,
}
