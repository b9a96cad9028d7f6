//! Staff sign-in and sale recording.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cm_studio_core::{
    LedgerStatus, SaleError, SaleFigures, SaleId, SaleInput, SaleRecord, StaffError, StaffMember,
    StaffRoster,
};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use super::backend::{RemoteError, SaleLedger};
use super::slot::Interrupted;
use super::workspaces::Workspace;

/// Sale-recording errors.
#[derive(Debug, Error)]
pub enum SalesError {
    /// Nobody is signed in, or the name is not on the roster.
    #[error(transparent)]
    Staff(#[from] StaffError),

    /// The sale form failed validation.
    #[error(transparent)]
    Invalid(#[from] SaleError),

    /// No ledger webhook is configured.
    #[error("Sale recording is not configured.")]
    NotConfigured,

    /// A sale from this workspace is already being saved.
    #[error("A sale is already being saved.")]
    Busy,

    /// The ledger did not acknowledge the sale.
    #[error("Could not record the sale. Try again.")]
    Remote(#[source] RemoteError),

    /// The submission was cancelled or timed out.
    #[error("Could not record the sale: the request was interrupted.")]
    Interrupted(Interrupted),
}

/// Acknowledged sale.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleReceipt {
    pub sale_id: SaleId,
    pub staff: String,
    pub figures: SaleFigures,
    pub recorded_at: DateTime<Utc>,
}

/// Figures for a sale form, with its first validation problem if any.
///
/// `figures` is `None` when the amounts are too large to compute.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalePreview {
    pub figures: Option<SaleFigures>,
    pub problem: Option<String>,
}

/// Staff sessions and the sale ledger.
#[derive(Clone)]
pub struct SalesService {
    roster: StaffRoster,
    ledger: Option<Arc<dyn SaleLedger>>,
    request_timeout: Duration,
}

impl std::fmt::Debug for SalesService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesService")
            .field("roster", &self.roster)
            .field("ledger", &self.ledger.is_some())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl SalesService {
    #[must_use]
    pub fn new(
        roster: StaffRoster,
        ledger: Option<Arc<dyn SaleLedger>>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            roster,
            ledger,
            request_timeout,
        }
    }

    #[must_use]
    pub const fn roster(&self) -> &StaffRoster {
        &self.roster
    }

    /// Whether sales can be recorded at all.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.ledger.is_some()
    }

    /// Sign a roster member in to the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`StaffError::UnknownMember`] for names not on the roster.
    pub fn sign_in(&self, workspace: &Workspace, name: &str) -> Result<StaffMember, SalesError> {
        let member = workspace.with_staff(|staff| staff.sign_in(&self.roster, name).cloned())?;
        tracing::info!(workspace_id = %workspace.id(), staff = %member.name, "Staff signed in");
        Ok(member)
    }

    /// Sign out. The ledger status goes back to idle.
    pub fn sign_out(&self, workspace: &Workspace) -> Option<StaffMember> {
        let previous = workspace.with_staff(cm_studio_core::StaffSession::sign_out);
        workspace.with_session(|session| session.set_ledger_status(LedgerStatus::Idle));
        previous
    }

    /// The signed-in member, if any.
    #[must_use]
    pub fn current_staff(&self, workspace: &Workspace) -> Option<StaffMember> {
        workspace.with_staff(|staff| staff.current().cloned())
    }

    /// Compute the figures for a sale form without recording anything.
    #[must_use]
    pub fn preview_sale(&self, input: &SaleInput) -> SalePreview {
        SalePreview {
            figures: input.figures().ok(),
            problem: input.validate().err().map(|e| e.to_string()),
        }
    }

    /// Validate a sale and append it to the ledger.
    ///
    /// The workspace's ledger status is `saving` while the call runs and
    /// `saved` or `failed` afterwards. Validation failures leave it alone.
    ///
    /// # Errors
    ///
    /// Returns [`StaffError::NotSignedIn`] without a signed-in member, a
    /// validation error, or the ledger failure.
    #[instrument(skip(self, workspace, input), fields(workspace_id = %workspace.id()))]
    pub async fn record_sale(
        &self,
        workspace: &Workspace,
        input: SaleInput,
    ) -> Result<SaleReceipt, SalesError> {
        let staff = workspace.with_staff(|staff| staff.require().cloned())?;
        let record = SaleRecord::new(input, &staff, Utc::now())?;
        let ledger = self.ledger.as_ref().ok_or(SalesError::NotConfigured)?;
        let guard = workspace
            .ledger_slot()
            .try_begin(workspace.cancel_token())
            .ok_or(SalesError::Busy)?;

        workspace.with_session(|session| session.set_ledger_status(LedgerStatus::Saving));
        let result = match guard.run(self.request_timeout, ledger.append(&record)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(SalesError::Remote(source)),
            Err(interrupted) => Err(SalesError::Interrupted(interrupted)),
        };
        drop(guard);

        let status = if result.is_ok() {
            LedgerStatus::Saved
        } else {
            LedgerStatus::Failed
        };
        workspace.with_session(|session| session.set_ledger_status(status));

        match result {
            Ok(()) => {
                tracing::info!(sale_id = %record.id(), staff = %record.staff(), "Sale acknowledged");
                Ok(SaleReceipt {
                    sale_id: record.id(),
                    staff: record.staff().to_string(),
                    figures: record.figures(),
                    recorded_at: record.recorded_at(),
                })
            }
            Err(err) => {
                tracing::warn!(sale_id = %record.id(), error = ?err, "Sale not recorded");
                Err(err)
            }
        }
    }
}
