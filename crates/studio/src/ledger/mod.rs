//! Spreadsheet sale-ledger webhook client.
//!
//! Each sale is one POST of a flat JSON row. The row carries a `saleId`
//! and the request an `Idempotency-Key` header with the same value, so the
//! receiving script can drop duplicate deliveries. Only a 2xx status (after
//! redirects) counts as an acknowledgment.

use std::sync::Arc;

use cm_studio_core::SaleRecord;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::config::LedgerConfig;

/// Header carrying the sale id.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Errors that can occur when recording a sale.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The webhook answered with a non-success status.
    #[error("Ledger rejected the sale ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Sale-ledger webhook client.
#[derive(Clone)]
pub struct LedgerClient {
    inner: Arc<LedgerClientInner>,
}

struct LedgerClientInner {
    client: reqwest::Client,
    webhook_url: Url,
}

impl std::fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClient")
            .field("webhook_host", &self.inner.webhook_url.host_str())
            .finish_non_exhaustive()
    }
}

impl LedgerClient {
    /// Create a new ledger client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(LedgerClientInner {
                client,
                webhook_url: config.webhook_url.clone(),
            }),
        })
    }

    /// Append a sale to the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Rejected`] for any non-2xx final status.
    #[instrument(skip(self, record), fields(sale_id = %record.id(), staff = %record.staff()))]
    pub async fn append(&self, record: &SaleRecord) -> Result<(), LedgerError> {
        let response = self
            .inner
            .client
            .post(self.inner.webhook_url.clone())
            .header(IDEMPOTENCY_KEY_HEADER, record.id().to_string())
            .json(record)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(status = status.as_u16(), "Sale recorded");
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), "Ledger rejected sale");
        Err(LedgerError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}
