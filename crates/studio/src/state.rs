//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use cm_studio_core::{StaffRoster, WorkspaceId};

use crate::config::{StudioConfig, WorkspaceConfig};
use crate::error::AppError;
use crate::services::{
    BackendInitError, Backends, SalesService, StudioService, Workspace, WorkspaceRegistry,
};

/// Runtime settings that do not belong to any one client.
#[derive(Debug, Clone)]
pub struct StudioOptions {
    pub staff: StaffRoster,
    pub workspaces: WorkspaceConfig,
    pub request_timeout: Duration,
}

impl Default for StudioOptions {
    fn default() -> Self {
        Self {
            staff: StaffRoster::default(),
            workspaces: WorkspaceConfig::default(),
            request_timeout: Duration::from_secs(90),
        }
    }
}

impl From<&StudioConfig> for StudioOptions {
    fn from(config: &StudioConfig) -> Self {
        Self {
            staff: config.staff.clone(),
            workspaces: config.workspaces,
            request_timeout: config.gemini.request_timeout,
        }
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    studio: StudioService,
    sales: SalesService,
    workspaces: WorkspaceRegistry,
}

impl AppState {
    /// Build state around the given backends.
    #[must_use]
    pub fn new(backends: Backends, options: StudioOptions) -> Self {
        let sales = SalesService::new(
            options.staff,
            backends.ledger.clone(),
            options.request_timeout,
        );
        Self {
            inner: Arc::new(AppStateInner {
                studio: StudioService::new(backends, options.request_timeout),
                sales,
                workspaces: WorkspaceRegistry::new(&options.workspaces),
            }),
        }
    }

    /// Build state with the production clients.
    ///
    /// # Errors
    ///
    /// Returns an error if any HTTP client fails to build.
    pub fn from_config(config: &StudioConfig) -> Result<Self, BackendInitError> {
        let backends = Backends::from_config(config)?;
        Ok(Self::new(backends, StudioOptions::from(config)))
    }

    #[must_use]
    pub fn studio(&self) -> &StudioService {
        &self.inner.studio
    }

    #[must_use]
    pub fn sales(&self) -> &SalesService {
        &self.inner.sales
    }

    #[must_use]
    pub fn workspaces(&self) -> &WorkspaceRegistry {
        &self.inner.workspaces
    }

    /// Look up a live workspace.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown or expired workspaces.
    pub async fn workspace(&self, id: WorkspaceId) -> Result<Arc<Workspace>, AppError> {
        self.inner
            .workspaces
            .get(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("workspace {id}")))
    }
}
