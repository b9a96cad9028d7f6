//! Live studio workspaces.
//!
//! A workspace is one open studio screen: its session store, the signed-in
//! staff member and one in-flight slot per remote operation. Workspaces are
//! kept in a `moka` cache that evicts idle ones; eviction and explicit close
//! both cancel whatever the workspace still has in flight.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use cm_studio_core::{
    Operation, PendingOperations, SessionSnapshot, StaffSession, StudioSession, WorkspaceId,
};
use moka::future::Cache;
use moka::notification::RemovalCause;
use tokio_util::sync::CancellationToken;

use crate::config::WorkspaceConfig;

use super::slot::OperationSlot;

/// One studio session hosted by the server.
#[derive(Debug)]
pub struct Workspace {
    id: WorkspaceId,
    created_at: DateTime<Utc>,
    session: Mutex<StudioSession>,
    staff: Mutex<StaffSession>,
    edit: OperationSlot,
    transcription: OperationSlot,
    caption: OperationSlot,
    ledger: OperationSlot,
    cancel: CancellationToken,
}

impl Workspace {
    /// Empty workspace.
    #[must_use]
    pub fn new(id: WorkspaceId, history_capacity: NonZeroUsize) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            session: Mutex::new(StudioSession::new(history_capacity)),
            staff: Mutex::new(StaffSession::default()),
            edit: OperationSlot::default(),
            transcription: OperationSlot::default(),
            caption: OperationSlot::default(),
            ledger: OperationSlot::default(),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> WorkspaceId {
        self.id
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Run `f` with the session locked. Never call across an `.await`.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut StudioSession) -> R) -> R {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut session)
    }

    /// Run `f` with the staff session locked.
    pub fn with_staff<R>(&self, f: impl FnOnce(&mut StaffSession) -> R) -> R {
        let mut staff = self.staff.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut staff)
    }

    /// In-flight slot for a remote operation.
    #[must_use]
    pub const fn slot(&self, operation: Operation) -> &OperationSlot {
        match operation {
            Operation::Edit => &self.edit,
            Operation::Transcription => &self.transcription,
            Operation::Caption => &self.caption,
        }
    }

    /// Slot serializing sale submissions.
    #[must_use]
    pub const fn ledger_slot(&self) -> &OperationSlot {
        &self.ledger
    }

    /// Which operations are in flight.
    #[must_use]
    pub fn pending(&self) -> PendingOperations {
        PendingOperations {
            edit: self.edit.is_busy(),
            transcription: self.transcription.is_busy(),
            caption: self.caption.is_busy(),
        }
    }

    /// Render-ready view of the workspace's session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let pending = self.pending();
        self.with_session(|session| session.snapshot(pending))
    }

    /// Cancel one in-flight operation. Returns whether anything was running.
    pub fn abort(&self, operation: Operation) -> bool {
        self.slot(operation).abort()
    }

    /// Parent token for every call this workspace makes.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel everything in flight. The workspace accepts no further calls.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// All live workspaces.
#[derive(Clone)]
pub struct WorkspaceRegistry {
    cache: Cache<WorkspaceId, Arc<Workspace>>,
    history_capacity: NonZeroUsize,
}

impl std::fmt::Debug for WorkspaceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceRegistry")
            .field("entries", &self.cache.entry_count())
            .field("history_capacity", &self.history_capacity)
            .finish()
    }
}

impl WorkspaceRegistry {
    /// Registry with the configured limits.
    #[must_use]
    pub fn new(config: &WorkspaceConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_workspaces)
            .time_to_idle(config.idle_timeout)
            .eviction_listener(
                |id: Arc<WorkspaceId>, workspace: Arc<Workspace>, cause: RemovalCause| {
                    if cause != RemovalCause::Replaced {
                        tracing::info!(workspace_id = %id, ?cause, "Workspace closed");
                        workspace.close();
                    }
                },
            )
            .build();

        Self {
            cache,
            history_capacity: config.history_capacity,
        }
    }

    /// Open a new, empty workspace.
    pub async fn create(&self) -> Arc<Workspace> {
        let workspace = Arc::new(Workspace::new(
            WorkspaceId::generate(),
            self.history_capacity,
        ));
        self.cache
            .insert(workspace.id(), Arc::clone(&workspace))
            .await;
        tracing::info!(workspace_id = %workspace.id(), "Workspace opened");
        workspace
    }

    /// Look up a live workspace. Counts as activity for idle eviction.
    pub async fn get(&self, id: WorkspaceId) -> Option<Arc<Workspace>> {
        self.cache.get(&id).await
    }

    /// Close a workspace and cancel its in-flight calls.
    pub async fn close(&self, id: WorkspaceId) -> bool {
        match self.cache.remove(&id).await {
            Some(workspace) => {
                workspace.close();
                true
            }
            None => false,
        }
    }

    /// Close every workspace. Used on shutdown.
    pub async fn close_all(&self) {
        for (_, workspace) in self.cache.iter() {
            workspace.close();
        }
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    /// Number of live workspaces (approximate until pending tasks run).
    #[must_use]
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn registry() -> WorkspaceRegistry {
        WorkspaceRegistry::new(&WorkspaceConfig::default())
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let registry = registry();
        let workspace = registry.create().await;
        let found = registry.get(workspace.id()).await.expect("workspace");
        assert_eq!(found.id(), workspace.id());
        assert!(registry.get(WorkspaceId::generate()).await.is_none());
    }

    #[tokio::test]
    async fn test_close_cancels_in_flight_work() {
        let registry = registry();
        let workspace = registry.create().await;
        let guard = workspace
            .slot(Operation::Edit)
            .try_begin(workspace.cancel_token())
            .expect("claim");

        assert!(registry.close(workspace.id()).await);

        assert!(workspace.is_closed());
        assert!(guard.token().is_cancelled());
        assert!(registry.get(workspace.id()).await.is_none());
        assert!(!registry.close(workspace.id()).await);
    }

    #[tokio::test]
    async fn test_idle_workspace_is_evicted_and_cancelled() {
        let registry = WorkspaceRegistry::new(&WorkspaceConfig {
            idle_timeout: Duration::from_millis(50),
            ..WorkspaceConfig::default()
        });
        let workspace = registry.create().await;

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(registry.get(workspace.id()).await.is_none());
        registry.cache.run_pending_tasks().await;

        assert!(workspace.is_closed());
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = registry();
        let first = registry.create().await;
        let second = registry.create().await;

        registry.close_all().await;

        assert!(first.is_closed());
        assert!(second.is_closed());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_pending_reflects_slots() {
        let workspace = Workspace::new(WorkspaceId::generate(), NonZeroUsize::MIN);
        assert!(workspace.pending().is_idle());

        let guard = workspace
            .slot(Operation::Caption)
            .try_begin(workspace.cancel_token())
            .expect("claim");
        let pending = workspace.pending();
        assert!(pending.caption);
        assert!(!pending.edit);

        drop(guard);
        assert!(workspace.pending().is_idle());
    }
}
