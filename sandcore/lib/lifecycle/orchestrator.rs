use std::{
    collections::HashSet,
    sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard},
};

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use sandutils::{KeyedLocks, ShutdownCoordinator};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::{
    config::{SandcoreConfig, StoreKind, DEFAULT_EXPIRATION_SECS, DEFAULT_LIST_LIMIT},
    models::{ProvisionHandle, SandboxRecord, SandboxStatus},
    provision::{Provisioner, SimulatedProvisioner},
    store::{MemoryStore, SandboxStore, SqliteStore},
    SandcoreError, SandcoreResult,
};

use super::{check_transition, ListParams};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Drives sandboxes through their lifecycle.
///
/// Every lifecycle call answers synchronously with a consistent snapshot. Creation and removal
/// then continue in a background task that calls the [`Provisioner`] and finalizes the record.
/// All mutations of one sandbox, including the finalization steps of its background tasks, run
/// inside a critical section keyed by the sandbox id. The lock is never held while the
/// provisioner is working.
///
/// Background tasks are registered with a [`ShutdownCoordinator`], so [`drain`](Self::drain)
/// waits for every accepted creation and removal to finish.
///
/// ## Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use sandcore::{lifecycle::Orchestrator, provision::SimulatedProvisioner, store::MemoryStore};
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let orchestrator = Orchestrator::new(
///     Arc::new(MemoryStore::new()),
///     Arc::new(SimulatedProvisioner::default()),
/// );
///
/// let sandbox = orchestrator.create("demo", None).await?;
/// orchestrator.drain().await;
///
/// let sandbox = orchestrator.get_by_id(sandbox.id).await?;
/// println!("{} is {}", sandbox.name, sandbox.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

/// The collaborators and settings an [`Orchestrator`] is built from.
#[derive(TypedBuilder)]
pub struct OrchestratorSettings {
    /// Where sandbox records are kept.
    store: Arc<dyn SandboxStore>,

    /// The backend that creates and destroys the underlying resources.
    provisioner: Arc<dyn Provisioner>,

    /// Lifetime given to sandboxes created without a usable expiration.
    #[builder(default = TimeDelta::seconds(DEFAULT_EXPIRATION_SECS as i64))]
    default_expiration: TimeDelta,

    /// Page size used when a listing has no usable limit.
    #[builder(default = DEFAULT_LIST_LIMIT)]
    default_list_limit: usize,
}

struct OrchestratorInner {
    store: Arc<dyn SandboxStore>,
    provisioner: Arc<dyn Provisioner>,
    locks: KeyedLocks<Uuid>,
    coordinator: ShutdownCoordinator,

    /// Sandboxes with an accepted removal that has not completed. Only mutated under the id's lock.
    removals: StdMutex<HashSet<Uuid>>,

    default_expiration: TimeDelta,
    default_list_limit: usize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Orchestrator {
    /// Creates an orchestrator with the default expiration and page size.
    pub fn new(store: Arc<dyn SandboxStore>, provisioner: Arc<dyn Provisioner>) -> Self {
        OrchestratorSettings::builder()
            .store(store)
            .provisioner(provisioner)
            .build()
            .into()
    }

    /// Builds an orchestrator from the service configuration.
    ///
    /// Opens the configured store and uses a [`SimulatedProvisioner`] as the backend.
    pub async fn from_config(config: &SandcoreConfig) -> SandcoreResult<Self> {
        config.validate()?;

        let store: Arc<dyn SandboxStore> = match config.get_store() {
            StoreKind::Memory => {
                tracing::info!("using in-memory sandbox store");
                Arc::new(MemoryStore::new())
            }
            StoreKind::Sqlite { .. } => {
                let path = config.get_store().resolve_db_path()?.ok_or_else(|| {
                    SandcoreError::Validation("sqlite store without a path".to_string())
                })?;
                tracing::info!(path = %path.display(), "using sqlite sandbox store");
                Arc::new(SqliteStore::open(&path).await?)
            }
        };

        let provisioner = match config.get_fail_name_prefix() {
            Some(prefix) => SimulatedProvisioner::builder()
                .delay(config.provision_delay())
                .fail_name_prefix(prefix.clone())
                .build(),
            None => SimulatedProvisioner::builder()
                .delay(config.provision_delay())
                .build(),
        };

        Ok(OrchestratorSettings::builder()
            .store(store)
            .provisioner(Arc::new(provisioner))
            .default_expiration(config.default_expiration()?)
            .default_list_limit(*config.get_default_list_limit())
            .build()
            .into())
    }

    /// Creates a sandbox and starts provisioning it in the background.
    ///
    /// An `expires_at` that is absent or not in the future is replaced by now plus the default
    /// expiration. The returned snapshot is always `pending`.
    pub async fn create(
        &self,
        name: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> SandcoreResult<SandboxRecord> {
        let name = name.into();
        let now = now();
        let expires_at = match expires_at.map(|t| t.trunc_subsecs(6)) {
            Some(t) if t > now => t,
            _ => now
                .checked_add_signed(self.inner.default_expiration)
                .ok_or_else(|| {
                    SandcoreError::Validation("default expiration out of range".to_string())
                })?,
        };

        let id = Uuid::new_v4();
        let record = SandboxRecord::pending(id, name, expires_at, now);

        let _guard = self.inner.locks.lock(&id).await;
        self.inner.store.insert(&record).await?;

        let orchestrator = self.clone();
        let sandbox_name = record.name.clone();
        self.inner
            .coordinator
            .spawn(async move { orchestrator.finish_create(id, sandbox_name).await });

        tracing::info!(%id, name = %record.name, %expires_at, "sandbox creation accepted");
        Ok(record)
    }

    /// Starts removing a sandbox and returns its snapshot from before the removal.
    ///
    /// Fails with [`SandcoreError::InvalidState`] while the sandbox is still pending or once it is
    /// deleted, and with [`SandcoreError::RemovalInProgress`] if a removal was already accepted.
    pub async fn remove(&self, id: Uuid) -> SandcoreResult<SandboxRecord> {
        let _guard = self.inner.locks.lock(&id).await;

        let record = self.inner.store.get_by_id(id).await?;
        if self.inner.is_removing(id) {
            return Err(SandcoreError::RemovalInProgress(id));
        }
        check_transition(id, record.status, SandboxStatus::Deleted, "remove")?;

        self.inner.removals().insert(id);

        let orchestrator = self.clone();
        let handle = record.handle.clone();
        self.inner
            .coordinator
            .spawn(async move { orchestrator.finish_remove(id, handle).await });

        tracing::info!(%id, status = %record.status, "sandbox removal accepted");
        Ok(record)
    }

    /// Moves the expiration of a sandbox and returns the updated snapshot.
    ///
    /// `expires_at` must lie in the future. Deleted sandboxes cannot be changed.
    pub async fn update_expiration(
        &self,
        id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> SandcoreResult<SandboxRecord> {
        let expires_at = expires_at.trunc_subsecs(6);
        if expires_at <= now() {
            return Err(SandcoreError::Validation(format!(
                "expiration {expires_at} is not in the future"
            )));
        }

        let _guard = self.inner.locks.lock(&id).await;

        let record = self.inner.store.get_by_id(id).await?;
        if record.status.is_terminal() {
            return Err(SandcoreError::InvalidState {
                id,
                status: record.status,
                operation: "update expiration of",
            });
        }

        if !self
            .inner
            .store
            .update_expiration(id, expires_at, now())
            .await?
        {
            return Err(SandcoreError::NotFound(id.to_string()));
        }

        tracing::info!(%id, %expires_at, "sandbox expiration updated");
        self.inner.store.get_by_id(id).await
    }

    /// Stops a running sandbox. Administrative hook with no API route.
    pub async fn stop(&self, id: Uuid) -> SandcoreResult<SandboxRecord> {
        self.apply_admin_transition(id, SandboxStatus::Stopped, "stop")
            .await
    }

    /// Marks a running sandbox as expired. Administrative hook with no API route.
    pub async fn expire(&self, id: Uuid) -> SandcoreResult<SandboxRecord> {
        self.apply_admin_transition(id, SandboxStatus::Expired, "expire")
            .await
    }

    /// Gets a sandbox by id.
    pub async fn get_by_id(&self, id: Uuid) -> SandcoreResult<SandboxRecord> {
        self.inner.store.get_by_id(id).await
    }

    /// Gets every sandbox with the given name. Returns an empty list when none match.
    pub async fn get_by_name(&self, name: &str) -> SandcoreResult<Vec<SandboxRecord>> {
        self.inner.store.get_by_name(name).await
    }

    /// Lists sandboxes in creation order.
    pub async fn list_all(&self, params: ListParams) -> SandcoreResult<Vec<SandboxRecord>> {
        let limit = params.limit(self.inner.default_list_limit);
        let offset = params.offset();
        self.inner.store.list_all(limit, offset).await
    }

    /// Returns true while an accepted removal of `id` has not completed.
    pub fn is_removing(&self, id: Uuid) -> bool {
        self.inner.is_removing(id)
    }

    /// Returns the number of background tasks that have not finished.
    pub fn outstanding_tasks(&self) -> usize {
        self.inner.coordinator.outstanding()
    }

    /// Waits until every background task has finished, including ones started while waiting.
    pub async fn drain(&self) {
        let outstanding = self.inner.coordinator.outstanding();
        if outstanding > 0 {
            tracing::info!(outstanding, "draining background tasks");
        }

        self.inner.coordinator.wait().await;
        tracing::info!("all background tasks finished");
    }

    async fn apply_admin_transition(
        &self,
        id: Uuid,
        to: SandboxStatus,
        operation: &'static str,
    ) -> SandcoreResult<SandboxRecord> {
        let _guard = self.inner.locks.lock(&id).await;

        let record = self.inner.store.get_by_id(id).await?;
        if self.inner.is_removing(id) {
            return Err(SandcoreError::RemovalInProgress(id));
        }
        check_transition(id, record.status, to, operation)?;

        if !self.inner.store.update_status(id, to, now()).await? {
            return Err(SandcoreError::NotFound(id.to_string()));
        }

        tracing::info!(%id, from = %record.status, %to, "sandbox status changed");
        self.inner.store.get_by_id(id).await
    }

    async fn finish_create(&self, id: Uuid, name: String) {
        let outcome = self.inner.provisioner.provision(&name).await;
        let provisioned = outcome.as_ref().ok().cloned();

        let orphan = match self.record_provisioning(id, outcome).await {
            Ok(orphan) => orphan,
            Err(e) => {
                tracing::error!(%id, error = %e, "failed to record provisioning outcome");
                self.mark_failed(id).await;
                provisioned
            }
        };

        if let Some(handle) = orphan {
            tracing::warn!(%id, %handle, "tearing down resource that is not attached to a sandbox");
            if let Err(e) = self.inner.provisioner.deprovision(&handle).await {
                tracing::error!(%id, %handle, error = %e, "failed to tear down orphaned resource");
            }
        }
    }

    /// Writes the provisioning outcome. Returns a handle that has no record to attach to.
    async fn record_provisioning(
        &self,
        id: Uuid,
        outcome: SandcoreResult<ProvisionHandle>,
    ) -> SandcoreResult<Option<ProvisionHandle>> {
        let _guard = self.inner.locks.lock(&id).await;

        let record = match self.inner.store.get_by_id(id).await {
            Ok(record) => record,
            Err(SandcoreError::NotFound(_)) => return Ok(outcome.ok()),
            Err(e) => return Err(e),
        };

        let (status, handle) = match outcome {
            Ok(handle) => (SandboxStatus::Running, Some(handle)),
            Err(e) => {
                tracing::error!(%id, error = %e, "sandbox provisioning failed");
                (SandboxStatus::Failed, None)
            }
        };
        check_transition(id, record.status, status, "finish provisioning of")?;

        if !self
            .inner
            .store
            .finish_provisioning(id, status, handle.as_ref(), now())
            .await?
        {
            return Ok(handle);
        }

        match &handle {
            Some(handle) => tracing::info!(%id, %handle, "sandbox is running"),
            None => tracing::info!(%id, "sandbox marked as failed"),
        }

        Ok(None)
    }

    /// Moves a sandbox whose provisioning outcome could not be written to `failed`, so it can
    /// still be removed. Errors are only logged.
    async fn mark_failed(&self, id: Uuid) {
        let _guard = self.inner.locks.lock(&id).await;

        let result = async {
            let record = self.inner.store.get_by_id(id).await?;
            check_transition(id, record.status, SandboxStatus::Failed, "fail")?;
            self.inner
                .store
                .update_status(id, SandboxStatus::Failed, now())
                .await
        }
        .await;

        match result {
            Ok(_) => tracing::warn!(%id, "sandbox marked as failed after a store error"),
            Err(e) => {
                tracing::error!(%id, error = %e, "failed to mark sandbox as failed");
                tracing::warn!(%id, "sandbox is stuck in its current status");
            }
        }
    }

    async fn finish_remove(&self, id: Uuid, handle: Option<ProvisionHandle>) {
        match &handle {
            Some(handle) => {
                if let Err(e) = self.inner.provisioner.deprovision(handle).await {
                    tracing::error!(%id, %handle, error = %e, "sandbox deprovisioning failed");
                    tracing::warn!(%id, "sandbox removal is stuck and will not be retried");
                    return;
                }
            }
            None => tracing::debug!(%id, "sandbox has no provisioned resource to tear down"),
        }

        if let Err(e) = self.purge(id).await {
            tracing::error!(%id, error = %e, "failed to purge removed sandbox");
            tracing::warn!(%id, "sandbox removal is stuck and will not be retried");
        }
    }

    async fn purge(&self, id: Uuid) -> SandcoreResult<()> {
        let _guard = self.inner.locks.lock(&id).await;

        let record = self.inner.store.get_by_id(id).await?;
        check_transition(id, record.status, SandboxStatus::Deleted, "finish removal of")?;

        self.inner
            .store
            .update_status(id, SandboxStatus::Deleted, now())
            .await?;
        self.inner.store.delete(id).await?;
        self.inner.removals().remove(&id);

        tracing::info!(%id, "sandbox deleted");
        Ok(())
    }
}

impl OrchestratorInner {
    fn removals(&self) -> StdMutexGuard<'_, HashSet<Uuid>> {
        self.removals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_removing(&self, id: Uuid) -> bool {
        self.removals().contains(&id)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// The current time at the microsecond precision every store keeps.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<OrchestratorSettings> for Orchestrator {
    fn from(settings: OrchestratorSettings) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                store: settings.store,
                provisioner: settings.provisioner,
                locks: KeyedLocks::new(),
                coordinator: ShutdownCoordinator::new(),
                removals: StdMutex::new(HashSet::new()),
                default_expiration: settings.default_expiration,
                default_list_limit: settings.default_list_limit,
            }),
        }
    }
}

impl std::fmt::Debug for OrchestratorInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("locks", &self.locks)
            .field("coordinator", &self.coordinator)
            .field("default_expiration", &self.default_expiration)
            .field("default_list_limit", &self.default_list_limit)
            .finish_non_exhaustive()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(
                SimulatedProvisioner::builder()
                    .delay(Duration::from_millis(5))
                    .fail_name_prefix("fail-")
                    .build(),
            ),
        )
    }

    #[tokio::test]
    async fn test_create_returns_pending_then_runs() -> anyhow::Result<()> {
        let orchestrator = orchestrator();
        let before = Utc::now();

        let created = orchestrator.create("demo", None).await?;
        assert_eq!(created.status, SandboxStatus::Pending);
        assert!(created.expires_at > before + TimeDelta::days(7) - TimeDelta::seconds(5));
        assert!(created.expires_at <= Utc::now() + TimeDelta::days(7));

        orchestrator.drain().await;

        let record = orchestrator.get_by_id(created.id).await?;
        assert_eq!(record.status, SandboxStatus::Running);
        assert!(record.handle.is_some());
        assert!(record.updated_at >= created.updated_at);
        assert_eq!(record.created_at, created.created_at);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_keeps_future_expiration() -> anyhow::Result<()> {
        let orchestrator = orchestrator();
        let expires_at = (Utc::now() + TimeDelta::hours(2)).trunc_subsecs(6);

        let created = orchestrator.create("demo", Some(expires_at)).await?;
        assert_eq!(created.expires_at, expires_at);

        let past = Utc::now() - TimeDelta::hours(2);
        let created = orchestrator.create("demo", Some(past)).await?;
        assert!(created.expires_at > Utc::now() + TimeDelta::days(6));

        orchestrator.drain().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_provisioning_marks_failed() -> anyhow::Result<()> {
        let orchestrator = orchestrator();
        let created = orchestrator.create("fail-demo", None).await?;
        orchestrator.drain().await;

        let record = orchestrator.get_by_id(created.id).await?;
        assert_eq!(record.status, SandboxStatus::Failed);
        assert!(record.handle.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_pending_is_rejected() -> anyhow::Result<()> {
        let orchestrator = orchestrator();
        let created = orchestrator.create("demo", None).await?;

        let err = orchestrator.remove(created.id).await.unwrap_err();
        assert!(matches!(
            err,
            SandcoreError::InvalidState {
                status: SandboxStatus::Pending,
                ..
            }
        ));

        orchestrator.drain().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_running_purges_record() -> anyhow::Result<()> {
        let orchestrator = orchestrator();
        let created = orchestrator.create("demo", None).await?;
        orchestrator.drain().await;

        let snapshot = orchestrator.remove(created.id).await?;
        assert_eq!(snapshot.status, SandboxStatus::Running);
        assert!(orchestrator.is_removing(created.id));

        let err = orchestrator.remove(created.id).await.unwrap_err();
        assert!(matches!(err, SandcoreError::RemovalInProgress(_)));

        orchestrator.drain().await;
        assert!(!orchestrator.is_removing(created.id));
        assert!(matches!(
            orchestrator.get_by_id(created.id).await,
            Err(SandcoreError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_failed_sandbox_skips_deprovision() -> anyhow::Result<()> {
        let orchestrator = orchestrator();
        let created = orchestrator.create("fail-demo", None).await?;
        orchestrator.drain().await;

        let snapshot = orchestrator.remove(created.id).await?;
        assert_eq!(snapshot.status, SandboxStatus::Failed);

        orchestrator.drain().await;
        assert!(orchestrator.get_by_id(created.id).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_unknown_is_not_found() {
        let err = orchestrator().remove(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SandcoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_expiration() -> anyhow::Result<()> {
        let orchestrator = orchestrator();
        let created = orchestrator.create("demo", None).await?;

        let expires_at = (Utc::now() + TimeDelta::days(30)).trunc_subsecs(6);
        let updated = orchestrator.update_expiration(created.id, expires_at).await?;
        assert_eq!(updated.expires_at, expires_at);
        assert!(updated.updated_at >= created.updated_at);

        let err = orchestrator
            .update_expiration(created.id, Utc::now() - TimeDelta::days(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SandcoreError::Validation(_)));

        let err = orchestrator
            .update_expiration(Uuid::new_v4(), expires_at)
            .await
            .unwrap_err();
        assert!(matches!(err, SandcoreError::NotFound(_)));

        orchestrator.drain().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_transitions() -> anyhow::Result<()> {
        let orchestrator = orchestrator();
        let first = orchestrator.create("demo", None).await?;
        let second = orchestrator.create("demo", None).await?;

        assert!(matches!(
            orchestrator.stop(first.id).await,
            Err(SandcoreError::InvalidState { .. })
        ));
        orchestrator.drain().await;

        let stopped = orchestrator.stop(first.id).await?;
        assert_eq!(stopped.status, SandboxStatus::Stopped);
        assert!(matches!(
            orchestrator.expire(first.id).await,
            Err(SandcoreError::InvalidState { .. })
        ));

        let expired = orchestrator.expire(second.id).await?;
        assert_eq!(expired.status, SandboxStatus::Expired);
        assert!(matches!(
            orchestrator.remove(second.id).await,
            Err(SandcoreError::InvalidState { .. })
        ));

        orchestrator.remove(first.id).await?;
        orchestrator.drain().await;
        assert!(orchestrator.get_by_id(first.id).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_all_normalizes_paging() -> anyhow::Result<()> {
        let orchestrator = orchestrator();
        for i in 0..12 {
            orchestrator.create(format!("sandbox-{i}"), None).await?;
        }

        assert_eq!(orchestrator.list_all(ListParams::new(0, 0)).await?.len(), 10);
        assert_eq!(orchestrator.list_all(ListParams::new(-1, -4)).await?.len(), 10);
        assert_eq!(orchestrator.list_all(ListParams::new(5, 10)).await?.len(), 2);
        assert_eq!(orchestrator.list_all(ListParams::new(100, 0)).await?.len(), 12);

        orchestrator.drain().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_get_by_name_without_matches_is_empty() -> anyhow::Result<()> {
        let orchestrator = orchestrator();
        assert!(orchestrator.get_by_name("nothing").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_vanished_sandbox_resource_is_torn_down() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Orchestrator::new(
            store.clone(),
            Arc::new(
                SimulatedProvisioner::builder()
                    .delay(Duration::from_millis(20))
                    .build(),
            ),
        );

        let created = orchestrator.create("demo", None).await?;
        store.delete(created.id).await?;

        let orphan = orchestrator
            .record_provisioning(created.id, Ok(ProvisionHandle::new("sbx-orphan")))
            .await?;
        assert_eq!(orphan, Some(ProvisionHandle::new("sbx-orphan")));

        orchestrator.drain().await;
        Ok(())
    }
}
