#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sandcore::{
    lifecycle::Orchestrator,
    models::{ProvisionHandle, SandboxRecord, SandboxStatus},
    provision::Provisioner,
    store::{MemoryStore, SandboxStore},
    SandcoreError, SandcoreResult,
};
use tokio::sync::Semaphore;
use uuid::Uuid;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A provisioner whose calls block until the test releases them.
#[derive(Debug)]
pub struct GatedProvisioner {
    gated: bool,
    provision_gate: Semaphore,
    deprovision_gate: Semaphore,
    provision_calls: AtomicUsize,
    deprovision_calls: AtomicUsize,
    fail_provision: AtomicBool,
    fail_deprovision: AtomicBool,
}

/// A [`MemoryStore`] that counts writes and can hold or fail the provisioning write.
#[derive(Debug)]
pub struct InstrumentedStore {
    inner: MemoryStore,
    hold_provisioning: bool,
    provisioning_gate: Semaphore,
    provisioning_failures: AtomicUsize,
    provisioning_writes: AtomicUsize,
    status_writes: AtomicUsize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl GatedProvisioner {
    /// Calls complete immediately.
    pub fn open() -> Arc<Self> {
        Arc::new(Self::new(false))
    }

    /// Calls wait for [`release_provisions`](Self::release_provisions) or
    /// [`release_deprovisions`](Self::release_deprovisions).
    pub fn gated() -> Arc<Self> {
        Arc::new(Self::new(true))
    }

    fn new(gated: bool) -> Self {
        Self {
            gated,
            provision_gate: Semaphore::new(0),
            deprovision_gate: Semaphore::new(0),
            provision_calls: AtomicUsize::new(0),
            deprovision_calls: AtomicUsize::new(0),
            fail_provision: AtomicBool::new(false),
            fail_deprovision: AtomicBool::new(false),
        }
    }

    pub fn release_provisions(&self, n: usize) {
        self.provision_gate.add_permits(n);
    }

    pub fn release_deprovisions(&self, n: usize) {
        self.deprovision_gate.add_permits(n);
    }

    pub fn fail_provisioning(&self) {
        self.fail_provision.store(true, Ordering::SeqCst);
    }

    pub fn fail_deprovisioning(&self) {
        self.fail_deprovision.store(true, Ordering::SeqCst);
    }

    pub fn provision_calls(&self) -> usize {
        self.provision_calls.load(Ordering::SeqCst)
    }

    pub fn deprovision_calls(&self) -> usize {
        self.deprovision_calls.load(Ordering::SeqCst)
    }

    /// Waits until at least `n` deprovision calls have started.
    pub async fn wait_for_deprovision_calls(&self, n: usize) {
        wait_until(|| self.deprovision_calls() >= n).await;
    }

    /// Waits until at least `n` provision calls have started.
    pub async fn wait_for_provision_calls(&self, n: usize) {
        wait_until(|| self.provision_calls() >= n).await;
    }

    async fn pass(&self, gate: &Semaphore) {
        if self.gated {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

impl InstrumentedStore {
    /// Writes go straight through.
    pub fn open() -> Arc<Self> {
        Arc::new(Self::new(false))
    }

    /// Provisioning writes wait inside the store until
    /// [`release_provisioning_writes`](Self::release_provisioning_writes).
    pub fn holding() -> Arc<Self> {
        Arc::new(Self::new(true))
    }

    fn new(hold_provisioning: bool) -> Self {
        Self {
            inner: MemoryStore::new(),
            hold_provisioning,
            provisioning_gate: Semaphore::new(0),
            provisioning_failures: AtomicUsize::new(0),
            provisioning_writes: AtomicUsize::new(0),
            status_writes: AtomicUsize::new(0),
        }
    }

    pub fn release_provisioning_writes(&self, n: usize) {
        self.provisioning_gate.add_permits(n);
    }

    /// The next `n` provisioning writes fail without touching the record.
    pub fn fail_provisioning_writes(&self, n: usize) {
        self.provisioning_failures.store(n, Ordering::SeqCst);
    }

    pub fn provisioning_writes(&self) -> usize {
        self.provisioning_writes.load(Ordering::SeqCst)
    }

    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    /// Waits until at least `n` provisioning writes have started.
    pub async fn wait_for_provisioning_writes(&self, n: usize) {
        wait_until(|| self.provisioning_writes() >= n).await;
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Provisioner for GatedProvisioner {
    async fn provision(&self, name: &str) -> SandcoreResult<ProvisionHandle> {
        self.provision_calls.fetch_add(1, Ordering::SeqCst);
        self.pass(&self.provision_gate).await;

        if self.fail_provision.load(Ordering::SeqCst) {
            return Err(SandcoreError::Provision(format!("refusing to provision {name}")));
        }

        Ok(ProvisionHandle::new(format!("gated-{}", Uuid::new_v4())))
    }

    async fn deprovision(&self, handle: &ProvisionHandle) -> SandcoreResult<()> {
        self.deprovision_calls.fetch_add(1, Ordering::SeqCst);
        self.pass(&self.deprovision_gate).await;

        if self.fail_deprovision.load(Ordering::SeqCst) {
            return Err(SandcoreError::Provision(format!("refusing to tear down {handle}")));
        }

        Ok(())
    }
}

#[async_trait]
impl SandboxStore for InstrumentedStore {
    async fn insert(&self, record: &SandboxRecord) -> SandcoreResult<Uuid> {
        self.inner.insert(record).await
    }

    async fn get_by_id(&self, id: Uuid) -> SandcoreResult<SandboxRecord> {
        self.inner.get_by_id(id).await
    }

    async fn get_by_name(&self, name: &str) -> SandcoreResult<Vec<SandboxRecord>> {
        self.inner.get_by_name(name).await
    }

    async fn list_all(&self, limit: usize, offset: usize) -> SandcoreResult<Vec<SandboxRecord>> {
        self.inner.list_all(limit, offset).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: SandboxStatus,
        at: DateTime<Utc>,
    ) -> SandcoreResult<bool> {
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.update_status(id, status, at).await
    }

    async fn update_expiration(
        &self,
        id: Uuid,
        expires_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> SandcoreResult<bool> {
        self.inner.update_expiration(id, expires_at, at).await
    }

    async fn finish_provisioning(
        &self,
        id: Uuid,
        status: SandboxStatus,
        handle: Option<&ProvisionHandle>,
        at: DateTime<Utc>,
    ) -> SandcoreResult<bool> {
        self.provisioning_writes.fetch_add(1, Ordering::SeqCst);

        if self.hold_provisioning {
            if let Ok(permit) = self.provisioning_gate.acquire().await {
                permit.forget();
            }
        }

        let fail = self
            .provisioning_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(SandcoreError::Store(format!("disk unavailable while updating {id}")));
        }

        self.inner.finish_provisioning(id, status, handle, at).await
    }

    async fn delete(&self, id: Uuid) -> SandcoreResult<bool> {
        self.inner.delete(id).await
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// An orchestrator over a fresh in-memory store.
pub fn memory_orchestrator(provisioner: Arc<GatedProvisioner>) -> Orchestrator {
    Orchestrator::new(Arc::new(MemoryStore::new()), provisioner)
}

/// An orchestrator over the given store.
pub fn orchestrator_with(
    store: Arc<dyn SandboxStore>,
    provisioner: Arc<GatedProvisioner>,
) -> Orchestrator {
    Orchestrator::new(store, provisioner)
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;

    assert!(polled.is_ok(), "condition not reached within five seconds");
}
