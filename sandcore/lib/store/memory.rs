use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    models::{ProvisionHandle, SandboxRecord, SandboxStatus},
    SandcoreError, SandcoreResult,
};

use super::SandboxStore;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An in-memory [`SandboxStore`] guarded by a read/write lock.
///
/// Records are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Uuid, SandboxRecord>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `update` to the record with `id` and refreshes its `updated_at`.
    async fn modify(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        update: impl FnOnce(&mut SandboxRecord),
    ) -> bool {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(record) => {
                update(record);
                record.updated_at = record.updated_at.max(at);
                true
            }
            None => false,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl SandboxStore for MemoryStore {
    async fn insert(&self, record: &SandboxRecord) -> SandcoreResult<Uuid> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(SandcoreError::Store(format!(
                "sandbox {} already exists",
                record.id
            )));
        }

        records.insert(record.id, record.clone());
        Ok(record.id)
    }

    async fn get_by_id(&self, id: Uuid) -> SandcoreResult<SandboxRecord> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| SandcoreError::NotFound(id.to_string()))
    }

    async fn get_by_name(&self, name: &str) -> SandcoreResult<Vec<SandboxRecord>> {
        let records = self.records.read().await;
        let mut matches: Vec<SandboxRecord> = records
            .values()
            .filter(|record| record.name == name)
            .cloned()
            .collect();
        matches.sort_by_key(|record| (record.created_at, record.id));

        Ok(matches)
    }

    async fn list_all(&self, limit: usize, offset: usize) -> SandcoreResult<Vec<SandboxRecord>> {
        let records = self.records.read().await;
        let mut all: Vec<&SandboxRecord> = records.values().collect();
        all.sort_by_key(|record| (record.created_at, record.id));

        Ok(all.into_iter().skip(offset).take(limit).cloned().collect())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: SandboxStatus,
        at: DateTime<Utc>,
    ) -> SandcoreResult<bool> {
        Ok(self.modify(id, at, |record| record.status = status).await)
    }

    async fn update_expiration(
        &self,
        id: Uuid,
        expires_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> SandcoreResult<bool> {
        Ok(self
            .modify(id, at, |record| record.expires_at = expires_at)
            .await)
    }

    async fn finish_provisioning(
        &self,
        id: Uuid,
        status: SandboxStatus,
        handle: Option<&ProvisionHandle>,
        at: DateTime<Utc>,
    ) -> SandcoreResult<bool> {
        Ok(self
            .modify(id, at, |record| {
                record.status = status;
                record.handle = handle.cloned();
            })
            .await)
    }

    async fn delete(&self, id: Uuid) -> SandcoreResult<bool> {
        Ok(self.records.write().await.remove(&id).is_some())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
