//! Storage of sandbox records.
//!
//! A [`SandboxStore`] makes every individual call atomic with respect to the record it touches,
//! but offers no transactions across calls. Check-then-act sequences are serialized by the
//! [`Orchestrator`](crate::lifecycle::Orchestrator) instead.

mod memory;
mod sqlite;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use memory::*;
pub use sqlite::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    models::{ProvisionHandle, SandboxRecord, SandboxStatus},
    SandcoreResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Keyed storage for sandbox records.
///
/// The mutating calls take the time of the mutation explicitly. Implementations must never move
/// `updated_at` backwards, so an `at` older than the stored value leaves it unchanged.
#[async_trait]
pub trait SandboxStore: Send + Sync {
    /// Inserts a new record and returns its id.
    async fn insert(&self, record: &SandboxRecord) -> SandcoreResult<Uuid>;

    /// Gets a record by id, failing with [`SandcoreError::NotFound`](crate::SandcoreError::NotFound)
    /// if it does not exist.
    async fn get_by_id(&self, id: Uuid) -> SandcoreResult<SandboxRecord>;

    /// Gets every record with the given name. Returns an empty list when none match.
    async fn get_by_name(&self, name: &str) -> SandcoreResult<Vec<SandboxRecord>>;

    /// Lists records ordered by creation time.
    async fn list_all(&self, limit: usize, offset: usize) -> SandcoreResult<Vec<SandboxRecord>>;

    /// Sets the status of a record. Returns false if the record does not exist.
    async fn update_status(
        &self,
        id: Uuid,
        status: SandboxStatus,
        at: DateTime<Utc>,
    ) -> SandcoreResult<bool>;

    /// Sets the expiration of a record. Returns false if the record does not exist.
    async fn update_expiration(
        &self,
        id: Uuid,
        expires_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> SandcoreResult<bool>;

    /// Writes the outcome of provisioning in one step: the new status, the backend handle (if
    /// any) and `updated_at`. Returns false if the record does not exist.
    async fn finish_provisioning(
        &self,
        id: Uuid,
        status: SandboxStatus,
        handle: Option<&ProvisionHandle>,
        at: DateTime<Utc>,
    ) -> SandcoreResult<bool>;

    /// Deletes a record. Returns false if the record did not exist.
    async fn delete(&self, id: Uuid) -> SandcoreResult<bool>;
}
