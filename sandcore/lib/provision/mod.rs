//! The boundary to the backend that creates and destroys the resources behind sandboxes.

mod simulated;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use simulated::*;

use async_trait::async_trait;

use crate::{models::ProvisionHandle, SandcoreResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Creates and destroys the resource underlying a sandbox.
///
/// Both calls may take a long time. The orchestrator never holds a lock across them and does not
/// interpret the returned handle. Neither call is assumed to be idempotent.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Provisions the resource for the sandbox named `name`.
    async fn provision(&self, name: &str) -> SandcoreResult<ProvisionHandle>;

    /// Tears down a resource previously returned by [`provision`](Self::provision).
    async fn deprovision(&self, handle: &ProvisionHandle) -> SandcoreResult<()>;
}
