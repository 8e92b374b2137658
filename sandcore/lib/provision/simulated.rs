use std::time::Duration;

use async_trait::async_trait;
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::{config::DEFAULT_PROVISION_DELAY, models::ProvisionHandle, SandcoreError, SandcoreResult};

use super::Provisioner;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Prefix of the handles issued by [`SimulatedProvisioner`].
pub const SIMULATED_HANDLE_PREFIX: &str = "sbx-";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A provisioner that stands in for a real cloud backend by sleeping.
///
/// Provisioning fails for names starting with `fail_name_prefix`, which makes the failure path
/// reachable without a real backend.
///
/// ## Example
///
/// ```
/// # use std::time::Duration;
/// # use sandcore::provision::SimulatedProvisioner;
/// let provisioner = SimulatedProvisioner::builder()
///     .delay(Duration::from_millis(50))
///     .fail_name_prefix("broken-")
///     .build();
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct SimulatedProvisioner {
    /// How long each provision and deprovision call takes.
    #[builder(default = DEFAULT_PROVISION_DELAY)]
    delay: Duration,

    /// Names with this prefix fail to provision.
    #[builder(default, setter(strip_option, into))]
    fail_name_prefix: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for SimulatedProvisioner {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[async_trait]
impl Provisioner for SimulatedProvisioner {
    async fn provision(&self, name: &str) -> SandcoreResult<ProvisionHandle> {
        tokio::time::sleep(self.delay).await;

        if let Some(prefix) = &self.fail_name_prefix {
            if name.starts_with(prefix.as_str()) {
                return Err(SandcoreError::Provision(format!(
                    "simulated failure provisioning {name}"
                )));
            }
        }

        let handle = ProvisionHandle::new(format!("{SIMULATED_HANDLE_PREFIX}{}", Uuid::new_v4()));
        tracing::debug!(name, %handle, "simulated provisioning finished");

        Ok(handle)
    }

    async fn deprovision(&self, handle: &ProvisionHandle) -> SandcoreResult<()> {
        if !handle.as_str().starts_with(SIMULATED_HANDLE_PREFIX) {
            return Err(SandcoreError::Provision(format!(
                "unknown resource handle: {handle}"
            )));
        }

        tokio::time::sleep(self.delay).await;
        tracing::debug!(%handle, "simulated deprovisioning finished");

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
