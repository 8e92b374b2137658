//! Data models for sandcore.

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::SandcoreError;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A snapshot of a sandbox as stored in a [`SandboxStore`](crate::store::SandboxStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxRecord {
    /// The unique identifier of the sandbox. Assigned once at creation and never reused.
    pub id: Uuid,

    /// The caller-supplied name. Not required to be unique.
    pub name: String,

    /// When the sandbox was created.
    pub created_at: DateTime<Utc>,

    /// When the sandbox was last modified. Never decreases.
    pub updated_at: DateTime<Utc>,

    /// When the sandbox expires.
    pub expires_at: DateTime<Utc>,

    /// The lifecycle status of the sandbox.
    pub status: SandboxStatus,

    /// The provisioning backend's handle for the underlying resource, once provisioned.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub handle: Option<ProvisionHandle>,
}

/// The lifecycle status of a sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxStatus {
    /// Created, waiting for the provisioning backend.
    Pending,

    /// Provisioned and usable.
    Running,

    /// Stopped by an administrator.
    Stopped,

    /// Past its expiration.
    Expired,

    /// Provisioning failed.
    Failed,

    /// Torn down. Terminal.
    Deleted,
}

/// An opaque reference to a resource created by the provisioning backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvisionHandle(String);

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SandboxRecord {
    /// Creates a pending record stamped with `now`.
    pub fn pending(
        id: Uuid,
        name: impl Into<String>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            created_at: now,
            updated_at: now,
            expires_at,
            status: SandboxStatus::Pending,
            handle: None,
        }
    }
}

impl SandboxStatus {
    /// All statuses, in declaration order.
    pub const ALL: [SandboxStatus; 6] = [
        SandboxStatus::Pending,
        SandboxStatus::Running,
        SandboxStatus::Stopped,
        SandboxStatus::Expired,
        SandboxStatus::Failed,
        SandboxStatus::Deleted,
    ];

    /// Returns the lowercase name used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            SandboxStatus::Pending => "pending",
            SandboxStatus::Running => "running",
            SandboxStatus::Stopped => "stopped",
            SandboxStatus::Expired => "expired",
            SandboxStatus::Failed => "failed",
            SandboxStatus::Deleted => "deleted",
        }
    }
}

impl ProvisionHandle {
    /// Wraps a backend-specific handle.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Returns the handle as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for SandboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SandboxStatus {
    type Err = SandcoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SandboxStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SandcoreError::Store(format!("unknown sandbox status: {s}")))
    }
}

impl Display for ProvisionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
