use uuid::Uuid;

use crate::{models::SandboxStatus, SandcoreError, SandcoreResult};

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SandboxStatus {
    /// The statuses this status may move to.
    ///
    /// ```text
    /// Pending -> Running | Failed
    /// Running -> Deleted | Stopped | Expired
    /// Stopped -> Deleted
    /// Failed  -> Deleted
    /// Expired -> (none)
    /// Deleted -> (none, terminal)
    /// ```
    pub fn allowed_transitions(&self) -> &'static [SandboxStatus] {
        match self {
            SandboxStatus::Pending => &[SandboxStatus::Running, SandboxStatus::Failed],
            SandboxStatus::Running => &[
                SandboxStatus::Deleted,
                SandboxStatus::Stopped,
                SandboxStatus::Expired,
            ],
            SandboxStatus::Stopped => &[SandboxStatus::Deleted],
            SandboxStatus::Failed => &[SandboxStatus::Deleted],
            SandboxStatus::Expired => &[],
            SandboxStatus::Deleted => &[],
        }
    }

    /// Returns true if moving from this status to `next` is legal.
    pub fn can_transition_to(&self, next: SandboxStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Returns true once no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SandboxStatus::Deleted)
    }

    /// Returns true if a removal may be started from this status.
    pub fn is_removable(&self) -> bool {
        self.can_transition_to(SandboxStatus::Deleted)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Checks `from -> to` against the transition table.
///
/// `operation` names the rejected action in the resulting [`SandcoreError::InvalidState`].
pub fn check_transition(
    id: Uuid,
    from: SandboxStatus,
    to: SandboxStatus,
    operation: &'static str,
) -> SandcoreResult<()> {
    if from.can_transition_to(to) {
        return Ok(());
    }

    Err(SandcoreError::InvalidState {
        id,
        status: from,
        operation,
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
