//! Server state management.

use crate::lifecycle::Orchestrator;

//-------------------------------------------------------------------------------------------------
// Types
//-------------------------------------------------------------------------------------------------

/// Shared server state handed to every request handler.
///
/// The orchestrator serializes conflicting work itself, so the state needs no extra lock.
#[derive(Debug, Clone)]
pub struct ServerState {
    orchestrator: Orchestrator,
}

//-------------------------------------------------------------------------------------------------
// Methods
//-------------------------------------------------------------------------------------------------

impl ServerState {
    /// Creates a new ServerState around an orchestrator
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Gets a reference to the orchestrator
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}
