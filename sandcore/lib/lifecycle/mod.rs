//! The sandbox lifecycle: the status state machine and the orchestrator that drives it.

mod orchestrator;
mod params;
mod status;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use orchestrator::*;
pub use params::*;
pub use status::*;
