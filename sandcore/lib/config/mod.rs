//! Configuration types and defaults for sandcore.

mod defaults;
mod sandcore;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use defaults::*;
pub use sandcore::*;
