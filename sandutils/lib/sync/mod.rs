//! `sandutils::sync` is a module containing synchronization primitives for the sandcore project.

mod keyed;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use keyed::*;
