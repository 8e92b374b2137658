//! `sandutils::runtime` is a module containing runtime utilities for the sandcore project.

mod drain;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use drain::*;
