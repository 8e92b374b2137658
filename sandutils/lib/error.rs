//! `sandutils::error` is a module containing error utilities for the sandcore project.

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a sandutils-related operation.
pub type SandutilsResult<T> = Result<T, SandutilsError>;

/// An error that occurred in one of the sandutils helpers.
#[derive(pretty_error_debug::Debug, Error)]
pub enum SandutilsError {
    /// The user's home directory could not be determined.
    #[error("home directory could not be determined")]
    HomeDirNotFound,

    /// An error that occurred when validating paths
    #[error("path validation error: {0}")]
    PathValidation(String),
}
