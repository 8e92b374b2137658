use thiserror::Error;
use uuid::Uuid;

use crate::models::SandboxStatus;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a sandcore-related operation.
pub type SandcoreResult<T> = Result<T, SandcoreError>;

/// An error that occurred during a sandbox lifecycle operation.
#[derive(pretty_error_debug::Debug, Error)]
pub enum SandcoreError {
    /// No sandbox exists for the given id.
    #[error("sandbox not found: {0}")]
    NotFound(String),

    /// The operation is not legal for the sandbox's current status.
    #[error("cannot {operation} sandbox {id} in status {status}")]
    InvalidState {
        /// The sandbox the operation targeted.
        id: Uuid,

        /// The status the sandbox was in.
        status: SandboxStatus,

        /// The rejected operation.
        operation: &'static str,
    },

    /// A removal of the sandbox is already in progress.
    #[error("sandbox {0} is already being removed")]
    RemovalInProgress(Uuid),

    /// The caller supplied malformed input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The provisioning backend failed.
    #[error("provisioning error: {0}")]
    Provision(String),

    /// A store operation could not be applied.
    #[error("store error: {0}")]
    Store(String),

    /// An error that occurred during a database operation.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An error that occurred while running database migrations.
    #[error("database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that occurred when parsing a configuration file.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// An error that occurred when parsing a uuid.
    #[error("uuid error: {0}")]
    Uuid(#[from] uuid::Error),

    /// An error from the sandutils helpers.
    #[error("sandutils error: {0}")]
    Sandutils(#[from] sandutils::SandutilsError),
}

/// The classification of a [`SandcoreError`] used by callers that map errors to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The sandbox does not exist.
    NotFound,

    /// The operation is not legal in the sandbox's current status.
    InvalidState,

    /// The input was malformed.
    Validation,

    /// A failure not attributable to caller input.
    Internal,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SandcoreError {
    /// Returns the taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SandcoreError::NotFound(_) => ErrorKind::NotFound,
            SandcoreError::InvalidState { .. } | SandcoreError::RemovalInProgress(_) => {
                ErrorKind::InvalidState
            }
            SandcoreError::Validation(_) => ErrorKind::Validation,
            SandcoreError::Provision(_)
            | SandcoreError::Store(_)
            | SandcoreError::Database(_)
            | SandcoreError::Migration(_)
            | SandcoreError::Io(_)
            | SandcoreError::ConfigParse(_)
            | SandcoreError::Uuid(_)
            | SandcoreError::Sandutils(_) => ErrorKind::Internal,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
