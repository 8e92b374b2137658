//! Request and response types of the REST API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use uuid::Uuid;

use crate::{
    models::{SandboxRecord, SandboxStatus},
    ErrorKind, SandcoreError,
};

//-------------------------------------------------------------------------------------------------
// Types: Requests
//-------------------------------------------------------------------------------------------------

/// Request body of `POST /api/v1/sandboxes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSandboxRequest {
    /// Name of the sandbox. Must not be empty.
    pub name: String,

    /// When the sandbox should expire. Defaults to seven days from now.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request body of `PUT /api/v1/sandboxes/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSandboxRequest {
    /// The new expiration. Must lie in the future.
    pub expires_at: DateTime<Utc>,
}

/// Query string of `GET /api/v1/sandboxes`.
///
/// Kept as strings so malformed values fall back to the defaults instead of failing the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// Maximum number of sandboxes to return.
    pub limit: Option<String>,

    /// Number of sandboxes to skip.
    pub offset: Option<String>,
}

//-------------------------------------------------------------------------------------------------
// Types: Responses
//-------------------------------------------------------------------------------------------------

/// A sandbox as seen by API clients. The backend's provisioning handle is not exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxResponse {
    /// The unique identifier of the sandbox.
    pub id: Uuid,

    /// The caller-supplied name.
    pub name: String,

    /// When the sandbox was created.
    pub created_at: DateTime<Utc>,

    /// When the sandbox was last modified.
    pub updated_at: DateTime<Utc>,

    /// When the sandbox expires.
    pub expires_at: DateTime<Utc>,

    /// The lifecycle status of the sandbox.
    pub status: SandboxStatus,
}

/// Response body of endpoints that return several sandboxes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxListResponse {
    /// The sandboxes.
    pub sandbox_list: Vec<SandboxResponse>,
}

/// Response body of the health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Always `OK`.
    pub message: String,
}

//-------------------------------------------------------------------------------------------------
// Types: Errors
//-------------------------------------------------------------------------------------------------

/// Standard error response format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status code
    pub code: u16,

    /// Error message
    pub message: String,

    /// Error type for categorizing errors
    pub error_type: ErrorType,

    /// Optional additional details about the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Types of errors that can occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Invalid request parameters or body
    ValidationError,

    /// Resource not found
    NotFound,

    /// The operation conflicts with the sandbox's status
    InvalidState,

    /// Internal server errors
    InternalError,
}

/// An error returned by a handler, rendered as an [`ErrorResponse`].
#[derive(Debug)]
pub struct ApiError(ErrorResponse);

/// The result type of the handlers.
pub type ApiResult<T> = Result<T, ApiError>;

//-------------------------------------------------------------------------------------------------
// Methods
//-------------------------------------------------------------------------------------------------

impl StatusResponse {
    /// Create a new status response for a successful operation
    pub fn ok() -> Self {
        Self {
            message: "OK".to_string(),
        }
    }
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(code: u16, message: impl Into<String>, error_type: ErrorType) -> Self {
        Self {
            code,
            message: message.into(),
            error_type,
            details: None,
        }
    }

    /// Add details to the error response, ignoring details for 500-level errors
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        if self.code < 500 {
            self.details = Some(details.into());
        }
        self
    }
}

impl ApiError {
    /// A 400 response for malformed input.
    pub fn validation(message: impl Into<String>) -> Self {
        Self(ErrorResponse::new(
            StatusCode::BAD_REQUEST.as_u16(),
            message,
            ErrorType::ValidationError,
        ))
    }

    /// A 404 response.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self(ErrorResponse::new(
            StatusCode::NOT_FOUND.as_u16(),
            message,
            ErrorType::NotFound,
        ))
    }

    /// Attaches details, which are dropped for server errors.
    pub fn with_details(self, details: impl Into<String>) -> Self {
        Self(self.0.with_details(details))
    }

    /// The response body.
    pub fn body(&self) -> &ErrorResponse {
        &self.0
    }
}

//-------------------------------------------------------------------------------------------------
// Trait Implementations
//-------------------------------------------------------------------------------------------------

impl From<SandboxRecord> for SandboxResponse {
    fn from(record: SandboxRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            created_at: record.created_at,
            updated_at: record.updated_at,
            expires_at: record.expires_at,
            status: record.status,
        }
    }
}

impl FromIterator<SandboxRecord> for SandboxListResponse {
    fn from_iter<I: IntoIterator<Item = SandboxRecord>>(records: I) -> Self {
        Self {
            sandbox_list: records.into_iter().map(SandboxResponse::from).collect(),
        }
    }
}

impl From<SandcoreError> for ApiError {
    fn from(error: SandcoreError) -> Self {
        let (status, message, error_type) = match error.kind() {
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "Sandbox not found", ErrorType::NotFound),
            ErrorKind::InvalidState => (
                StatusCode::CONFLICT,
                "Operation not allowed in the sandbox's current status",
                ErrorType::InvalidState,
            ),
            ErrorKind::Validation => (
                StatusCode::BAD_REQUEST,
                "Invalid request",
                ErrorType::ValidationError,
            ),
            ErrorKind::Internal => {
                tracing::error!(error = %error, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    ErrorType::InternalError,
                )
            }
        };

        Self(ErrorResponse::new(status.as_u16(), message, error_type)).with_details(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0)).into_response()
    }
}

//-------------------------------------------------------------------------------------------------
// Tests
//-------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use crate::models::ProvisionHandle;

    use super::*;

    #[test]
    fn test_sandbox_response_hides_handle() -> anyhow::Result<()> {
        let now = Utc::now();
        let mut record =
            SandboxRecord::pending(Uuid::new_v4(), "demo", now + TimeDelta::days(1), now);
        record.status = SandboxStatus::Running;
        record.handle = Some(ProvisionHandle::new("sbx-secret"));

        let json = serde_json::to_value(SandboxResponse::from(record.clone()))?;
        assert!(json.get("handle").is_none());
        assert_eq!(json["status"], "running");
        assert_eq!(json["id"], record.id.to_string());

        let list: SandboxListResponse = vec![record].into_iter().collect();
        assert!(!serde_json::to_string(&list)?.contains("sbx-secret"));
        Ok(())
    }

    #[test]
    fn test_error_kinds_map_to_status_codes() {
        let id = Uuid::new_v4();
        let cases = [
            (SandcoreError::NotFound(id.to_string()), 404, ErrorType::NotFound),
            (
                SandcoreError::InvalidState {
                    id,
                    status: SandboxStatus::Pending,
                    operation: "remove",
                },
                409,
                ErrorType::InvalidState,
            ),
            (SandcoreError::RemovalInProgress(id), 409, ErrorType::InvalidState),
            (
                SandcoreError::Validation("bad".into()),
                400,
                ErrorType::ValidationError,
            ),
            (
                SandcoreError::Provision("backend down".into()),
                500,
                ErrorType::InternalError,
            ),
        ];

        for (error, code, error_type) in cases {
            let api = ApiError::from(error);
            assert_eq!(api.body().code, code);
            assert_eq!(api.body().error_type, error_type);
        }
    }

    #[test]
    fn test_server_errors_hide_details() {
        let api = ApiError::from(SandcoreError::Store("disk full".into()));
        assert!(api.body().details.is_none());

        let api = ApiError::from(SandcoreError::Validation("name must not be empty".into()));
        assert_eq!(
            api.body().details.as_deref(),
            Some("validation error: name must not be empty")
        );
    }
}
