//! HTTP request handlers for the REST API.
//!
//! Handlers translate between the wire types and the [`Orchestrator`](crate::lifecycle::Orchestrator)
//! and map its errors to status codes.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::lifecycle::ListParams;

use super::{
    routes::SANDBOXES_PATH,
    state::ServerState,
    types::{
        ApiError, ApiResult, CreateSandboxRequest, ListQuery, SandboxListResponse,
        SandboxResponse, StatusResponse, UpdateSandboxRequest,
    },
};

//-------------------------------------------------------------------------------------------------
// Functions: Handlers
//-------------------------------------------------------------------------------------------------

/// Handler for `GET /health`
pub async fn health_handler() -> Json<StatusResponse> {
    Json(StatusResponse::ok())
}

/// Handler for `GET /api/v1/sandboxes`
pub async fn list_handler(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<SandboxListResponse>> {
    let params = ListParams::parse(query.limit.as_deref(), query.offset.as_deref());
    let sandboxes = state.orchestrator().list_all(params).await?;
    Ok(Json(sandboxes.into_iter().collect()))
}

/// Handler for `POST /api/v1/sandboxes`
///
/// Answers `201 Created` with the pending sandbox while provisioning continues in the background.
pub async fn create_handler(
    State(state): State<ServerState>,
    body: Result<Json<CreateSandboxRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body.map_err(invalid_body)?;
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("Sandbox name must not be empty"));
    }

    tracing::debug!(name = %req.name, "received create request");
    let sandbox = state.orchestrator().create(req.name, req.expires_at).await?;
    let location = format!("{SANDBOXES_PATH}/{}", sandbox.id);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(SandboxResponse::from(sandbox)),
    ))
}

/// Handler for `GET /api/v1/sandboxes/{id}`
pub async fn get_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SandboxResponse>> {
    let id = parse_id(&id)?;
    Ok(Json(state.orchestrator().get_by_id(id).await?.into()))
}

/// Handler for `GET /api/v1/sandboxes/name/{name}`
///
/// Unlike the orchestrator, answers `404` when no sandbox has the name.
pub async fn get_by_name_handler(
    State(state): State<ServerState>,
    Path(name): Path<String>,
) -> ApiResult<Json<SandboxListResponse>> {
    let sandboxes = state.orchestrator().get_by_name(&name).await?;
    if sandboxes.is_empty() {
        return Err(ApiError::not_found(format!("No sandbox named {name}")));
    }

    Ok(Json(sandboxes.into_iter().collect()))
}

/// Handler for `PUT /api/v1/sandboxes/{id}`
pub async fn update_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateSandboxRequest>, JsonRejection>,
) -> ApiResult<Json<SandboxResponse>> {
    let id = parse_id(&id)?;
    let Json(req) = body.map_err(invalid_body)?;

    let sandbox = state
        .orchestrator()
        .update_expiration(id, req.expires_at)
        .await?;
    Ok(Json(sandbox.into()))
}

/// Handler for `DELETE /api/v1/sandboxes/{id}`
///
/// Answers `202 Accepted` with the snapshot taken before the removal started.
pub async fn delete_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id)?;
    let sandbox = state.orchestrator().remove(id).await?;
    Ok((StatusCode::ACCEPTED, Json(SandboxResponse::from(sandbox))))
}

//-------------------------------------------------------------------------------------------------
// Functions: Helpers
//-------------------------------------------------------------------------------------------------

/// Parses a path id. A malformed id cannot name a sandbox, so it is reported as not found.
fn parse_id(id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| ApiError::not_found(format!("Sandbox not found: {id}")))
}

fn invalid_body(rejection: JsonRejection) -> ApiError {
    ApiError::validation("Invalid request body").with_details(rejection.body_text())
}
