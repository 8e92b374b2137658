//! Route definitions for the HTTP server.

use std::future::Future;

use axum::{routing::get, Router};
use tokio::net::TcpListener;

use crate::SandcoreResult;

use super::{handlers, state::ServerState};

//-------------------------------------------------------------------------------------------------
// Constants
//-------------------------------------------------------------------------------------------------

/// Base path of the sandbox endpoints.
pub const SANDBOXES_PATH: &str = "/api/v1/sandboxes";

//-------------------------------------------------------------------------------------------------
// Functions
//-------------------------------------------------------------------------------------------------

/// Creates a new router with all API endpoints configured
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            SANDBOXES_PATH,
            get(handlers::list_handler).post(handlers::create_handler),
        )
        .route(
            &format!("{SANDBOXES_PATH}/{{id}}"),
            get(handlers::get_handler)
                .put(handlers::update_handler)
                .delete(handlers::delete_handler),
        )
        .route(
            &format!("{SANDBOXES_PATH}/name/{{name}}"),
            get(handlers::get_by_name_handler),
        )
        .with_state(state)
}

/// Serves the API on `listener` until `shutdown` resolves.
///
/// Returns once in-flight requests have completed. Background work of the orchestrator may still
/// be running and has to be drained separately.
pub async fn serve(
    listener: TcpListener,
    state: ServerState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> SandcoreResult<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("server stopped accepting requests");
    Ok(())
}
