//! The REST API over the sandbox lifecycle.
//!
//! | Method | Path | Success |
//! |---|---|---|
//! | `GET` | `/health` | `200` |
//! | `GET` | `/api/v1/sandboxes?limit=&offset=` | `200` |
//! | `POST` | `/api/v1/sandboxes` | `201` with a `Location` header |
//! | `GET` | `/api/v1/sandboxes/{id}` | `200` |
//! | `GET` | `/api/v1/sandboxes/name/{name}` | `200` |
//! | `PUT` | `/api/v1/sandboxes/{id}` | `200` |
//! | `DELETE` | `/api/v1/sandboxes/{id}` | `202` |
//!
//! Errors are returned as an [`ErrorResponse`] with `404` for unknown sandboxes, `409` for
//! operations the sandbox's status does not allow, `400` for malformed input and `500` otherwise.

mod handlers;
mod routes;
mod state;
mod types;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use routes::*;
pub use state::*;
pub use types::*;
