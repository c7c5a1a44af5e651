//! Built-in operational handlers.
//!
//! | Path | Question |
//! |---|---|
//! | `/healthz` | Is the process alive? |
//! | `/readyz` | Can it serve traffic? |
//! | `/metrics` | Request and outcome counters, as JSON. |
//!
//! Register all three with [`Router::with_admin_routes`](crate::Router::with_admin_routes),
//! or pick individual ones:
//!
//! ```rust
//! use switchyard::{Router, admin};
//!
//! let app = Router::new()
//!     .get("/healthz", admin::liveness)
//!     .get("/internal/counters", admin::metrics);
//! ```

use http::StatusCode;

use crate::error::Error;
use crate::factory::ResponseFactory;
use crate::request::Request;
use crate::response::Response;

/// Always `200 OK` with body `"ok"`.
pub async fn liveness(_req: Request) -> Response {
    Response::plain(StatusCode::OK, "ok")
}

/// `200 OK` with body `"ready"`. Replace with your own handler to gate on
/// dependency health.
pub async fn readiness(_req: Request) -> Response {
    Response::plain(StatusCode::OK, "ready")
}

/// The connection context's [`MetricsSnapshot`](crate::MetricsSnapshot),
/// encoded with the negotiated encoder.
pub async fn metrics(req: Request) -> Result<Response, Error> {
    let snapshot = req.connection_context().metrics().snapshot();
    req.ok(&snapshot)
}
