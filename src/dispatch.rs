//! The per-request dispatch pipeline.
//!
//! One pass per request, no retries:
//!
//! ```text
//! admission ──rate limited──▶ 429, close
//!     │
//!  routing ───no match──────▶ 404
//!     │
//!  handler ───Err / panic───▶ 500
//!     │
//!  outcome accounting ─▶ completion (close or keep-alive per policy)
//! ```
//!
//! Every fault is contained here. A handler error, an encoding failure that
//! escaped a handler, or a panic all become a `500`; nothing propagates to the
//! connection task.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use http::StatusCode;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::context::{ConnectionContext, ConnectionInfo};
use crate::method::Method;
use crate::rate_limit::RateLimitGate;
use crate::request::Request;
use crate::response::Response;

/// What happens to a connection after a response is written.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionPolicy {
    /// One request per connection: close after every response.
    #[default]
    Close,
    /// Keep the connection open for further requests. Rate-limited
    /// connections are still closed.
    KeepAlive,
}

/// A response plus the decision whether to close the connection after it.
#[derive(Debug)]
pub struct Dispatched {
    pub response: Response,
    /// When set, `response` already carries `connection: close`; that header
    /// is what the HTTP/1 transport acts on.
    pub close: bool,
}

/// Runs requests through the admission, routing, handler and accounting steps.
pub struct Dispatcher {
    context: Arc<ConnectionContext>,
    gate: Arc<dyn RateLimitGate>,
    policy: ConnectionPolicy,
}

impl Dispatcher {
    pub fn new(
        context: Arc<ConnectionContext>,
        gate: Arc<dyn RateLimitGate>,
        policy: ConnectionPolicy,
    ) -> Self {
        Self { context, gate, policy }
    }

    pub fn context(&self) -> &Arc<ConnectionContext> {
        &self.context
    }

    /// Dispatches one fully assembled request received on `conn`.
    pub async fn dispatch(&self, conn: &ConnectionInfo, req: http::Request<Bytes>) -> Dispatched {
        let metrics = self.context.metrics();
        metrics.mark_request();

        if self.gate.is_rate_limited(conn) {
            warn!(conn = conn.id(), peer = ?conn.peer(), "connection is rate limited, rejecting request");
            metrics.mark_status(StatusCode::TOO_MANY_REQUESTS);
            return Self::finish(Response::rate_limited(), true);
        }

        debug!(conn = conn.id(), method = %req.method(), path = req.uri().path(), "dispatching");

        let response = self.route(conn, req).await;
        metrics.mark_status(response.status());

        debug!(conn = conn.id(), status = response.status().as_u16(), "dispatched");
        Self::finish(response, self.policy == ConnectionPolicy::Close)
    }

    async fn route(&self, conn: &ConnectionInfo, req: http::Request<Bytes>) -> Response {
        let found = Method::try_from(req.method())
            .ok()
            .and_then(|method| self.context.routes().find(method, req.uri().path()));

        let Some(found) = found else {
            return Response::plain(StatusCode::NOT_FOUND, "Not Found");
        };

        let (handler, pattern, vars) = found.into_parts();
        let request = Request::new(req, Arc::clone(&pattern), vars, Arc::clone(&self.context), *conn);

        match AssertUnwindSafe(handler.call(request)).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!(conn = conn.id(), route = %pattern, error = %e, "handler returned an error");
                internal_server_error()
            }
            Err(panic) => {
                error!(conn = conn.id(), route = %pattern, "handler panicked: {}", panic_message(&*panic));
                internal_server_error()
            }
        }
    }

    fn finish(mut response: Response, close: bool) -> Dispatched {
        if close {
            response.close_connection();
        }
        Dispatched { response, close }
    }
}

fn internal_server_error() -> Response {
    Response::plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
