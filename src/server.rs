//! TCP transport and graceful shutdown.
//!
//! The server owns everything the dispatch core treats as external: accepting
//! sockets, HTTP/1.1 framing (hyper), assembling the request body up to
//! `max_body_bytes`, and writing the response. Each accepted connection runs
//! on its own task; requests on one connection are handled strictly in order.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server:
//! 1. Immediately stops `listener.accept()`.
//! 2. Asks every open connection to shut down gracefully: idle keep-alive
//!    connections close at once, a request in progress gets its response.
//! 3. Returns from [`Server::serve`] once every connection task has ended.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::context::{ConnectionContext, ConnectionInfo};
use crate::dispatch::{ConnectionPolicy, Dispatcher};
use crate::encoding::Encoders;
use crate::error::Error;
use crate::metrics::Metrics;
use crate::rate_limit::{RateLimitGate, Unlimited};
use crate::response::Response;
use crate::router::Router;

/// The HTTP server.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use switchyard::{Metrics, Router, Server};
///
/// # async fn run() -> Result<(), switchyard::Error> {
/// let metrics = Arc::new(Metrics::default());
/// Server::bind("0.0.0.0:8080")?
///     .metrics(Arc::clone(&metrics))
///     .serve(Router::new().with_admin_routes())
///     .await
/// # }
/// ```
pub struct Server {
    config: ServerConfig,
    encoders: Encoders,
    metrics: Option<Arc<Metrics>>,
    gate: Arc<dyn RateLimitGate>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            encoders: Encoders::default(),
            metrics: None,
            gate: Arc::new(Unlimited),
        }
    }

    /// A server with default settings listening on `addr`.
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let config = ServerConfig { bind: addr.parse()?, ..ServerConfig::default() };
        Ok(Self::new(config))
    }

    pub fn encoders(mut self, encoders: Encoders) -> Self {
        self.encoders = encoders;
        self
    }

    /// Uses `metrics` instead of a collector built from the config's tracked
    /// status codes. Keep a clone to read the counters.
    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn rate_limit_gate(mut self, gate: impl RateLimitGate + 'static) -> Self {
        self.gate = Arc::new(gate);
        self
    }

    /// Binds the configured address and serves until SIGTERM or Ctrl-C.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let listener = TcpListener::bind(self.config.bind).await?;
        self.serve_listener(listener, router, shutdown_signal()).await
    }

    /// Serves on an already bound listener until `shutdown` resolves, then
    /// drains in-flight connections.
    pub async fn serve_listener(
        self,
        listener: TcpListener,
        router: Router,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let routes = router.compile()?;
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Arc::new(Metrics::new(self.config.tracked_statuses()?)),
        };
        let route_count = routes.len();
        let context = Arc::new(ConnectionContext::new(routes, self.encoders, metrics));
        let policy = self.config.connection;
        let max_body = self.config.max_body_bytes;
        let dispatcher = Arc::new(Dispatcher::new(context, self.gate, policy));

        info!(addr = %listener.local_addr()?, routes = route_count, ?policy, "switchyard listening");

        // Every connection task is tracked twice: the JoinSet owns the task,
        // and the graceful watcher can ask its connection to wind down.
        let mut tasks = tokio::task::JoinSet::new();
        let graceful = GracefulShutdown::new();
        let mut next_id: u64 = 0;

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // `biased` polls the arms top to bottom, so a shutdown signal
                // stops accepting even when connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    next_id += 1;
                    let conn = ConnectionInfo::new(next_id, Some(peer));
                    let dispatcher = Arc::clone(&dispatcher);
                    // TokioIo adapts tokio's AsyncRead/AsyncWrite to hyper's IO traits.
                    let io = TokioIo::new(stream);

                    // Called once per request on the connection, not once per connection.
                    let svc = service_fn(move |req| {
                        let dispatcher = Arc::clone(&dispatcher);
                        async move { handle(&dispatcher, conn, max_body, req).await }
                    });

                    let connection = http1::Builder::new()
                        .keep_alive(policy == ConnectionPolicy::KeepAlive)
                        .serve_connection(io, svc);
                    let connection = graceful.watch(connection);

                    tasks.spawn(async move {
                        debug!(conn = conn.id(), %peer, "connection accepted");
                        if let Err(e) = connection.await {
                            error!(conn = conn.id(), %peer, "connection error: {e}");
                        }
                    });
                }

                // Reap finished tasks so the set does not grow without bound.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Idle keep-alive connections close now; a connection mid-request
        // finishes writing that response first.
        graceful.shutdown().await;
        while tasks.join_next().await.is_some() {}

        info!("switchyard stopped");
        Ok(())
    }
}

// ── Request handling ──────────────────────────────────────────────────────────

/// Collects the body, then hands the assembled request to the dispatcher.
///
/// An `Err` here makes hyper drop the connection without a response; that is
/// reserved for a body stream that fails mid-read.
async fn handle(
    dispatcher: &Dispatcher,
    conn: ConnectionInfo,
    max_body: usize,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Error> {
    let (parts, body) = req.into_parts();

    let body = match Limited::new(body, max_body).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            warn!(conn = conn.id(), limit = max_body, "request body too large");
            let mut res = Response::plain(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
            res.close_connection();
            return Ok(res.into_inner());
        }
        Err(e) => return Err(Error::Body(e)),
    };

    let dispatched = dispatcher.dispatch(&conn, http::Request::from_parts(parts, body)).await;

    // The `connection: close` header the dispatcher set is what makes hyper
    // end the connection once this response is flushed.
    if dispatched.close {
        debug!(conn = conn.id(), "closing connection after response");
    }
    Ok(dispatched.response.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or Ctrl-C.
///
/// If a handler cannot be installed the failure is logged and that signal
/// is ignored.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // A future that never resolves, so the SIGTERM arm is inert off Unix.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
