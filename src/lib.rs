//! # switchyard
//!
//! The request-dispatch core of a small RPC/HTTP service framework.
//!
//! For every request that arrives on a connection, switchyard:
//!
//! 1. asks the [`RateLimitGate`] whether the connection is soft-rate-limited,
//!    and if so answers `429` and closes;
//! 2. matches `(method, path)` against the compiled [`Routes`];
//! 3. awaits the bound handler with a [`Request`] carrying the path variables
//!    and the shared [`ConnectionContext`];
//! 4. counts the outcome in the injected [`Metrics`];
//! 5. writes the response and, by default, closes the connection.
//!
//! Response bodies are encoded with whichever [`Encoder`] the client's
//! `Accept` header selects (see [`ResponseFactory`]).
//!
//! What switchyard leaves to others: TLS, deciding *who* is rate-limited,
//! metrics export, and the business logic inside handlers.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use switchyard::{Error, Request, Response, ResponseFactory, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let app = Router::new()
//!         .get("/widgets/{id}", get_widget)
//!         .post("/widgets", create_widget)
//!         .with_admin_routes();
//!
//!     Server::bind("0.0.0.0:8080")?.serve(app).await
//! }
//!
//! async fn get_widget(req: Request) -> Result<Response, Error> {
//!     let id = req.variable("id").unwrap_or_default();
//!     req.ok(&serde_json::json!({ "id": id }))
//! }
//!
//! async fn create_widget(req: Request) -> Result<Response, Error> {
//!     if req.body().is_empty() {
//!         return req.bad_request("empty body");
//!     }
//!     req.ok_empty()
//! }
//! ```

mod config;
mod context;
mod dispatch;
mod encoding;
mod error;
mod factory;
mod handler;
mod method;
mod metrics;
mod pattern;
mod rate_limit;
mod request;
mod response;
mod router;
mod server;

pub mod admin;

pub use config::ServerConfig;
pub use context::{ConnectionContext, ConnectionInfo};
pub use dispatch::{ConnectionPolicy, Dispatched, Dispatcher};
pub use encoding::{Charset, Encoder, Encoders};
pub use error::{BoxError, Error};
pub use factory::ResponseFactory;
pub use handler::Handler;
pub use method::{Method, UnknownMethod};
pub use metrics::{DEFAULT_TRACKED_STATUSES, Metrics, MetricsSnapshot};
pub use rate_limit::{RateLimitGate, Unlimited};
pub use request::Request;
pub use response::{IntoResponse, RATE_LIMIT_BODY, Response};
pub use router::{PathVars, RouteMatch, Router, Routes};
pub use server::Server;
