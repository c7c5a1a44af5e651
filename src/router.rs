//! Route registration and the compiled route table.
//!
//! Registration and matching are split in two. [`Router`] collects
//! `(method, pattern, handler)` bindings at startup; [`Router::compile`]
//! validates every pattern and freezes them into [`Routes`], one radix tree
//! per HTTP method. Lookup cost follows the path length, not the number of
//! registered routes.
//!
//! Within a tree a literal segment always outranks a variable segment at the
//! same position, so for `/widgets/new` and `/widgets/{id}` the path
//! `/widgets/new` picks the literal route and `/widgets/7` the variable one.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::admin;
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::pattern::PathPattern;

/// Collects route registrations. Build it once at startup, then hand it to
/// [`Server::serve`](crate::Server::serve) or call [`compile`](Router::compile).
///
/// ```rust
/// # use switchyard::{Request, Response, Router, Error, ResponseFactory};
/// # async fn list(req: Request) -> Result<Response, Error> { req.ok("[]") }
/// # async fn show(req: Request) -> Result<Response, Error> { req.ok("{}") }
/// # async fn create(req: Request) -> Result<Response, Error> { req.ok_empty() }
/// let routes = Router::new()
///     .get("/widgets", list)
///     .get("/widgets/{id}", show)
///     .post("/widgets", create)
///     .compile()
///     .unwrap();
/// ```
pub struct Router {
    pending: Vec<(Method, String, BoxedHandler)>,
}

impl Router {
    pub fn new() -> Self {
        Self { pending: Vec::new() }
    }

    /// Register a handler for a method + pattern pair. Returns `self` for chaining.
    ///
    /// Patterns are validated by [`compile`](Router::compile), not here, so a
    /// bad pattern surfaces as an error instead of a panic.
    pub fn on(mut self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        self.pending.push((method, pattern.to_owned(), handler.into_boxed_handler()));
        self
    }

    pub fn get(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Get, pattern, handler)
    }

    pub fn post(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Post, pattern, handler)
    }

    pub fn put(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Put, pattern, handler)
    }

    pub fn patch(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Patch, pattern, handler)
    }

    pub fn delete(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Delete, pattern, handler)
    }

    pub fn head(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Head, pattern, handler)
    }

    pub fn options(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Options, pattern, handler)
    }

    /// Registers the built-in operational endpoints: `GET /healthz`,
    /// `GET /readyz` and `GET /metrics`. See [`admin`].
    pub fn with_admin_routes(self) -> Self {
        self.get("/healthz", admin::liveness)
            .get("/readyz", admin::readiness)
            .get("/metrics", admin::metrics)
    }

    /// Freezes the registrations into an immutable [`Routes`] table.
    ///
    /// Fails on the first malformed pattern, or when two patterns for the
    /// same method can match exactly the same paths (e.g. `/a/{x}` and `/a/{y}`).
    pub fn compile(self) -> Result<Routes, Error> {
        let mut trees: HashMap<Method, MatchitRouter<Endpoint>> = HashMap::new();
        let count = self.pending.len();

        for (method, raw, handler) in self.pending {
            let pattern = PathPattern::parse(&raw)?;
            let endpoint = Endpoint {
                pattern: Arc::from(pattern.as_str()),
                variables: pattern.variables().count(),
                handler,
            };
            trees
                .entry(method)
                .or_default()
                .insert(pattern.as_str(), endpoint)
                .map_err(|source| Error::RouteConflict { method, pattern: raw, source })?;
        }

        Ok(Routes { trees, count })
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

struct Endpoint {
    pattern: Arc<str>,
    variables: usize,
    handler: BoxedHandler,
}

/// The compiled, read-only route table.
///
/// Shared by reference across every connection; matching takes no locks.
pub struct Routes {
    trees: HashMap<Method, MatchitRouter<Endpoint>>,
    count: usize,
}

impl Routes {
    /// Finds the best route for `method` and `path`.
    ///
    /// `path` must not carry a query string. Returns `None` both when no
    /// pattern fits the path and when patterns fit but only under other
    /// methods.
    pub fn find(&self, method: Method, path: &str) -> Option<RouteMatch> {
        let tree = self.trees.get(&method)?;
        let matched = tree.at(path).ok()?;
        let endpoint = matched.value;

        let mut vars = PathVars::with_capacity(endpoint.variables);
        for (name, value) in matched.params.iter() {
            vars.push(name, value);
        }

        Some(RouteMatch {
            handler: Arc::clone(&endpoint.handler),
            pattern: Arc::clone(&endpoint.pattern),
            vars,
        })
    }

    /// Number of registered routes across all methods.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// The outcome of a successful lookup.
pub struct RouteMatch {
    handler: BoxedHandler,
    pattern: Arc<str>,
    vars: PathVars,
}

impl RouteMatch {
    /// The pattern the route was registered with, e.g. `/widgets/{id}`.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn vars(&self) -> &PathVars {
        &self.vars
    }

    pub(crate) fn into_parts(self) -> (BoxedHandler, Arc<str>, PathVars) {
        (self.handler, self.pattern, self.vars)
    }
}

/// Path variables bound by a match, in declaration order.
///
/// Values are the raw segment text; no percent-decoding is applied.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PathVars(Vec<(String, String)>);

impl PathVars {
    fn with_capacity(n: usize) -> Self {
        Self(Vec::with_capacity(n))
    }

    fn push(&mut self, name: &str, value: &str) {
        self.0.push((name.to_owned(), value.to_owned()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
