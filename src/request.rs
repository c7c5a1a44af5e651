//! Incoming request type handed to handlers.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{ACCEPT, ACCEPT_CHARSET, CONTENT_TYPE};
use http::{HeaderMap, Uri};
use serde::de::DeserializeOwned;

use crate::context::{ConnectionContext, ConnectionInfo};
use crate::encoding::{Charset, Encoder};
use crate::error::Error;
use crate::factory::ResponseFactory;
use crate::router::PathVars;

/// A fully assembled inbound request plus everything the dispatcher learned
/// about it: the matched pattern, its path variables and the connection it
/// arrived on.
pub struct Request {
    method: http::Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    pattern: Arc<str>,
    vars: PathVars,
    context: Arc<ConnectionContext>,
    connection: ConnectionInfo,
}

impl Request {
    pub(crate) fn new(
        req: http::Request<Bytes>,
        pattern: Arc<str>,
        vars: PathVars,
        context: Arc<ConnectionContext>,
        connection: ConnectionInfo,
    ) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            pattern,
            vars,
            context,
            connection,
        }
    }

    pub fn method(&self) -> &http::Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn query(&self) -> Option<&str> { self.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// The pattern of the route that matched, e.g. `/widgets/{id}`.
    pub fn route(&self) -> &str { &self.pattern }

    pub fn connection(&self) -> &ConnectionInfo { &self.connection }
    pub fn connection_context(&self) -> &ConnectionContext { &self.context }

    /// Header lookup. Values that are not visible ASCII are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path variable.
    ///
    /// For a route `/widgets/{id}`, `req.variable("id")` on `/widgets/42` returns `Some("42")`.
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.vars.get(name)
    }

    pub fn variables(&self) -> &PathVars {
        &self.vars
    }

    pub fn accept_header(&self) -> Option<&str> {
        self.headers.get(ACCEPT).and_then(|v| v.to_str().ok())
    }

    pub fn accept_charset_header(&self) -> Option<&str> {
        self.headers.get(ACCEPT_CHARSET).and_then(|v| v.to_str().ok())
    }

    /// The body as UTF-8 text, with invalid sequences replaced.
    pub fn body_as_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body with the encoder matching its `Content-Type`, or the
    /// default encoder when the type is missing or not registered.
    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let content_type = self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        self.context
            .encoders()
            .for_content_type(content_type)
            .decode(&self.body)
    }
}

impl ResponseFactory for Request {
    fn negotiated(&self) -> (Encoder, Charset) {
        let encoder = self.context.encoders().accepted_encoder(self.accept_header());
        let charset = Charset::negotiate(self.accept_charset_header());
        (encoder, charset)
    }
}
