//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Every response goes through one builder, [`Response::build`], which owns
//! the header invariants:
//!
//! - `content-type` is always present.
//! - `content-length` is always present and equals the body length (`0` for
//!   an empty body).
//! - caller-supplied headers are applied last and win on collision, except
//!   `content-length`, which always reflects the body actually sent.
//!
//! Typed bodies are encoded through [`ResponseFactory`](crate::ResponseFactory),
//! which negotiates the encoder and then calls into the same builder.

use bytes::Bytes;
use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, StatusCode};
use http_body_util::Full;

use crate::error::{BoxError, Error};

/// Body of the fixed `429 Too Many Requests` response.
pub const RATE_LIMIT_BODY: &str = "This response has been rate limited by the server.";

/// An outgoing HTTP response.
///
/// A response with an empty body is kept headers-only: [`body`](Response::body)
/// returns `None` and nothing follows the header block on the wire.
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl Response {
    /// Builds a response from an already-encoded body.
    ///
    /// Fails only when `content_type` is not a valid header value.
    pub fn build(
        status: StatusCode,
        body: Bytes,
        content_type: &str,
        overlay: Option<&HeaderMap>,
    ) -> Result<Self, Error> {
        Ok(Self::assemble(status, body, HeaderValue::from_str(content_type)?, overlay))
    }

    /// A `text/plain` response from static parts. Cannot fail, which is what
    /// the dispatch pipeline relies on for its 404, 429 and 500 replies.
    pub fn plain(status: StatusCode, body: &'static str) -> Self {
        Self::assemble(
            status,
            Bytes::from_static(body.as_bytes()),
            HeaderValue::from_static("text/plain"),
            None,
        )
    }

    /// The fixed reply sent to a soft-rate-limited connection.
    pub fn rate_limited() -> Self {
        Self::plain(StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_BODY)
    }

    fn assemble(
        status: StatusCode,
        body: Bytes,
        content_type: HeaderValue,
        overlay: Option<&HeaderMap>,
    ) -> Self {
        let mut headers = HeaderMap::with_capacity(2 + overlay.map_or(0, HeaderMap::keys_len));
        headers.insert(CONTENT_TYPE, content_type);

        if let Some(overlay) = overlay {
            for name in overlay.keys() {
                if *name == CONTENT_LENGTH {
                    continue;
                }
                headers.remove(name);
                for value in overlay.get_all(name) {
                    headers.append(name.clone(), value.clone());
                }
            }
        }

        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

        let body = (!body.is_empty()).then_some(body);
        Self { status, headers, body }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The body, or `None` for a headers-only response.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn content_length(&self) -> usize {
        self.body.as_ref().map_or(0, Bytes::len)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Marks the response as the last one on its connection.
    pub(crate) fn close_connection(&mut self) {
        self.headers.insert(CONNECTION, HeaderValue::from_static("close"));
    }

    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body.unwrap_or_default()));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

/// Conversion of a handler's return value into a response or a failure.
///
/// Implemented for [`Response`], `Result<R, E>` with any error convertible
/// into a boxed error, string types (as `text/plain`) and a bare
/// [`StatusCode`] (empty body).
///
/// ```rust
/// use switchyard::{Error, Request, Response, ResponseFactory};
///
/// async fn get_widget(req: Request) -> Result<Response, Error> {
///     let id = req.variable("id").unwrap_or_default();
///     req.ok(&format!("widget {id}"))
/// }
/// ```
pub trait IntoResponse {
    fn into_response(self) -> Result<Response, Error>;
}

impl IntoResponse for Response {
    fn into_response(self) -> Result<Response, Error> { Ok(self) }
}

impl<R, E> IntoResponse for Result<R, E>
where
    R: IntoResponse,
    E: Into<BoxError>,
{
    fn into_response(self) -> Result<Response, Error> {
        self.map_err(|e| Error::Handler(e.into()))?.into_response()
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Result<Response, Error> {
        Ok(Response::plain(StatusCode::OK, self))
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Result<Response, Error> {
        Response::build(StatusCode::OK, Bytes::from(self), "text/plain", None)
    }
}

/// Return a status directly from a handler: `return StatusCode::NO_CONTENT`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Result<Response, Error> {
        Response::build(self, Bytes::new(), "text/plain", None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{CACHE_CONTROL, LOCATION};

    #[test]
    fn sets_length_and_type_for_bodies() {
        let res = Response::build(StatusCode::OK, Bytes::from_static(b"{\"a\":1}"), "application/json", None)
            .unwrap();
        assert_eq!(res.content_type(), Some("application/json"));
        assert_eq!(res.headers()[CONTENT_LENGTH], "7");
        assert_eq!(res.content_length(), 7);
        assert_eq!(res.body().map(|b| &b[..]), Some(&b"{\"a\":1}"[..]));
    }

    #[test]
    fn empty_body_is_headers_only_with_zero_length() {
        let res = Response::build(StatusCode::NO_CONTENT, Bytes::new(), "text/plain", None).unwrap();
        assert!(res.body().is_none());
        assert_eq!(res.headers()[CONTENT_LENGTH], "0");
        assert_eq!(res.content_type(), Some("text/plain"));
    }

    #[test]
    fn overlay_wins_on_collision_but_not_for_length() {
        let mut overlay = HeaderMap::new();
        overlay.insert(CONTENT_TYPE, HeaderValue::from_static("application/vnd.widget+json"));
        overlay.insert(CONTENT_LENGTH, HeaderValue::from_static("999"));
        overlay.append(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        overlay.append(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        overlay.insert(LOCATION, HeaderValue::from_static("/widgets/1"));

        let res = Response::build(StatusCode::CREATED, Bytes::from_static(b"{}"), "application/json", Some(&overlay))
            .unwrap();
        assert_eq!(res.content_type(), Some("application/vnd.widget+json"));
        assert_eq!(res.headers()[CONTENT_LENGTH], "2");
        assert_eq!(res.headers().get_all(CACHE_CONTROL).iter().count(), 2);
        assert_eq!(res.headers()[LOCATION], "/widgets/1");
    }

    #[test]
    fn invalid_content_type_is_an_error() {
        let err = Response::build(StatusCode::OK, Bytes::new(), "bad\nvalue", None).unwrap_err();
        assert!(matches!(err, Error::Header(_)));
    }

    #[test]
    fn rate_limited_reply_is_fixed() {
        let res = Response::rate_limited();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.content_type(), Some("text/plain"));
        assert_eq!(res.content_length(), RATE_LIMIT_BODY.len());
    }

    #[test]
    fn into_inner_carries_status_headers_and_body() {
        let mut res = Response::plain(StatusCode::NOT_FOUND, "Not Found");
        res.close_connection();
        let inner = res.into_inner();
        assert_eq!(inner.status(), StatusCode::NOT_FOUND);
        assert_eq!(inner.headers()[CONNECTION], "close");
        assert_eq!(inner.headers()[CONTENT_LENGTH], "9");
    }

    #[test]
    fn handler_errors_become_handler_failures() {
        let failed: Result<Response, std::io::Error> = Err(std::io::Error::other("disk gone"));
        assert!(matches!(failed.into_response(), Err(Error::Handler(_))));
        assert_eq!(StatusCode::ACCEPTED.into_response().unwrap().status(), StatusCode::ACCEPTED);
    }
}
