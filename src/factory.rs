//! Typed response construction.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::Serialize;

use crate::encoding::{Charset, Encoder};
use crate::error::Error;
use crate::response::Response;

/// Builds responses whose body is encoded with the encoder and charset the
/// client negotiated.
///
/// Implemented by [`Request`](crate::Request). Every helper is a fixed-status
/// call into [`create_response`](ResponseFactory::create_response), and every
/// one of them fails with [`Error::Encode`] when the value cannot be
/// represented in the negotiated encoding.
pub trait ResponseFactory {
    /// The encoder and charset chosen for this exchange.
    fn negotiated(&self) -> (Encoder, Charset);

    /// The core builder: status, optional typed body, optional header overlay.
    ///
    /// `Content-Type` is the negotiated encoder's media type unless the
    /// overlay replaces it.
    fn create_response<T>(
        &self,
        status: StatusCode,
        body: Option<&T>,
        headers: Option<&HeaderMap>,
    ) -> Result<Response, Error>
    where
        T: Serialize + ?Sized,
    {
        let (encoder, charset) = self.negotiated();
        let bytes = match body {
            Some(value) => encoder.encode(charset, value)?,
            None => Bytes::new(),
        };
        Response::build(status, bytes, encoder.media_type(), headers)
    }

    /// A body-less response carrying the negotiated content type.
    fn empty(&self, status: StatusCode) -> Result<Response, Error> {
        self.create_response::<()>(status, None, None)
    }

    /// `200 OK` with no body and `Content-Type: text/plain`.
    fn ok_empty(&self) -> Result<Response, Error> {
        Response::build(StatusCode::OK, Bytes::new(), "text/plain", None)
    }

    fn ok<T: Serialize + ?Sized>(&self, body: &T) -> Result<Response, Error> {
        self.create_response(StatusCode::OK, Some(body), None)
    }

    fn bad_request<T: Serialize + ?Sized>(&self, body: &T) -> Result<Response, Error> {
        self.create_response(StatusCode::BAD_REQUEST, Some(body), None)
    }

    fn not_found<T: Serialize + ?Sized>(&self, body: &T) -> Result<Response, Error> {
        self.create_response(StatusCode::NOT_FOUND, Some(body), None)
    }

    fn forbidden<T: Serialize + ?Sized>(&self, body: &T) -> Result<Response, Error> {
        self.create_response(StatusCode::FORBIDDEN, Some(body), None)
    }

    fn unauthorized<T: Serialize + ?Sized>(&self, body: &T) -> Result<Response, Error> {
        self.create_response(StatusCode::UNAUTHORIZED, Some(body), None)
    }

    fn internal_server_error<T: Serialize + ?Sized>(&self, body: &T) -> Result<Response, Error> {
        self.create_response(StatusCode::INTERNAL_SERVER_ERROR, Some(body), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use http::header::{CONTENT_LENGTH, LOCATION};

    struct Fixed(Encoder, Charset);

    impl ResponseFactory for Fixed {
        fn negotiated(&self) -> (Encoder, Charset) {
            (self.0, self.1)
        }
    }

    #[derive(Serialize)]
    struct Widget<'a> {
        id: u32,
        name: &'a str,
    }

    #[test]
    fn helpers_map_to_fixed_statuses() {
        let f = Fixed(Encoder::Json, Charset::Utf8);
        let cases = [
            (f.ok("x").unwrap(), StatusCode::OK),
            (f.bad_request("x").unwrap(), StatusCode::BAD_REQUEST),
            (f.not_found("x").unwrap(), StatusCode::NOT_FOUND),
            (f.forbidden("x").unwrap(), StatusCode::FORBIDDEN),
            (f.unauthorized("x").unwrap(), StatusCode::UNAUTHORIZED),
            (f.internal_server_error("x").unwrap(), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (res, status) in cases {
            assert_eq!(res.status(), status);
            assert_eq!(res.content_type(), Some("application/json"));
            assert_eq!(res.body().map(|b| &b[..]), Some(&b"\"x\""[..]));
        }
    }

    #[test]
    fn typed_body_length_matches_encoding() {
        let f = Fixed(Encoder::Json, Charset::Utf8);
        let res = f.ok(&Widget { id: 42, name: "gear" }).unwrap();
        let expected = br#"{"id":42,"name":"gear"}"#;
        assert_eq!(res.headers()[CONTENT_LENGTH], expected.len().to_string().as_str());
        assert_eq!(res.body().map(|b| &b[..]), Some(&expected[..]));
    }

    #[test]
    fn absent_body_is_zero_length_with_negotiated_type() {
        let f = Fixed(Encoder::Text, Charset::Utf8);
        let res = f.empty(StatusCode::ACCEPTED).unwrap();
        assert!(res.body().is_none());
        assert_eq!(res.headers()[CONTENT_LENGTH], "0");
        assert_eq!(res.content_type(), Some("text/plain"));

        let res = Fixed(Encoder::Json, Charset::Utf8).ok_empty().unwrap();
        assert_eq!(res.content_type(), Some("text/plain"));
        assert_eq!(res.content_length(), 0);
    }

    #[test]
    fn overlay_is_applied() {
        let f = Fixed(Encoder::Json, Charset::Utf8);
        let mut overlay = HeaderMap::new();
        overlay.insert(LOCATION, HeaderValue::from_static("/widgets/42"));
        let res = f
            .create_response(StatusCode::CREATED, Some(&Widget { id: 42, name: "gear" }), Some(&overlay))
            .unwrap();
        assert_eq!(res.headers()[LOCATION], "/widgets/42");
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    #[test]
    fn encoding_failures_propagate() {
        let f = Fixed(Encoder::Text, Charset::Latin1);
        assert!(matches!(f.ok("☃"), Err(Error::Encode { .. })));
    }
}
