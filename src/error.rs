//! Unified error type.

use crate::method::Method;

/// A boxed, thread-safe error. Handlers may fail with anything convertible
/// into one of these.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by switchyard's fallible operations.
///
/// Application-level outcomes (404, 429, etc.) are expressed as
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// startup failures (bad routes, bad config, binding a port) and failures
/// while building a response body.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address: {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error("invalid route `{pattern}`: {reason}")]
    InvalidRoute { pattern: String, reason: String },

    #[error("conflicting route {method} `{pattern}`: {source}")]
    RouteConflict {
        method: Method,
        pattern: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("failed to encode `{media_type}` body: {source}")]
    Encode {
        media_type: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("failed to decode `{media_type}` body: {source}")]
    Decode {
        media_type: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("invalid header value: {0}")]
    Header(#[from] http::header::InvalidHeaderValue),

    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),

    #[error("request body: {0}")]
    Body(#[source] BoxError),

    #[error("config: {0}")]
    Config(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}
