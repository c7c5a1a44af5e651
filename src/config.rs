//! Server configuration.
//!
//! Every field has a default, so an empty document is a valid config:
//!
//! ```toml
//! bind = "0.0.0.0:8080"
//! connection = "keep-alive"        # or "close" (default)
//! max_body_bytes = 1048576
//! tracked_status_codes = [200, 404, 429, 500]
//! ```

use std::net::SocketAddr;
use std::path::Path;

use http::StatusCode;
use serde::Deserialize;

use crate::dispatch::ConnectionPolicy;
use crate::error::Error;
use crate::metrics::DEFAULT_TRACKED_STATUSES;

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub connection: ConnectionPolicy,
    /// Requests with larger bodies are answered with `413` by the transport.
    pub max_body_bytes: usize,
    /// Status codes that get an outcome counter.
    pub tracked_status_codes: Vec<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            connection: ConnectionPolicy::Close,
            max_body_bytes: 1024 * 1024,
            tracked_status_codes: DEFAULT_TRACKED_STATUSES.iter().map(StatusCode::as_u16).collect(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(s)?;
        config.tracked_statuses()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// The tracked codes as [`StatusCode`]s. Fails on codes outside 100..=999.
    pub fn tracked_statuses(&self) -> Result<Vec<StatusCode>, Error> {
        self.tracked_status_codes
            .iter()
            .map(|&code| {
                StatusCode::from_u16(code)
                    .map_err(|e| Error::Config(format!("tracked status code {code}: {e}")))
            })
            .collect()
    }
}
