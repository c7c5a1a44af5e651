//! State shared by every request on a listener.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::encoding::Encoders;
use crate::metrics::Metrics;
use crate::router::Routes;

/// The compiled route table, the encoder registry and the metrics collector.
///
/// Built once when the server starts and shared through an `Arc` by all
/// connections. Only the metrics counters change after construction.
pub struct ConnectionContext {
    routes: Routes,
    encoders: Encoders,
    metrics: Arc<Metrics>,
}

impl ConnectionContext {
    pub fn new(routes: Routes, encoders: Encoders, metrics: Arc<Metrics>) -> Self {
        Self { routes, encoders, metrics }
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    pub fn encoders(&self) -> &Encoders {
        &self.encoders
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

/// Identity of the transport connection a request arrived on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConnectionInfo {
    id: u64,
    peer: Option<SocketAddr>,
}

impl ConnectionInfo {
    pub fn new(id: u64, peer: Option<SocketAddr>) -> Self {
        Self { id, peer }
    }

    /// Unique per accepted connection for the lifetime of a server.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }
}
