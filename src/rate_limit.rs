//! Soft rate-limit gate.
//!
//! switchyard does not decide who is rate-limited. Some other component
//! (a token bucket keyed by peer, a proxy header, an operator switch) flags
//! connections; the dispatcher only asks the question through
//! [`RateLimitGate`] before routing each request.

use crate::context::ConnectionInfo;

/// Answers whether a connection is currently soft-rate-limited.
///
/// Called once per request on the dispatch hot path, so implementations
/// should be cheap and must not block.
///
/// Any `Fn(&ConnectionInfo) -> bool` closure is a gate:
///
/// ```rust
/// use std::net::IpAddr;
/// use switchyard::{RateLimitGate, ConnectionInfo};
///
/// let banned: IpAddr = "203.0.113.9".parse().unwrap();
/// let gate = move |conn: &ConnectionInfo| conn.peer().is_some_and(|p| p.ip() == banned);
/// assert!(!gate.is_rate_limited(&ConnectionInfo::new(1, None)));
/// ```
pub trait RateLimitGate: Send + Sync {
    fn is_rate_limited(&self, conn: &ConnectionInfo) -> bool;
}

impl<F> RateLimitGate for F
where
    F: Fn(&ConnectionInfo) -> bool + Send + Sync,
{
    fn is_rate_limited(&self, conn: &ConnectionInfo) -> bool {
        self(conn)
    }
}

/// A gate that never limits. The server's default.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unlimited;

impl RateLimitGate for Unlimited {
    fn is_rate_limited(&self, _conn: &ConnectionInfo) -> bool {
        false
    }
}
