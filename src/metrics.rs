//! Request and outcome counters.
//!
//! A [`Metrics`] collector is created by the application (or by the server
//! from its config) and injected into the [`ConnectionContext`](crate::ConnectionContext).
//! The set of tracked status codes is fixed at construction, so the map is
//! never mutated afterwards and every update is a single relaxed atomic add.
//! Responses with an untracked status are simply not counted.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use http::StatusCode;
use serde::Serialize;

/// Status codes tracked when no explicit list is configured.
pub const DEFAULT_TRACKED_STATUSES: [StatusCode; 9] = [
    StatusCode::OK,
    StatusCode::CREATED,
    StatusCode::NO_CONTENT,
    StatusCode::BAD_REQUEST,
    StatusCode::UNAUTHORIZED,
    StatusCode::FORBIDDEN,
    StatusCode::NOT_FOUND,
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
];

#[derive(Debug)]
pub struct Metrics {
    requests: AtomicU64,
    outcomes: HashMap<StatusCode, AtomicU64>,
}

impl Metrics {
    pub fn new(tracked: impl IntoIterator<Item = StatusCode>) -> Self {
        Self {
            requests: AtomicU64::new(0),
            outcomes: tracked.into_iter().map(|s| (s, AtomicU64::new(0))).collect(),
        }
    }

    /// Counts one inbound request.
    pub fn mark_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one response with `status`. Returns `false` when the status is
    /// not tracked.
    pub fn mark_status(&self, status: StatusCode) -> bool {
        match self.outcomes.get(&status) {
            Some(counter) => {
                counter.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// `None` when `status` is not tracked.
    pub fn status_count(&self, status: StatusCode) -> Option<u64> {
        self.outcomes.get(&status).map(|c| c.load(Ordering::Relaxed))
    }

    pub fn is_tracked(&self, status: StatusCode) -> bool {
        self.outcomes.contains_key(&status)
    }

    /// A point-in-time copy of every counter, for exporters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.request_count(),
            responses: self
                .outcomes
                .iter()
                .map(|(status, count)| (status.as_u16(), count.load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new(DEFAULT_TRACKED_STATUSES)
    }
}

/// Serializable counter values, keyed by numeric status code.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub responses: BTreeMap<u16, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn untracked_statuses_are_ignored() {
        let m = Metrics::new([StatusCode::OK]);
        assert!(m.mark_status(StatusCode::OK));
        assert!(!m.mark_status(StatusCode::IM_A_TEAPOT));
        assert_eq!(m.status_count(StatusCode::OK), Some(1));
        assert_eq!(m.status_count(StatusCode::IM_A_TEAPOT), None);
    }

    #[test]
    fn default_tracks_the_common_outcomes() {
        let m = Metrics::default();
        for status in DEFAULT_TRACKED_STATUSES {
            assert!(m.is_tracked(status), "{status}");
        }
        assert!(!m.is_tracked(StatusCode::IM_A_TEAPOT));
        assert!(!m.is_tracked(StatusCode::PAYLOAD_TOO_LARGE));
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let m = Arc::new(Metrics::default());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&m);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        m.mark_request();
                        m.mark_status(StatusCode::NOT_FOUND);
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(m.request_count(), 8_000);
        assert_eq!(m.status_count(StatusCode::NOT_FOUND), Some(8_000));
    }

    #[test]
    fn snapshot_serializes_by_numeric_code() {
        let m = Metrics::new([StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]);
        m.mark_request();
        m.mark_status(StatusCode::TOO_MANY_REQUESTS);
        let json = serde_json::to_string(&m.snapshot()).unwrap();
        assert_eq!(json, r#"{"requests":1,"responses":{"200":0,"429":1}}"#);
    }
}
