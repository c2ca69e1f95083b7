use std::sync::Mutex;

use tracing::{debug, info, warn};

use common::Payload;

/// Diagnostics emitted while dispatching and authenticating.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Frame without a `method`; carries the whole payload.
    Unroutable { payload: Payload },
    /// Frame with a `method` nothing handles; carries the whole payload.
    UnknownMethod { method: String, payload: Payload },
    /// An auth response reached the dispatcher with no handshake waiting.
    StaleAuthResponse { req_id: Option<String> },
    AuthExpiring,
    /// Response for a different request; the handshake keeps waiting.
    AuthResponseIgnored { req_id: Option<String> },
    AuthSucceeded,
    AuthRejected,
    AuthTimedOut,
    Execution { line: String },
}

/// Sink for observations. Injected into every component that reports, so
/// tests can inspect what would have been logged.
pub trait Reporter: Send + Sync {
    fn report(&self, observation: Observation);
}

/// Default reporter: one `tracing` event per observation.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, observation: Observation) {
        match observation {
            Observation::Unroutable { payload } => {
                warn!(payload = ?payload, "Don't know how to handle message");
            }
            Observation::UnknownMethod { method, payload } => {
                warn!(method = %method, payload = ?payload, "Unrecognized method, message dropped");
            }
            Observation::StaleAuthResponse { req_id } => {
                debug!(req_id = ?req_id, "Auth response with no handshake waiting");
            }
            Observation::AuthExpiring => info!("Auth expiring"),
            Observation::AuthResponseIgnored { req_id } => {
                debug!(req_id = ?req_id, "Ignoring auth response for another request");
            }
            Observation::AuthSucceeded => info!("Auth success"),
            Observation::AuthRejected => info!("Auth fail"),
            Observation::AuthTimedOut => warn!("Auth timeout"),
            Observation::Execution { line } => {
                info!(payload = %line, "Got new execution");
            }
        }
    }
}

/// Keeps every observation in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    observations: Mutex<Vec<Observation>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far.
    pub fn observations(&self) -> Vec<Observation> {
        self.observations
            .lock()
            .map(|obs| obs.clone())
            .unwrap_or_default()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, observation: Observation) {
        if let Ok(mut obs) = self.observations.lock() {
            obs.push(observation);
        }
    }
}
