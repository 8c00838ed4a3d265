//! # Telemetry

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::endpoint::Endpoint;
use crate::message::Message;

/// Transmission statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryStats {
    /// Messages handed to the endpoint
    pub sent: u64,
    /// Messages lost to serialization or endpoint errors
    pub dropped: u64,
}

/// Serializes messages and hands them to an endpoint
pub struct Telemetry {
    endpoint: Arc<dyn Endpoint>,
    sent: AtomicU64,
    dropped: AtomicU64,
}

impl Telemetry {
    /// Send through `endpoint`
    pub fn new(endpoint: Arc<dyn Endpoint>) -> Self {
        Self {
            endpoint,
            sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Emit one message; failures are logged and counted, never returned
    pub fn emit(&self, message: &Message) {
        let bytes = match serde_json::to_vec(message) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("Telemetry: cannot serialize {}: {}", message.type_name(), err);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        match self.endpoint.send(bytes) {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                log::warn!("Telemetry: {} not sent: {}", message.type_name(), err);
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Get transmission statistics
    pub fn stats(&self) -> TelemetryStats {
        TelemetryStats {
            sent: self.sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
