//! `buildvault-observability`: log setup and the request counter.

/// Install the JSON log subscriber for the process. Repeated calls are no-ops.
pub fn init() {
    tracing::init();
}

pub mod tracing;

pub mod metrics;

pub use metrics::{RequestCounter, RequestCounterSnapshot};
