//! Application state shared across handlers.

use urlmeta_core::Collector;

use crate::queue::CollectionQueue;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Record lifecycle manager (fetcher plus store).
    pub collector: Collector,
    /// Handoff to the deferred collection workers.
    pub queue: CollectionQueue,
}

impl AppState {
    pub fn new(collector: Collector, queue: CollectionQueue) -> Self {
        Self { collector, queue }
    }
}
