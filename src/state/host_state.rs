use std::sync::Arc;
use tokio::sync::Semaphore;

/// Tracks the politeness state of one host during crawling
///
/// Page fetches to the same host share a fixed number of slots. Held permits
/// and callers waiting for one keep a reference to the slots.
#[derive(Debug, Clone)]
pub struct HostState {
    /// Concurrent fetch slots for this host
    slots: Arc<Semaphore>,

    /// Number of page fetches started against this host
    pub request_count: u32,
}

impl HostState {
    /// Creates a host state allowing `parallelism` simultaneous fetches
    pub fn new(parallelism: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(parallelism.max(1))),
            request_count: 0,
        }
    }

    /// Shared handle to the host's fetch slots
    pub fn slots(&self) -> Arc<Semaphore> {
        Arc::clone(&self.slots)
    }

    /// Number of slots not currently held
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Records that a fetch was started against this host
    pub fn record_request(&mut self) {
        self.request_count += 1;
    }

    /// True when no fetch holds or waits for one of the host's slots
    pub fn is_idle(&self) -> bool {
        Arc::strong_count(&self.slots) == 1
    }
}
