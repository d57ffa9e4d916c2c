//! Reference counting of pending outbound connection attempts.
//!
//! The ident port only needs to be open while a server we are connecting
//! to might query it. The gate starts the service when the first attempt
//! begins and stops it when the last one ends, unless `always_on` is set.

use crate::connections::ConnectionId;
use crate::context::SharedConfig;
use crate::server::ServiceControl;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

pub struct ConnectionGate {
    pending: Mutex<HashSet<ConnectionId>>,
    service: Arc<dyn ServiceControl>,
    config: Arc<SharedConfig>,
}

impl ConnectionGate {
    pub fn new(service: Arc<dyn ServiceControl>, config: Arc<SharedConfig>) -> Self {
        Self {
            pending: Mutex::new(HashSet::new()),
            service,
            config,
        }
    }

    // The pending lock stays held across start/stop so service transitions
    // happen in the same order as the count transitions.
    fn lock(&self) -> MutexGuard<'_, HashSet<ConnectionId>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a new attempt. Starts the service on the 0 → 1 transition.
    /// Returns false if `id` was already tracked.
    pub fn attempt_started(&self, id: ConnectionId) -> bool {
        let mut pending = self.lock();
        let was_empty = pending.is_empty();
        if !pending.insert(id) {
            return false;
        }
        debug!(conn = %id, outstanding = pending.len(), "Connection attempt started");

        if was_empty && !self.config.snapshot().always_on {
            if let Err(e) = self.service.start() {
                warn!(error = %e, "Identd not started for connection attempt");
            }
        }
        true
    }

    /// Forget an attempt. Stops the service when the last one ends.
    /// Returns false if `id` was not tracked.
    pub fn attempt_ended(&self, id: ConnectionId) -> bool {
        let mut pending = self.lock();
        if !pending.remove(&id) {
            return false;
        }
        debug!(conn = %id, outstanding = pending.len(), "Connection attempt ended");

        if pending.is_empty() && !self.config.snapshot().always_on {
            self.service.stop();
        }
        true
    }

    /// Number of attempts still pending.
    pub fn outstanding(&self) -> usize {
        self.lock().len()
    }

    /// Drop every tracked attempt without touching the service.
    pub fn clear(&self) {
        self.lock().clear();
    }
}
