use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct LiveSession {
    conn_id: String,
    peer: SocketAddr,
    started_at: Instant,
    cancel: CancellationToken,
}

/// Handle returned by [`SessionSet::register`]; the session task passes it
/// back to [`SessionSet::remove`] when it finishes.
#[derive(Debug, Clone)]
pub struct SessionTicket {
    pub session_id: u64,
    pub cancel: CancellationToken,
}

/// Sessions accepted by the listener and not yet closed.
///
/// One mutex guards the map; every insert, removal and the bulk close in
/// [`SessionSet::close_all`] happen under it.
#[derive(Default)]
pub struct SessionSet {
    sessions: Mutex<HashMap<u64, LiveSession>>,
    next_id: AtomicU64,
}

impl SessionSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, LiveSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a new session owned by the listener generation `generation`.
    ///
    /// Returns `None` once `generation` has been cancelled, so a socket
    /// accepted while `stop()` runs is never added after the bulk close.
    pub fn register(
        &self,
        generation: &CancellationToken,
        peer: SocketAddr,
        conn_id: &str,
    ) -> Option<SessionTicket> {
        let mut sessions = self.lock();
        if generation.is_cancelled() {
            return None;
        }
        let session_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = generation.child_token();
        sessions.insert(
            session_id,
            LiveSession {
                conn_id: conn_id.to_string(),
                peer,
                started_at: Instant::now(),
                cancel: cancel.clone(),
            },
        );
        Some(SessionTicket { session_id, cancel })
    }

    /// Forget a finished session. No-op if `close_all` already removed it.
    pub fn remove(&self, session_id: u64) -> bool {
        self.lock().remove(&session_id).is_some()
    }

    /// Close every tracked session and empty the set. Returns how many
    /// sessions were closed.
    pub fn close_all(&self) -> usize {
        let mut sessions = self.lock();
        let count = sessions.len();
        for (_, session) in sessions.drain() {
            debug!(
                conn_id = %session.conn_id,
                peer = %session.peer,
                age_ms = session.started_at.elapsed().as_millis() as u64,
                "Closing ident session"
            );
            session.cancel.cancel();
        }
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
