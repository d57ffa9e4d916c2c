//! The host application's outbound connections, as seen by identd.

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque id the host assigns to one outbound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One outbound IRC connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    /// Ephemeral port the OS assigned to our side of the socket.
    pub local_port: u16,
    /// Port on the IRC server, when known.
    pub remote_port: Option<u16>,
    pub nickname: String,
    pub username: String,
}

impl ConnectionInfo {
    pub fn new(
        id: ConnectionId,
        local_port: u16,
        nickname: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            id,
            local_port,
            remote_port: None,
            nickname: nickname.into(),
            username: username.into(),
        }
    }

    pub fn with_remote_port(mut self, port: u16) -> Self {
        self.remote_port = Some(port);
        self
    }

    /// Whether this connection owns the queried port pair. The remote port
    /// only has to match when we know it.
    pub fn matches(&self, local: u16, remote: u16) -> bool {
        self.local_port == local && self.remote_port.map_or(true, |p| p == remote)
    }
}

/// Connection lifecycle notifications from the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// An outbound attempt began.
    Connecting(ConnectionInfo),
    /// The attempt succeeded; the connection stays live.
    Connected(ConnectionId),
    /// The attempt failed.
    ConnectError(ConnectionId),
    /// A live connection closed.
    Disconnected(ConnectionId),
    NicknameChanged(ConnectionId, String),
}

/// Live connections the resolver can match ident queries against.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionInfo>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id not yet handed out by this registry.
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Insert or replace a connection.
    pub fn insert(&self, info: ConnectionInfo) {
        self.connections.insert(info.id, info);
    }

    pub fn remove(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.connections.remove(&id).map(|(_, info)| info)
    }

    /// Returns false when the connection is unknown.
    pub fn set_nickname(&self, id: ConnectionId, nickname: &str) -> bool {
        match self.connections.get_mut(&id) {
            Some(mut entry) => {
                entry.nickname = nickname.to_string();
                true
            }
            None => false,
        }
    }

    /// First connection owning the port pair. Ties are broken by lowest id
    /// so the answer does not depend on map iteration order.
    pub fn find_by_ports(&self, local: u16, remote: u16) -> Option<ConnectionInfo> {
        self.connections
            .iter()
            .filter(|entry| entry.matches(local, remote))
            .min_by_key(|entry| entry.id)
            .map(|entry| entry.value().clone())
    }

    pub fn get(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.connections.get(&id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn clear(&self) {
        self.connections.clear();
    }
}
