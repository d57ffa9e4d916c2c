use crate::config::types::IdentdConfig;
use crate::config::MAX_TOKEN_LEN;
use crate::connections::ConnectionRegistry;
use crate::ident::protocol::{ErrorKind, IdentReply, PortPair};
use crate::system::{system_token, SystemInfo};
use std::sync::Arc;
use tracing::debug;

/// Decides what to report for a queried port pair.
pub struct Resolver {
    registry: Arc<ConnectionRegistry>,
    system: Arc<dyn SystemInfo>,
}

impl Resolver {
    pub fn new(registry: Arc<ConnectionRegistry>, system: Arc<dyn SystemInfo>) -> Self {
        Self { registry, system }
    }

    /// Resolve `ports` against the live connections.
    ///
    /// An unmatched port pair is always NO-USER. For a match the first
    /// applicable rule wins: hidden user, no user, custom name, nickname,
    /// connection username, then the local account name.
    pub fn resolve(&self, config: &IdentdConfig, ports: PortPair) -> IdentReply {
        let Some(connection) = self.registry.find_by_ports(ports.local, ports.remote) else {
            debug!(port = ports.local, remote_port = ports.remote, "No connection owns port");
            return IdentReply::Error(ErrorKind::NoUser);
        };

        if config.hidden_user {
            return IdentReply::Error(ErrorKind::HiddenUser);
        }
        if config.no_user {
            return IdentReply::Error(ErrorKind::NoUser);
        }

        let user = if config.use_custom_name && valid_token(&config.custom_name) {
            config.custom_name.clone()
        } else if config.use_nickname {
            connection.nickname
        } else if config.use_username {
            connection.username
        } else {
            self.system.user_name()
        };

        debug!(conn = %connection.id, port = ports.local, user = %user, "Resolved ident user");
        IdentReply::UserId {
            system: self.system_name(config),
            user,
        }
    }

    /// The system token for USERID replies.
    pub fn system_name(&self, config: &IdentdConfig) -> String {
        if config.use_custom_system && valid_token(&config.custom_system) {
            config.custom_system.clone()
        } else {
            system_token(&self.system.os_name()).to_string()
        }
    }
}

fn valid_token(s: &str) -> bool {
    !s.is_empty() && s.len() < MAX_TOKEN_LEN
}
