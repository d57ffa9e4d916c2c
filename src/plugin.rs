//! Host-facing entry point: ties connection events to the gate and server.

use crate::config::types::IdentdConfig;
use crate::connections::{ConnectionEvent, ConnectionRegistry};
use crate::context::{IdentContext, SharedConfig};
use crate::gate::ConnectionGate;
use crate::server::{IdentServer, ServerError, SocketBinder, TcpBinder};
use crate::system::SystemInfo;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

struct Subscription {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct IdentdPlugin {
    config: Arc<SharedConfig>,
    registry: Arc<ConnectionRegistry>,
    server: Arc<IdentServer>,
    gate: Arc<ConnectionGate>,
    subscription: Mutex<Option<Subscription>>,
}

impl IdentdPlugin {
    pub fn new(
        config: IdentdConfig,
        registry: Arc<ConnectionRegistry>,
        system: Arc<dyn SystemInfo>,
    ) -> Self {
        Self::with_binder(config, registry, system, Arc::new(TcpBinder))
    }

    pub fn with_binder(
        config: IdentdConfig,
        registry: Arc<ConnectionRegistry>,
        system: Arc<dyn SystemInfo>,
        binder: Arc<dyn SocketBinder>,
    ) -> Self {
        let config = Arc::new(SharedConfig::new(config));
        let ctx = Arc::new(IdentContext::new(config.clone(), registry.clone(), system));
        let server = Arc::new(IdentServer::with_binder(ctx, binder));
        let gate = Arc::new(ConnectionGate::new(server.clone(), config.clone()));
        Self {
            config,
            registry,
            server,
            gate,
            subscription: Mutex::new(None),
        }
    }

    fn lock_subscription(&self) -> MutexGuard<'_, Option<Subscription>> {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to connection events and open the port if `always_on`.
    /// Calling it again while loaded does nothing. Outside a tokio runtime
    /// the plugin stays unloaded.
    pub fn on_load(&self, events: broadcast::Receiver<ConnectionEvent>) {
        let mut subscription = self.lock_subscription();
        if subscription.is_some() {
            return;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            error!(error = %ServerError::NoRuntime, "Identd plugin not loaded");
            return;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(consume_events(
            events,
            self.registry.clone(),
            self.gate.clone(),
            cancel.clone(),
        ));
        *subscription = Some(Subscription { cancel, task });

        if self.config.snapshot().always_on {
            if let Err(e) = self.server.start() {
                error!(error = %e, "Identd always-on start failed");
            }
        }
        info!("Identd plugin loaded");
    }

    /// Unsubscribe, force the server down and forget pending attempts.
    pub fn on_unload(&self) {
        if let Some(subscription) = self.lock_subscription().take() {
            subscription.cancel.cancel();
            subscription.task.abort();
        }
        self.server.stop();
        self.gate.clear();
        info!("Identd plugin unloaded");
    }

    pub fn is_loaded(&self) -> bool {
        self.lock_subscription().is_some()
    }

    /// Apply one connection event directly, bypassing the channel.
    pub fn handle_event(&self, event: ConnectionEvent) {
        apply_event(&self.registry, &self.gate, event);
    }

    /// Swap in new settings. Toggling `always_on` opens or closes the port
    /// right away; other changes apply to the next request.
    pub fn reload(&self, config: IdentdConfig) {
        let was_always_on = self.config.snapshot().always_on;
        let now_always_on = config.always_on;
        self.config.replace(config);

        if now_always_on && !was_always_on {
            if let Err(e) = self.server.start() {
                error!(error = %e, "Identd always-on start failed after reload");
            }
        } else if !now_always_on && was_always_on && self.gate.outstanding() == 0 {
            self.server.stop();
        }
        info!(always_on = now_always_on, "Identd configuration reloaded");
    }

    pub fn server(&self) -> &Arc<IdentServer> {
        &self.server
    }

    pub fn gate(&self) -> &Arc<ConnectionGate> {
        &self.gate
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> Arc<IdentdConfig> {
        self.config.snapshot()
    }
}

impl Drop for IdentdPlugin {
    fn drop(&mut self) {
        if let Some(subscription) = self.lock_subscription().take() {
            subscription.cancel.cancel();
            subscription.task.abort();
        }
    }
}

async fn consume_events(
    mut events: broadcast::Receiver<ConnectionEvent>,
    registry: Arc<ConnectionRegistry>,
    gate: Arc<ConnectionGate>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            received = events.recv() => received,
        };
        match event {
            Ok(event) => apply_event(&registry, &gate, event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped = skipped, "Identd fell behind on connection events");
            }
            Err(RecvError::Closed) => {
                debug!("Connection event channel closed");
                break;
            }
        }
    }
}

fn apply_event(registry: &ConnectionRegistry, gate: &ConnectionGate, event: ConnectionEvent) {
    match event {
        ConnectionEvent::Connecting(info) => {
            let id = info.id;
            registry.insert(info);
            gate.attempt_started(id);
        }
        ConnectionEvent::Connected(id) => {
            gate.attempt_ended(id);
        }
        ConnectionEvent::ConnectError(id) | ConnectionEvent::Disconnected(id) => {
            registry.remove(id);
            gate.attempt_ended(id);
        }
        ConnectionEvent::NicknameChanged(id, nickname) => {
            if !registry.set_nickname(id, &nickname) {
                debug!(conn = %id, "Nickname change for unknown connection");
            }
        }
    }
}
