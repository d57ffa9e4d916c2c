use crate::context::IdentContext;
use crate::ident::sessions::SessionSet;
use crate::ident::ListenerSlot;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};

#[derive(Debug, Error)]
pub enum ServerError {
    /// An earlier bind was refused for lack of privilege; start is disabled
    /// until the process restarts.
    #[error("identd is disabled after an earlier permission-denied bind")]
    PermanentlyFailed,
    #[error("invalid listen address '{0}'")]
    InvalidAddress(String),
    #[error("binding {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("identd must be started from within a tokio runtime")]
    NoRuntime,
}

/// Creates the listening socket. Tests swap this out to simulate bind
/// failures.
pub trait SocketBinder: Send + Sync {
    fn bind(&self, addr: SocketAddr) -> io::Result<std::net::TcpListener>;
}

/// Binds a real TCP socket.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpBinder;

impl SocketBinder for TcpBinder {
    fn bind(&self, addr: SocketAddr) -> io::Result<std::net::TcpListener> {
        std::net::TcpListener::bind(addr)
    }
}

/// Start/stop control used by the connection gate.
pub trait ServiceControl: Send + Sync {
    fn start(&self) -> Result<(), ServerError>;
    fn stop(&self);
    fn is_running(&self) -> bool;
}

/// Coarse lifecycle state, for status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Stopped,
    Running,
    Failed,
}

struct Running {
    generation: CancellationToken,
    local_addr: SocketAddr,
    listener: ListenerSlot,
    task: JoinHandle<()>,
}

/// The identd listener.
///
/// `state` holds the bound listener's generation while running; `running`
/// mirrors it for lock-free reads. Both change together under the state lock.
pub struct IdentServer {
    ctx: Arc<IdentContext>,
    binder: Arc<dyn SocketBinder>,
    state: Mutex<Option<Running>>,
    running: AtomicBool,
    failed: AtomicBool,
    sessions: Arc<SessionSet>,
}

impl IdentServer {
    pub fn new(ctx: Arc<IdentContext>) -> Self {
        Self::with_binder(ctx, Arc::new(TcpBinder))
    }

    pub fn with_binder(ctx: Arc<IdentContext>, binder: Arc<dyn SocketBinder>) -> Self {
        Self {
            ctx,
            binder,
            state: Mutex::new(None),
            running: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            sessions: Arc::new(SessionSet::new()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, Option<Running>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind the configured port and spawn the accept loop.
    ///
    /// No-op when already running. After a permission-denied bind every
    /// call returns [`ServerError::PermanentlyFailed`] without binding.
    pub fn start(&self) -> Result<(), ServerError> {
        let mut state = self.lock_state();
        if state.is_some() {
            return Ok(());
        }
        if self.failed.load(Ordering::Acquire) {
            return Err(ServerError::PermanentlyFailed);
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ServerError::NoRuntime);
        }

        let config = self.ctx.config.snapshot();
        let ip: IpAddr = config
            .listen
            .parse()
            .map_err(|_| ServerError::InvalidAddress(config.listen.clone()))?;
        let addr = SocketAddr::new(ip, config.port);

        let listener = match self.bind(addr) {
            Ok(listener) => listener,
            Err(source) => {
                if source.kind() == io::ErrorKind::PermissionDenied {
                    self.failed.store(true, Ordering::Release);
                    error!(addr = %addr, error = %source, "Unable to start identd server, disabled until restart");
                } else {
                    error!(addr = %addr, error = %source, "Unable to start identd server");
                }
                return Err(ServerError::Bind { addr, source });
            }
        };
        let local_addr = listener.local_addr().unwrap_or(addr);

        let listener: ListenerSlot = Arc::new(Mutex::new(Some(listener)));
        let generation = CancellationToken::new();
        let span = tracing::info_span!("identd_server", addr = %local_addr);
        let task = tokio::spawn(
            crate::ident::run_accept_loop(
                listener.clone(),
                self.ctx.clone(),
                self.sessions.clone(),
                generation.clone(),
            )
            .instrument(span),
        );

        *state = Some(Running {
            generation,
            local_addr,
            listener,
            task,
        });
        self.running.store(true, Ordering::Release);
        info!(addr = %local_addr, "Identd server listening");
        Ok(())
    }

    fn bind(&self, addr: SocketAddr) -> io::Result<TcpListener> {
        let std_listener = self.binder.bind(addr)?;
        std_listener.set_nonblocking(true)?;
        TcpListener::from_std(std_listener)
    }

    /// Stop listening and close every open session. No-op when stopped.
    ///
    /// The listening socket is closed before this returns, so an immediate
    /// `start()` can bind the same port again.
    pub fn stop(&self) {
        self.stop_inner();
    }

    /// Like [`IdentServer::stop`], but also waits for the accept task to
    /// finish.
    pub async fn shutdown(&self) {
        if let Some(task) = self.stop_inner() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Identd accept task ended abnormally");
                }
            }
        }
    }

    fn stop_inner(&self) -> Option<JoinHandle<()>> {
        let running = self.lock_state().take()?;
        self.running.store(false, Ordering::Release);
        running.generation.cancel();
        drop(
            running
                .listener
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let closed = self.sessions.close_all();
        info!(
            addr = %running.local_addr,
            closed_sessions = closed,
            "Identd server stopped"
        );
        Some(running.task)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// True once a permission-denied bind has disabled the server.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn status(&self) -> ServerStatus {
        if self.is_running() {
            ServerStatus::Running
        } else if self.has_failed() {
            ServerStatus::Failed
        } else {
            ServerStatus::Stopped
        }
    }

    /// Address actually bound, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_state().as_ref().map(|r| r.local_addr)
    }

    /// Number of ident sessions currently open.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl ServiceControl for IdentServer {
    fn start(&self) -> Result<(), ServerError> {
        IdentServer::start(self)
    }

    fn stop(&self) {
        IdentServer::stop(self)
    }

    fn is_running(&self) -> bool {
        IdentServer::is_running(self)
    }
}

impl Drop for IdentServer {
    fn drop(&mut self) {
        self.stop_inner();
    }
}
