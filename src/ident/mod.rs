pub mod client;
pub mod handler;
pub mod protocol;
pub mod resolver;
pub mod sessions;

use crate::context::IdentContext;
use crate::utils::generate_correlation_id;
use sessions::SessionSet;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::Poll;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Listener shared between the server and its accept task. The server
/// empties the slot on stop, which closes the socket right away.
pub type ListenerSlot = Arc<Mutex<Option<TcpListener>>>;

/// Accept ident connections until `generation` is cancelled or the
/// listener is taken out of `listener`.
///
/// Each accepted socket gets its own task and an entry in `sessions`.
pub async fn run_accept_loop(
    listener: ListenerSlot,
    ctx: Arc<IdentContext>,
    sessions: Arc<SessionSet>,
    generation: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            result = accept_from(&listener) => result,
            _ = generation.cancelled() => {
                info!("Ident listener shutting down");
                break;
            }
        };
        let (stream, peer) = match accepted {
            Some(Ok(accepted)) => accepted,
            Some(Err(e)) => {
                error!(error = %e, "Ident accept error");
                continue;
            }
            None => {
                info!("Ident listener closed");
                break;
            }
        };

        let conn_id = generate_correlation_id();
        let Some(ticket) = sessions.register(&generation, peer, &conn_id) else {
            debug!(conn_id = %conn_id, peer = %peer, "Dropping connection accepted during stop");
            drop(stream);
            continue;
        };

        let ctx = ctx.clone();
        let sessions = sessions.clone();
        tokio::spawn(async move {
            if let Err(e) =
                handler::handle_connection(stream, ctx, ticket.cancel.clone(), &conn_id).await
            {
                error!(conn_id = %conn_id, error = %e, "Ident connection error");
            }
            sessions.remove(ticket.session_id);
        });
    }
}

/// Accept from the listener in `slot`; `None` once the slot is empty.
/// The lock is only held inside a single poll.
async fn accept_from(
    slot: &Mutex<Option<TcpListener>>,
) -> Option<io::Result<(TcpStream, SocketAddr)>> {
    std::future::poll_fn(|cx| {
        let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(listener) => listener.poll_accept(cx).map(Some),
            None => Poll::Ready(None),
        }
    })
    .await
}
