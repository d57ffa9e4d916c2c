use crate::context::IdentContext;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

/// Handle a single ident connection: one request line, one reply, close.
///
/// Returns early without a reply when `cancel` fires (server stop).
pub async fn handle_connection(
    mut stream: TcpStream,
    ctx: Arc<IdentContext>,
    cancel: CancellationToken,
    conn_id: &str,
) -> Result<()> {
    let peer_addr = stream.peer_addr()?;
    let span = info_span!("ident", conn_id = %conn_id, peer = %peer_addr.ip());
    async {
        debug!(conn_id = %conn_id, peer = %peer_addr, "New ident connection");

        let outcome = tokio::select! {
            result = exchange(&mut stream, &ctx) => result,
            _ = cancel.cancelled() => {
                debug!(conn_id = %conn_id, "Ident connection closed by server stop");
                return Ok(());
            }
        };

        match outcome {
            Ok(Some(reply)) if is_userid_reply(&reply) => {
                debug!(conn_id = %conn_id, reply = %reply.trim_end(), "Ident reply sent");
            }
            Ok(Some(reply)) => {
                debug!(conn_id = %conn_id, reply = %reply.trim_end(), "Ident error reply sent");
            }
            Ok(None) => {
                debug!(conn_id = %conn_id, "Ident connection closed without a request");
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
    .instrument(span)
    .await
}

/// Read one request from `stream`, write the reply and shut the write side
/// down. Returns the reply, or `None` when the peer sent nothing or the
/// request timed out.
pub async fn exchange<S>(stream: &mut S, ctx: &IdentContext) -> Result<Option<String>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let config = ctx.config.snapshot();

    let line = if config.request_timeout_secs > 0 {
        let limit = Duration::from_secs(config.request_timeout_secs);
        match tokio::time::timeout(limit, read_request(&mut *stream, config.max_request_len)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout_secs = config.request_timeout_secs, "Ident request timeout");
                return Ok(None);
            }
        }
    } else {
        read_request(&mut *stream, config.max_request_len).await?
    };

    let Some(line) = line else {
        return Ok(None);
    };

    let reply = ctx.respond(&line);
    stream.write_all(reply.as_bytes()).await?;
    stream.flush().await?;
    let _ = stream.shutdown().await;
    Ok(Some(reply))
}

fn is_userid_reply(reply: &str) -> bool {
    reply.contains(" : USERID : ")
}

/// Read a single newline-terminated request of at most `max_len` bytes
/// before the newline.
///
/// A final line cut off by EOF is still returned; EOF before any byte
/// yields `None`.
pub async fn read_request<R>(stream: &mut R, max_len: usize) -> Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    // One spare byte tells a full-length request apart from an over-long one.
    let mut reader = BufReader::new(stream).take(max_len as u64 + 1);
    let mut buf = Vec::with_capacity(64);
    let n = reader.read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() != Some(&b'\n') && n > max_len {
        anyhow::bail!("ident request exceeds {} bytes", max_len);
    }

    let line = String::from_utf8_lossy(&buf);
    Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
}
