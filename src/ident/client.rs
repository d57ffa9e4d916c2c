use crate::ident::protocol::{PortPair, CRLF};
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Longest reply we are willing to read back.
const MAX_REPLY_LEN: u64 = 1024;

/// Ask the identd at `addr` about `ports` and return its reply line
/// without the terminator.
pub async fn query(addr: &str, ports: PortPair, timeout: Duration) -> Result<String> {
    tokio::time::timeout(timeout, query_inner(addr, ports))
        .await
        .with_context(|| format!("ident query to {} timed out", addr))?
}

async fn query_inner(addr: &str, ports: PortPair) -> Result<String> {
    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connecting to {}", addr))?;
    let request = format!("{},{}{}", ports.local, ports.remote, CRLF);
    stream.write_all(request.as_bytes()).await?;

    let mut buf = Vec::new();
    (&mut stream).take(MAX_REPLY_LEN).read_to_end(&mut buf).await?;
    if buf.is_empty() {
        anyhow::bail!("{} closed the connection without a reply", addr);
    }
    let reply = String::from_utf8_lossy(&buf);
    Ok(reply.trim_end_matches(&['\r', '\n'][..]).to_string())
}
