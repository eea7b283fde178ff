use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::access_log::{AccessLog, Decision};
use crate::policy::PolicyStore;
use crate::relay::forward_and_relay;
use crate::request::ParsedRequest;
use crate::upstream::Connector;

pub const REQUEST_BUFFER_SIZE: usize = 4096;

// ============================================================================
// STATIC RESPONSES
// ============================================================================

pub const RESPONSE_403: &[u8] = b"HTTP/1.1 403 Forbidden\r\n\r\nACCESS DENIED";
pub const RESPONSE_502: &[u8] = b"HTTP/1.1 502 Bad Gateway\r\n\r\n";

/// Everything a handler needs besides its own client stream.
pub struct HandlerContext<C> {
    pub policy: Arc<PolicyStore>,
    pub access_log: AccessLog,
    pub connector: C,
    pub upstream_port: u16,
    /// Answer failed upstream connects with a 502 instead of a silent close.
    pub reply_on_error: bool,
}

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Client sent nothing, or the first read failed.
    Disconnected,
    Blocked,
    ConnectFailed,
    Relayed(u64),
    RelayAborted,
}

// ============================================================================
// CONNECTION HANDLER
// ============================================================================

/// Serves exactly one request on `client`.
///
/// The client stream and any upstream stream are owned here and dropped on
/// return, whichever path is taken.
pub async fn handle_connection<S, C>(
    mut client: S,
    client_addr: SocketAddr,
    ctx: &HandlerContext<C>,
) -> Outcome
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: Connector,
{
    let mut buf = vec![0u8; REQUEST_BUFFER_SIZE];

    let n = match client.read(&mut buf).await {
        Ok(0) => {
            debug!("Client {} disconnected before sending a request", client_addr);
            return Outcome::Disconnected;
        }
        Ok(n) => n,
        Err(e) => {
            debug!("Read error from {}: {}", client_addr, e);
            return Outcome::Disconnected;
        }
    };
    buf.truncate(n);

    let request = ParsedRequest::from_raw(buf);
    debug!(
        "Request from {}: method={:?} url={:?} version={:?}",
        client_addr, request.line.method, request.line.target, request.line.version
    );

    let target = request.target();

    if ctx.policy.is_forbidden(target) {
        if let Err(e) = client.write_all(RESPONSE_403).await {
            debug!("Failed to send 403 to {}: {}", client_addr, e);
        }
        let _ = client.shutdown().await;
        ctx.access_log.record(client_addr.ip(), Decision::Blocked, target);
        return Outcome::Blocked;
    }

    ctx.access_log.record(client_addr.ip(), Decision::Allowed, target);

    let host = request.host();
    let mut upstream = match ctx.connector.connect(host, ctx.upstream_port).await {
        Ok(upstream) => upstream,
        Err(e) => {
            warn!("Upstream for {} unavailable: {}", target, e);
            if ctx.reply_on_error {
                let _ = client.write_all(RESPONSE_502).await;
                let _ = client.shutdown().await;
            }
            return Outcome::ConnectFailed;
        }
    };

    match forward_and_relay(&mut client, &mut upstream, request.raw()).await {
        Ok(bytes) => {
            debug!("Relayed {} bytes from {} to {}", bytes, host, client_addr);
            let _ = client.shutdown().await;
            Outcome::Relayed(bytes)
        }
        Err(e) => {
            debug!("Relay {} -> {} aborted: {}", host, client_addr, e);
            Outcome::RelayAborted
        }
    }
}
