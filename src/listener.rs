use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::MIN_BACKLOG;
use crate::handler::{handle_connection, HandlerContext, Outcome};
use crate::upstream::Connector;

/// Pause after a failed accept so fd exhaustion does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Binds `addr` with `SO_REUSEADDR` and the given backlog.
pub fn bind(addr: SocketAddr, backlog: i32) -> anyhow::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;

    match socket.bind(&addr.into()) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AddrInUse => {
            return Err(e).with_context(|| {
                format!("Port {} already in use, run with a different --port", addr.port())
            });
        }
        Err(e) => return Err(e).with_context(|| format!("Bind failed on {}", addr)),
    }

    socket
        .listen(backlog.max(MIN_BACKLOG))
        .with_context(|| format!("Listen failed on {}", addr))?;

    let listener = TcpListener::from_std(socket.into())?;
    Ok(listener)
}

/// Accept loop. Each connection gets its own supervised task; the loop never
/// waits on one and never returns on its own.
pub async fn serve<C: Connector>(listener: TcpListener, ctx: Arc<HandlerContext<C>>) -> anyhow::Result<()> {
    loop {
        let (client_stream, client_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Accept failed: {}", e);
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                continue;
            }
        };

        let _ = client_stream.set_nodelay(true);
        let ctx = ctx.clone();

        spawn_supervised(client_addr, async move {
            handle_connection(client_stream, client_addr, &ctx).await
        });
    }
}

/// Runs `handler` on its own task. A panic inside it is caught here and
/// logged; the connection's streams are released by the unwind.
pub fn spawn_supervised<F>(client_addr: SocketAddr, handler: F) -> JoinHandle<()>
where
    F: Future<Output = Outcome> + Send + 'static,
{
    let task = tokio::spawn(handler);

    tokio::spawn(async move {
        match task.await {
            Ok(outcome) => debug!("Connection {} closed: {:?}", client_addr, outcome),
            Err(e) if e.is_panic() => warn!("Handler for {} panicked, connection closed", client_addr),
            Err(e) => debug!("Handler for {} cancelled: {}", client_addr, e),
        }
    })
}
