use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const DEFAULT_UPSTREAM_PORT: u16 = 80;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("unknown host {0:?}")]
    UnknownHost(String),

    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// Opens the upstream side of a proxied request.
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<Self::Stream, ConnectError>> + Send;
}

/// Plain TCP connector using the platform resolver.
///
/// One resolution and one connect attempt against the first resolved address;
/// there are no retries.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    connect_timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        Self { connect_timeout }
    }

    async fn resolve(host: &str, port: u16) -> Result<SocketAddr, ConnectError> {
        if host.is_empty() {
            return Err(ConnectError::UnknownHost(String::new()));
        }

        let mut addrs = tokio::net::lookup_host((host, port)).await.map_err(|e| {
            tracing::debug!("Resolve failed for {}: {}", host, e);
            ConnectError::UnknownHost(host.to_string())
        })?;

        addrs
            .next()
            .ok_or_else(|| ConnectError::UnknownHost(host.to_string()))
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> Result<TcpStream, ConnectError> {
        let addr = Self::resolve(host, port).await?;

        let failed = |source: io::Error| ConnectError::ConnectFailed {
            addr: format!("{}:{}", host, port),
            source,
        };

        let stream = match self.connect_timeout {
            Some(timeout_duration) => match timeout(timeout_duration, TcpStream::connect(addr)).await {
                Ok(result) => result.map_err(failed)?,
                Err(_) => {
                    return Err(failed(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "upstream connect timed out",
                    )))
                }
            },
            None => TcpStream::connect(addr).await.map_err(failed)?,
        };

        let _ = stream.set_nodelay(true);

        Ok(stream)
    }
}
