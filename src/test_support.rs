//! Shared mocks for handler and listener tests.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::access_log::AccessLog;
use crate::upstream::{ConnectError, Connector};

/// In-memory access-log sink.
#[derive(Clone, Default)]
pub struct CapturedLog {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn access_log(&self) -> AccessLog {
        AccessLog::new(self.clone())
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.buf.lock())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for CapturedLog {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Connector that records requested hosts and sends every connection to a
/// local mock origin. Hosts listed in `unknown` fail resolution.
#[derive(Clone)]
pub struct MockConnector {
    origin: SocketAddr,
    unknown: Vec<String>,
    connects: Arc<Mutex<Vec<(String, u16)>>>,
}

impl MockConnector {
    pub fn new(origin: SocketAddr) -> Self {
        Self {
            origin,
            unknown: Vec::new(),
            connects: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_unknown_host(mut self, host: &str) -> Self {
        self.unknown.push(host.to_string());
        self
    }

    pub fn connects(&self) -> Vec<(String, u16)> {
        self.connects.lock().clone()
    }
}

impl Connector for MockConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> Result<TcpStream, ConnectError> {
        self.connects.lock().push((host.to_string(), port));

        if host.is_empty() || self.unknown.iter().any(|h| h == host) {
            return Err(ConnectError::UnknownHost(host.to_string()));
        }

        TcpStream::connect(self.origin)
            .await
            .map_err(|source| ConnectError::ConnectFailed {
                addr: self.origin.to_string(),
                source,
            })
    }
}

/// Origin server that answers every connection with `response` and closes.
/// Request bytes are collected per connection, up to the end of the headers.
pub struct MockOrigin {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockOrigin {
    pub async fn start(response: Vec<u8>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let response = Arc::new(response);

        let seen = requests.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let seen = seen.clone();
                let response = response.clone();
                tokio::spawn(async move {
                    let request = read_headers(&mut socket).await;
                    seen.lock().push(request);
                    let _ = socket.write_all(&response).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.requests.lock().clone()
    }
}

async fn read_headers(socket: &mut TcpStream) -> Vec<u8> {
    let mut received = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => received.extend_from_slice(&buf[..n]),
        }
        if received.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    received
}
