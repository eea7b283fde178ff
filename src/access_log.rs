use std::fmt;
use std::io::Write;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Blocked,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allowed => write!(f, "ALLOWED"),
            Decision::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// One policy decision, rendered as
/// `[YYYY-MM-DD HH:MM:SS] [client-ip] [DECISION] <url>`.
#[derive(Debug, Clone)]
pub struct LogRecord<'a> {
    pub timestamp: DateTime<Local>,
    pub client: IpAddr,
    pub decision: Decision,
    pub url: &'a str,
}

impl fmt::Display for LogRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.client,
            self.decision,
            self.url
        )
    }
}

/// Append-only access log shared by every handler.
#[derive(Clone)]
pub struct AccessLog {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl AccessLog {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    pub fn record(&self, client: IpAddr, decision: Decision, url: &str) {
        let record = LogRecord {
            timestamp: Local::now(),
            client,
            decision,
            url,
        };
        // Formatted up front so the line goes out in a single write.
        let line = format!("{}\n", record);

        let mut sink = self.sink.lock();
        if let Err(e) = sink.write_all(line.as_bytes()).and_then(|_| sink.flush()) {
            tracing::warn!("Access log write failed: {}", e);
        }
    }
}
