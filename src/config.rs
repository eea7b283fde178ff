use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8888;
pub const MIN_BACKLOG: i32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid listen address {0}")]
    Address(String),
}

/// Values read from the `KEY=value` config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub port: Option<u16>,
}

impl FileConfig {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No config file at {:?}, using defaults", path);
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Only lines of the exact form `PORT=<integer>` are understood.
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let Some(value) = line.strip_prefix("PORT=") else {
                continue;
            };

            match value.parse::<u16>() {
                Ok(port) => config.port = Some(port),
                Err(_) => tracing::warn!("Ignoring invalid port in config: {:?}", value),
            }
        }

        config
    }
}

/// Immutable runtime settings, built once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub listen: SocketAddr,
    pub backlog: i32,
    pub blacklist: PathBuf,
    pub upstream_port: u16,
    pub connect_timeout: Option<Duration>,
    pub reply_on_error: bool,
}

impl Settings {
    /// The port comes from `cli_port`, then the config file, then
    /// [`DEFAULT_PORT`].
    pub fn resolve_port(cli_port: Option<u16>, file: &FileConfig) -> u16 {
        cli_port.or(file.port).unwrap_or(DEFAULT_PORT)
    }

    pub fn listen_addr(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", host, port);
        addr.parse().map_err(|_| ConfigError::Address(addr))
    }
}
