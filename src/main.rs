#![warn(clippy::all)]

mod access_log;
mod config;
mod handler;
mod listener;
mod policy;
mod relay;
mod request;
mod upstream;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::access_log::AccessLog;
use crate::config::{FileConfig, Settings};
use crate::handler::HandlerContext;
use crate::policy::PolicyStore;
use crate::upstream::{TcpConnector, DEFAULT_UPSTREAM_PORT};

// ============================================================================
// CLI ARGUMENTS
// ============================================================================

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Overrides PORT= from the config file.
    #[arg(long)]
    port: Option<u16>,

    #[arg(long, default_value = "proxy.conf")]
    config: PathBuf,

    #[arg(long, default_value = "blacklist.txt")]
    blacklist: PathBuf,

    #[arg(long, default_value_t = 128)]
    backlog: i32,

    #[arg(long, default_value_t = DEFAULT_UPSTREAM_PORT)]
    upstream_port: u16,

    /// Seconds; 0 waits on the upstream connect indefinitely.
    #[arg(long, default_value_t = 0)]
    timeout_connect: u64,

    /// Answer unreachable upstreams with 502 instead of closing silently.
    #[arg(long)]
    reply_on_error: bool,

    #[arg(long, short = 'q')]
    quiet: bool,

    #[arg(long, short = 'v')]
    verbose: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn settings(&self) -> anyhow::Result<Settings> {
        let file = FileConfig::load(&self.config)?;
        let port = Settings::resolve_port(self.port, &file);

        let connect_timeout = if self.timeout_connect > 0 {
            Some(Duration::from_secs(self.timeout_connect))
        } else {
            None
        };

        Ok(Settings {
            listen: Settings::listen_addr(&self.host, port)?,
            backlog: self.backlog,
            blacklist: self.blacklist.clone(),
            upstream_port: self.upstream_port,
            connect_timeout,
            reply_on_error: self.reply_on_error,
        })
    }
}

// ============================================================================
// MAIN
// ============================================================================

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.quiet {
        "error"
    } else if args.verbose {
        "debug"
    } else {
        args.log_level.as_str()
    };

    // stdout is reserved for the access log.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let settings = args.settings()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get() * 2)
        .enable_all()
        .build()?;

    runtime.block_on(run(settings))
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let policy = Arc::new(PolicyStore::load(&settings.blacklist)?);

    let ctx = Arc::new(HandlerContext {
        policy,
        access_log: AccessLog::stdout(),
        connector: TcpConnector::new(settings.connect_timeout),
        upstream_port: settings.upstream_port,
        reply_on_error: settings.reply_on_error,
    });

    let listener = listener::bind(settings.listen, settings.backlog)
        .with_context(|| format!("Cannot listen on {}", settings.listen))?;

    info!("🚀 Proxy listening on http://{}", settings.listen);
    if ctx.policy.is_empty() {
        info!("Blacklist is empty, all URLs allowed");
    } else {
        info!("Blacklist rules: {}", ctx.policy.len());
    }

    tokio::select! {
        result = listener::serve(listener, ctx) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}
