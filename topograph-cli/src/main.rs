//! Topograph CLI: serves live topology streams for Kubernetes/OpenShift
//! namespaces over HTTP.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use topograph_core::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Topograph: live application topology from your cluster's workloads
#[derive(Parser, Debug)]
#[command(name = "topograph", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Subcommand (defaults to `serve`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Run the topology gateway
    Serve {
        /// Address to bind (overrides gateway.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides gateway.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Filter directive for the stderr layer.
fn stderr_directive(verbose: u8, quiet: bool, level: &str) -> String {
    match verbose {
        0 if quiet => "error".to_string(),
        0 => level.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the tracing subscriber. The returned guard flushes the JSON file
/// writer and must live until exit.
fn init_tracing(verbose: u8, quiet: bool, logging: &LoggingConfig) -> Option<WorkerGuard> {
    // RUST_LOG wins unless verbosity was requested explicitly.
    let stderr_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) if verbose == 0 && !quiet => filter,
        _ => EnvFilter::new(stderr_directive(verbose, quiet, &logging.level)),
    };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    let json_dir = if logging.json_file {
        prepare_log_dir(logging.resolved_log_dir())
    } else {
        None
    };
    let (json_layer, guard) = if let Some(log_dir) = json_dir {
        let file_appender = tracing_appender::rolling::daily(&log_dir, "topograph.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(EnvFilter::new("debug"));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();
    guard
}

/// Create the JSON log directory, or return `None` so the file layer is skipped.
fn prepare_log_dir(dir: PathBuf) -> Option<PathBuf> {
    match std::fs::create_dir_all(&dir) {
        Ok(()) => Some(dir),
        Err(e) => {
            eprintln!(
                "warning: cannot create log directory {}: {e}; JSON file logging disabled",
                dir.display()
            );
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Logging is configured from the file too, so load before installing it.
    let loaded = topograph_core::load_config(cli.config.as_deref(), None);
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    let _guard = init_tracing(cli.verbose, cli.quiet, &logging);

    let command = cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    });
    commands::handle_command(command, cli.config.as_deref(), loaded).await
}
