//! CLI subcommand handlers.

use crate::{Commands, ConfigAction};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use topograph_core::config::user_config_path;
use topograph_core::error::ConfigError;
use topograph_core::{GatewayServer, KubeConnector, SharedGateway, TopographConfig};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    config_path: Option<&Path>,
    loaded: Result<TopographConfig, ConfigError>,
) -> anyhow::Result<()> {
    match command {
        Commands::Serve { host, port } => {
            let config = loaded.map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
            serve(apply_overrides(config, host, port)).await
        }
        Commands::Config { action } => handle_config(action, config_path, loaded),
    }
}

fn apply_overrides(
    mut config: TopographConfig,
    host: Option<String>,
    port: Option<u16>,
) -> TopographConfig {
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }
    config
}

async fn serve(config: TopographConfig) -> anyhow::Result<()> {
    let connector = KubeConnector::from_config(&config.cluster);
    let gw: SharedGateway = Arc::new(Mutex::new(GatewayServer::new(
        config.gateway.clone(),
        config.watch.clone(),
        Arc::new(connector),
    )));

    tracing::info!(
        host = %config.gateway.host,
        port = config.gateway.port,
        max_streams = config.gateway.max_streams,
        evict_deleted = config.watch.evict_deleted,
        "Starting topology gateway"
    );

    tokio::select! {
        result = topograph_core::run_gateway(gw) => {
            result.map_err(|e| anyhow::anyhow!("Gateway error: {}", e))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
    }
    Ok(())
}

fn handle_config(
    action: ConfigAction,
    config_path: Option<&Path>,
    loaded: Result<TopographConfig, ConfigError>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = loaded.map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
        ConfigAction::Init { force } => {
            let path = init_target(config_path)?;
            if write_default_config(&path, force)? {
                println!("Created default configuration at: {}", path.display());
            } else {
                println!("Configuration file already exists at: {}", path.display());
            }
            Ok(())
        }
    }
}

fn init_target(config_path: Option<&Path>) -> anyhow::Result<PathBuf> {
    config_path
        .map(Path::to_path_buf)
        .or_else(user_config_path)
        .ok_or_else(|| anyhow::anyhow!("No home directory found; pass --config"))
}

/// Write the default configuration to `path`. Returns `false` when the file
/// exists and `force` is not set.
fn write_default_config(path: &Path, force: bool) -> anyhow::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(&TopographConfig::default())?;
    std::fs::write(path, toml_str)?;
    Ok(true)
}
