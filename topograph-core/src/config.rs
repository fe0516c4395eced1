//! Configuration system for Topograph.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/topograph/config.toml` and/or an explicit file.

use crate::error::ConfigError;
use crate::events::EventFilter;
use crate::gateway::GatewayConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopographConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How cluster API clients are built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Skip TLS certificate verification against the API server.
    pub accept_invalid_certs: bool,
    /// Per-request timeout for list calls in seconds (0 = client default).
    pub request_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            accept_invalid_certs: true,
            request_timeout_secs: 30,
        }
    }
}

/// Watch behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Remove nodes when their resource is deleted. Off by default: deleted
    /// workloads stay in the graph for the lifetime of the stream.
    pub evict_deleted: bool,
}

impl WatchConfig {
    pub fn event_filter(&self) -> EventFilter {
        if self.evict_deleted {
            EventFilter::all()
        } else {
            EventFilter::applied_only()
        }
    }
}

/// Logging output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Also write JSON logs to a daily rolling file.
    pub json_file: bool,
    /// Directory for JSON log files. Defaults to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_file: false,
            log_dir: None,
        }
    }
}

impl LoggingConfig {
    /// Resolve the log directory, falling back to the platform data dir.
    pub fn resolved_log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("dev", "topograph", "topograph")
                .map(|d| d.data_dir().join("logs"))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }
}

/// Path of the user-level config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "topograph", "topograph")
        .map(|d| d.config_dir().join("config.toml"))
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `TOPOGRAPH_`)
/// 3. Explicit config file
/// 4. User config (`~/.config/topograph/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    config_file: Option<&Path>,
    overrides: Option<&TopographConfig>,
) -> Result<TopographConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(TopographConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(path) = config_file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // Environment variables (TOPOGRAPH_GATEWAY__PORT, TOPOGRAPH_WATCH__EVICT_DELETED, etc.)
    figment = figment.merge(Env::prefixed("TOPOGRAPH_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: TopographConfig = figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &TopographConfig) -> Result<(), ConfigError> {
    if config.gateway.max_streams == 0 {
        return Err(ConfigError::Invalid {
            message: "gateway.max_streams must be at least 1".into(),
        });
    }
    if config.gateway.stream_buffer == 0 {
        return Err(ConfigError::Invalid {
            message: "gateway.stream_buffer must be at least 1".into(),
        });
    }
    Ok(())
}
