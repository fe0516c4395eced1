//! Error types for the Topograph core.
//!
//! Uses `thiserror` for public API error types, one enum per concern, each
//! with structured variants.

use std::path::PathBuf;

/// Errors from the resource event source.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Failed to start watch on {kind} in namespace {namespace}: {message}")]
    StartFailed {
        kind: String,
        namespace: String,
        message: String,
    },

    #[error("Watch stream for {kind} failed: {message}")]
    Stream { kind: String, message: String },
}

/// Errors from the resource lookup service.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Listing {kind} with selector '{selector}' failed: {message}")]
    ListFailed {
        kind: String,
        selector: String,
        message: String,
    },
}

/// Errors from writing snapshots to the output connection.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Client disconnected")]
    Disconnected,
}

/// Errors from connecting to a cluster API server.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("Invalid cluster host '{host}': {message}")]
    InvalidHost { host: String, message: String },

    #[error("Failed to build cluster client: {message}")]
    ClientBuild { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_watch() {
        let err = WatchError::Stream {
            kind: "Deployment".into(),
            message: "connection reset".into(),
        };
        assert_eq!(
            err.to_string(),
            "Watch stream for Deployment failed: connection reset"
        );

        let err = WatchError::StartFailed {
            kind: "DeploymentConfig".into(),
            namespace: "shop".into(),
            message: "server error".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to start watch on DeploymentConfig in namespace shop: server error"
        );
    }

    #[test]
    fn test_error_display_lookup() {
        let err = LookupError::ListFailed {
            kind: "Route".into(),
            selector: "app.kubernetes.io/name=cart".into(),
            message: "forbidden".into(),
        };
        assert_eq!(
            err.to_string(),
            "Listing Route with selector 'app.kubernetes.io/name=cart' failed: forbidden"
        );
    }

    #[test]
    fn test_error_display_publish() {
        assert_eq!(PublishError::Disconnected.to_string(), "Client disconnected");
    }

    #[test]
    fn test_error_display_cluster() {
        let err = ClusterError::InvalidHost {
            host: "not a url".into(),
            message: "invalid uri character".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid cluster host 'not a url': invalid uri character"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = ConfigError::FileNotFound {
            path: PathBuf::from("/etc/topograph.toml"),
        };
        assert_eq!(
            err.to_string(),
            "Configuration file not found: /etc/topograph.toml"
        );
    }
}
