//! Server configuration and loading.
//!
//! Configuration merges a TOML file (default `signet.toml`) with
//! `SIGNET`-prefixed environment variables, e.g.
//! `SIGNET__SERVER__PORT=9090` or
//! `SIGNET__AUTH__SESSION__SECRET=...`. Environment always wins.

use std::net::SocketAddr;
use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use signet_auth::config::AuthServerConfig;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "signet.toml";

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Listener settings.
    pub server: HttpConfig,

    /// Authorization server settings.
    pub auth: AuthServerConfig,

    /// Demo data seeding.
    pub seed: SeedConfig,
}

impl AppConfig {
    /// Validates the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), AppConfigError> {
        self.addr()?;
        self.auth.validate()?;
        Ok(())
    }

    /// Resolves the listen address.
    ///
    /// # Errors
    ///
    /// Returns `InvalidListenAddr` if the host does not parse.
    pub fn addr(&self) -> Result<SocketAddr, AppConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| AppConfigError::InvalidListenAddr {
                host: self.server.host.clone(),
                port: self.server.port,
            })
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Address to bind.
    pub host: String,

    /// Port to bind.
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

/// Demo data seeding settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Seed a demo client and demo accounts at startup. Off by default;
    /// meant for development against the in-memory backend.
    pub demo: bool,
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    /// The config crate failed to read or merge sources.
    #[error("configuration load error: {0}")]
    Load(#[from] config::ConfigError),

    /// The listen address does not parse.
    #[error("invalid listen address {host}:{port}")]
    InvalidListenAddr {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
    },

    /// The nested authorization server settings are invalid.
    #[error(transparent)]
    Auth(#[from] signet_auth::config::ConfigError),
}

/// Loads configuration from a file plus environment overrides.
///
/// The file is optional; a missing file falls back to defaults plus
/// environment, which still fails validation until a session secret is
/// provided.
///
/// # Errors
///
/// Returns an error if a source fails to parse or validation fails.
pub fn load_config(path: Option<&str>) -> Result<AppConfig, AppConfigError> {
    let mut builder = Config::builder();

    let file = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
    if file.exists() {
        builder = builder.add_source(File::from(file));
    }

    builder = builder.add_source(
        Environment::with_prefix("SIGNET")
            .try_parsing(true)
            .separator("__"),
    );

    let merged: AppConfig = builder.build()?.try_deserialize()?;
    merged.validate()?;
    Ok(merged)
}
