//! Server configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use typhoon_engine::predictor::RiskConfig;
use typhoon_engine::service::ClusteringConfig;

/// Base name of the optional configuration file in the working directory
const CONFIG_FILE: &str = "typhoon-server";

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Tag attached to structured log records
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port the frontend targets
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Fitted predictor artifact
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Hex SHA-256 the artifact must match, if set
    #[serde(default)]
    pub model_sha256: Option<String>,

    /// Browser origins allowed to call the API; `*` allows any
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub risk: RiskConfig,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "typhoon-server".to_string())
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/impact_model.json")
}

fn default_cors_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            bind_address: default_bind_address(),
            api_port: default_api_port(),
            model_path: default_model_path(),
            model_sha256: None,
            cors_allowed_origins: default_cors_allowed_origins(),
            clustering: ClusteringConfig::default(),
            risk: RiskConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from `typhoon-server.{toml,json,yaml}` (optional) and
    /// `TYPHOON__*` environment variables, the latter taking precedence.
    pub fn load() -> Result<Self> {
        Self::build(config::File::with_name(CONFIG_FILE).required(false))
    }

    /// Load from an explicit file plus the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::build(config::File::from(path).required(true))
    }

    fn build<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("TYPHOON")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_allowed_origins"),
            )
            .build()
            .context("failed to read server configuration")?;

        config
            .try_deserialize()
            .context("invalid server configuration")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.api_port)
    }
}
