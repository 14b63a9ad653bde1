use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub log_level: String,
    pub log_to_file: bool,
    pub log_file: String,
    pub listen_addr: String,
    pub checkpoint_api_url: String,
    pub exit_payload_api_url: String,
    pub http_timeout_secs: u64,
    pub exit_poll_interval_secs: u64,
    /// Root and child RPC endpoints. A pair is served only when both of its
    /// chains have an endpoint.
    pub ethereum_rpc_url: Option<String>,
    pub goerli_rpc_url: Option<String>,
    pub polygon_rpc_url: Option<String>,
    pub mumbai_rpc_url: Option<String>,
}

impl AppConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn exit_poll_interval(&self) -> Duration {
        Duration::from_secs(self.exit_poll_interval_secs.max(1))
    }
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

pub fn load_config_from(path: &str) -> Result<AppConfig, ConfigError> {
    let s = Config::builder()
        // Set defaults
        .set_default("log_level", "info")?
        .set_default("log_to_file", false)?
        .set_default("log_file", "log/rebalancer.log")?
        .set_default("listen_addr", "0.0.0.0:5040")?
        .set_default("checkpoint_api_url", "https://apis.matic.network/api/v1")?
        .set_default("exit_payload_api_url", "https://proof-generator.polygon.technology/api/v1")?
        .set_default("http_timeout_secs", 30)?
        .set_default("exit_poll_interval_secs", 30)?
        // Add configuration from a file
        .add_source(File::with_name(path).required(false))
        // Add configuration from environment variables
        .add_source(Environment::with_prefix("APP"))
        .build()?;

    s.try_deserialize()
}
