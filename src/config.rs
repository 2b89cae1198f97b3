//! Gateway configuration.
//!
//! Loaded from an INI-style file via the `config` crate, section by
//! section (`[server]`, `[api]`, `[wallet]`, `[storage]`), then
//! overridden by a handful of well-known environment variables —
//! the pattern the teacher's `dynamic_config.rs` uses for its own
//! env-override defaults, generalized to read from a file first.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_host: String,
    pub bind_port: u16,
    pub pid_file: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 6270,
            pid_file: "gatewayd.pid".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub api_password: Option<String>,
    pub session_lifetime_secs: i64,
    pub app_domain_suffixes: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_password: None,
            session_lifetime_secs: 3600,
            // Blockstack's historical app-domain suffixes.
            app_domain_suffixes: vec!["id".to_string(), "x".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    pub wallet_password: Option<String>,
    pub master_data_key_hex: Option<String>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            wallet_password: None,
            master_data_key_hex: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteThreshold {
    pub min_successes: usize,
    pub verify_reread: bool,
}

impl Default for WriteThreshold {
    fn default() -> Self {
        Self {
            min_successes: 1,
            verify_reread: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub driver_names: Vec<String>,
    pub local_driver_names: Vec<String>,
    pub storage_anonymous_write: bool,
    pub write_threshold: WriteThreshold,
    pub naming_node_url: Option<String>,
    pub utxo_service_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver_names: vec!["disk".to_string()],
            local_driver_names: vec!["disk".to_string()],
            storage_anonymous_write: true,
            write_threshold: WriteThreshold::default(),
            naming_node_url: None,
            utxo_service_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub wallet: WalletConfig,
    pub storage: StorageConfig,
}

impl GatewayConfig {
    /// Load configuration from an INI-style file, if it exists, then
    /// layer environment-variable overrides for secrets and the bind
    /// address on top — mirroring the teacher's env-first dynamic
    /// config, but file-backed.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = config_path {
            if path.exists() {
                builder = builder.add_source(
                    config::File::from(path).format(config::FileFormat::Ini),
                );
            }
        }
        let settings = builder.build()?;
        let mut cfg: GatewayConfig = settings
            .try_deserialize()
            .unwrap_or_else(|_| GatewayConfig::default());

        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Apply the environment-variable overrides named in the gateway's
    /// operational contract: wallet password, API password, bind
    /// host/port, and API session token each may override the file.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BLOCKSTACK_API_PASSWORD") {
            self.api.api_password = Some(v);
        }
        if let Ok(v) = std::env::var("BLOCKSTACK_WALLET_PASSWORD") {
            self.wallet.wallet_password = Some(v);
        }
        if let Ok(v) = std::env::var("BLOCKSTACK_API_BIND") {
            if let Some((host, port)) = v.rsplit_once(':') {
                if let Ok(port) = port.parse() {
                    self.server.bind_host = host.to_string();
                    self.server.bind_port = port;
                }
            }
        }
        if let Ok(v) = std::env::var("BLOCKSTACK_API_SESSION") {
            self.wallet.master_data_key_hex = Some(v);
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.bind_host, self.server.bind_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.server.bind_port, 6270);
        assert!(cfg.storage.storage_anonymous_write);
        assert_eq!(cfg.storage.write_threshold.min_successes, 1);
        assert!(cfg.storage.write_threshold.verify_reread);
    }

    #[test]
    fn load_without_file_falls_back_to_defaults() {
        let cfg = GatewayConfig::load(None).unwrap();
        assert_eq!(cfg.server.bind_host, "127.0.0.1");
    }

    #[test]
    fn bind_addr_formats_host_and_port() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:6270");
    }
}
