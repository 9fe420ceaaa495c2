use std::fs;

use anyhow::{Context as _, Result};
use serde::Deserialize;

use btc_primitives::Network;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub network: Network,
    pub peer: PeerConfig,
    pub sync: SyncConfig,
}

#[allow(clippy::module_name_repetitions)]
#[derive(Deserialize, Clone, Debug)]
pub struct PeerConfig {
    pub host: String,
    /// Defaults to the network's standard port.
    pub port: Option<u16>,
    pub read_timeout_sec: Option<u64>,
    pub write_timeout_sec: Option<u64>,
}

#[allow(clippy::module_name_repetitions)]
#[derive(Deserialize, Clone, Debug)]
pub struct SyncConfig {
    /// Stop once the chain reaches this height.
    pub target_height: u64,
    /// Give up after this many consecutive failed rounds.
    pub max_consecutive_failures: Option<u32>,
}

fn get_env_var(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

/// Loads configuration from a TOML file, then lets environment variables
/// override the peer settings.
impl Config {
    /// Parse config
    ///
    /// # Errors
    /// * config file not exists
    /// * incorrect config
    pub fn new(file: &str) -> Result<Self> {
        let config_toml =
            fs::read_to_string(file).with_context(|| format!("Failed to read config file {file}"))?;
        let mut config: Config =
            toml::from_str(&config_toml).context("Failed to parse config file")?;

        config.peer.host = get_env_var("PEER_HOST").unwrap_or(config.peer.host);
        if let Some(port) = get_env_var("PEER_PORT") {
            config.peer.port = Some(port.parse().context("Failed to parse PEER_PORT")?);
        }

        Ok(config)
    }

    pub fn peer_port(&self) -> u16 {
        self.peer.port.unwrap_or(self.network.default_port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_config() {
        let toml = r#"
            network = "mainnet"

            [peer]
            host = "seed.bitcoin.sipa.be"

            [sync]
            target_height = 40000
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.peer_port(), 8333);
        assert_eq!(config.sync.target_height, 40_000);
        assert!(config.peer.read_timeout_sec.is_none());
    }
}
