use std::time::Duration;

use anyhow::{Context, Result};
use bitcoin::Network;
use tapkey_core::constants::NETWORK;

pub const DEFAULT_MAINNET_URL: &str = "https://mempool.space";
pub const DEFAULT_TESTNET_URL: &str = "https://mempool.space/testnet";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub struct Config {
    /// Esplora base URL; API paths hang off `{esplora_url}/api`.
    pub esplora_url: String,
    pub http_timeout: Duration,
    pub network: Network,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(NETWORK, |key| std::env::var(key).ok())
    }

    fn from_lookup(network: Network, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let esplora_url = lookup("TAPKEY_ESPLORA_URL")
            .unwrap_or_else(|| default_url(network).into())
            .trim_end_matches('/')
            .to_string();
        let timeout_secs = match lookup("TAPKEY_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("TAPKEY_HTTP_TIMEOUT_SECS is not a number: {raw}"))?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };
        Ok(Self {
            esplora_url,
            http_timeout: Duration::from_secs(timeout_secs),
            network,
        })
    }
}

fn default_url(network: Network) -> &'static str {
    match network {
        Network::Bitcoin => DEFAULT_MAINNET_URL,
        _ => DEFAULT_TESTNET_URL,
    }
}
