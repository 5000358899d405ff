//! Configuration types for Palisade

use serde::{Deserialize, Serialize};

use crate::Network;

/// Ledger gateway connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway RPC URL (e.g., "https://rpc.sepolia.org")
    pub url: String,

    /// API key for keyed gateway providers (optional)
    #[serde(default)]
    pub api_key: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "https://rpc.sepolia.org".to_string(),
            api_key: String::new(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gateway connection settings
    pub gateway: GatewayConfig,

    /// Network the lending pool is deployed on
    pub network: Network,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            network: Network::Sepolia,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.gateway.url, "https://rpc.sepolia.org");
        assert_eq!(config.network, Network::Sepolia);
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.gateway.url, config.gateway.url);
        assert_eq!(parsed.network, config.network);
    }
}
