//! Lending Pool Constants
//!
//! Asset and contract configuration for the deployed lending markets.
//! All assets defined as configuration data for easy extension.

/// Asset listed on the lending pool
#[derive(Debug, Clone)]
pub struct AssetConfig {
    pub symbol: &'static str,
    /// Token contract address
    pub address: &'static str,
    /// Integer precision the ledger accepts (e.g. 6 for USDC, 18 for WETH)
    pub decimals: u32,
    /// Protocol-level sanity ceiling in whole tokens. Not a balance check.
    pub max_amount: u64,
}

impl AssetConfig {
    /// Scale factor between whole tokens and ledger integer units.
    pub fn scale(&self) -> u128 {
        10u128.pow(self.decimals)
    }
}

/// Health factor thresholds for risk classification
///
/// Health factor expresses distance from liquidation:
/// - < CRITICAL_THRESHOLD (1.0): liquidation-eligible, displayed in red
/// - < WARNING_THRESHOLD (1.2): at risk, displayed in amber
/// - otherwise: safe position, displayed in green
pub mod health {
    pub const CRITICAL_THRESHOLD: f64 = 1.0;
    pub const WARNING_THRESHOLD: f64 = 1.2;
}

/// Sepolia testnet deployment
pub mod sepolia {
    use super::AssetConfig;

    pub const LENDING_POOL: &str = "0x5b8d2f44ec1b8e520e9a85f4d87e9a3c2c1db9b1";
    pub const PRICE_ORACLE: &str = "0x9c47a3f1c7e06a34d6bd2eaae59f23a8c35c90d4";

    pub const ASSETS: &[AssetConfig] = &[
        AssetConfig {
            symbol: "USDC",
            address: "0xa0f12dbd8d2c5e7a4c8b31f9b0757e6d1f8a30c2",
            decimals: 6,
            max_amount: 1_000_000,
        },
        AssetConfig {
            symbol: "WETH",
            address: "0x7ceb23fd6bc0add59e62ac25578270cff1b9f619",
            decimals: 18,
            max_amount: 1_000_000,
        },
    ];
}

/// Look up an asset by symbol
pub fn asset(symbol: &str) -> Option<&'static AssetConfig> {
    sepolia::ASSETS
        .iter()
        .find(|a| a.symbol.eq_ignore_ascii_case(symbol))
}

/// Look up an asset by token contract address
pub fn asset_by_address(address: &str) -> Option<&'static AssetConfig> {
    sepolia::ASSETS
        .iter()
        .find(|a| a.address.eq_ignore_ascii_case(address))
}
