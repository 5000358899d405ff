//! Core type definitions for Palisade

use serde::{Deserialize, Serialize};
use std::fmt;

/// Account or contract address (0x-prefixed, 20 bytes hex-encoded)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check that the address has the canonical shape: "0x" + 40 hex chars.
    pub fn is_wellformed(&self) -> bool {
        let s = self.0.as_str();
        s.len() == 42
            && s.starts_with("0x")
            && s[2..].chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction hash (0x-prefixed, 32 bytes hex-encoded)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User-initiated pool operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Deposit,
    Withdraw,
    Borrow,
    Repay,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        Self::Deposit,
        Self::Withdraw,
        Self::Borrow,
        Self::Repay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Borrow => "borrow",
            Self::Repay => "repay",
        }
    }

    /// Deposit and repay move the user's tokens into the pool, so the pool
    /// must hold a token allowance before the action itself can execute.
    pub fn requires_approval(&self) -> bool {
        matches!(self, Self::Deposit | Self::Repay)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Network type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Sepolia,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Sepolia => "sepolia",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Integer token amount scaled to an asset's precision
pub type ScaledAmount = u128;

/// Constants
pub mod constants {
    /// 18-decimal fixed-point scale used for on-ledger values and ratios
    pub const WAD: u128 = 1_000_000_000_000_000_000;

    /// Basis-point scale for threshold and LTV ratios
    pub const BPS_SCALE: u32 = 10_000;
}
