//! Risk Classifier
//!
//! Pure mapping from a position's health factor to a discrete risk level.

use std::fmt;

use palisade_core::constants::WAD;
use serde::{Deserialize, Serialize};

use crate::constants::health;

/// Discrete risk level derived from the health factor, never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Healthy,
    Warning,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// Status line shown next to the health factor readout
    pub fn status_message(&self) -> &'static str {
        match self {
            Self::Healthy => "Your position is healthy.",
            Self::Warning => {
                "Your health factor is low. Consider repaying debt or adding collateral."
            }
            Self::Critical => {
                "Your position is at risk of liquidation! Repay debt or add collateral immediately."
            }
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify a health factor.
///
/// Total over non-negative input; the zero-debt infinity sentinel classifies
/// as `Healthy`.
pub fn classify(health_factor: f64) -> RiskLevel {
    if health_factor < health::CRITICAL_THRESHOLD {
        RiskLevel::Critical
    } else if health_factor < health::WARNING_THRESHOLD {
        RiskLevel::Warning
    } else {
        RiskLevel::Healthy
    }
}

/// Decode a wire health factor. `u128::MAX` marks a zero-debt position.
pub fn health_factor_from_wad(raw: u128) -> f64 {
    if raw == u128::MAX {
        f64::INFINITY
    } else {
        raw as f64 / WAD as f64
    }
}
