//! Account Snapshot
//!
//! The cached read-only view of one wallet's position. Snapshots are
//! immutable once built; the synchronizer replaces them wholesale so readers
//! never observe a partial update.

use std::time::Duration;

use ledger_gateway::AccountSnapshotRaw;
use palisade_core::constants::BPS_SCALE;
use tokio::time::Instant;

use crate::risk::{classify, health_factor_from_wad, RiskLevel};

/// One wallet's collateral, debt, and risk position
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    /// Magnitudes in the pool's base currency (WAD)
    pub total_collateral_value: u128,
    pub total_debt_value: u128,
    pub available_borrow_value: u128,
    /// Ratio in [0, 1]
    pub liquidation_threshold: f64,
    /// Ratio in [0, 1]
    pub loan_to_value: f64,
    /// `f64::INFINITY` when the position carries no debt
    pub health_factor: f64,
    pub fetched_at: Instant,
}

impl AccountSnapshot {
    /// Decode a wire snapshot, stamping it with the current time.
    pub fn from_raw(raw: &AccountSnapshotRaw) -> Self {
        Self {
            total_collateral_value: raw.total_collateral_value,
            total_debt_value: raw.total_debt_value,
            available_borrow_value: raw.available_borrow_value,
            liquidation_threshold: raw.liquidation_threshold_bps as f64 / BPS_SCALE as f64,
            loan_to_value: raw.loan_to_value_bps as f64 / BPS_SCALE as f64,
            health_factor: health_factor_from_wad(raw.health_factor_wad),
            fetched_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }

    pub fn risk(&self) -> RiskLevel {
        classify(self.health_factor)
    }
}
