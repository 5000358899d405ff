//! Lending pool domain logic
//!
//! Amount validation, account snapshots, and risk classification for the
//! Palisade lending dashboard. Everything here is either pure or a plain
//! data type; the remote pool itself is reached through `ledger-gateway`.

pub mod amount;
pub mod constants;
pub mod oracle;
pub mod risk;
pub mod state;

// Re-exports
pub use amount::{format_scaled, normalize};
pub use risk::{classify, health_factor_from_wad, RiskLevel};
pub use state::AccountSnapshot;
