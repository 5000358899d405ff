//! ledger-gateway: The remote-ledger boundary of Palisade
//!
//! The lending pool's accounting lives in on-chain contracts reached through
//! a gateway. This crate defines the traits the rest of the workspace
//! programs against: `LedgerGateway` for submission, confirmation tracking,
//! snapshot reads, and event subscriptions, and `WalletSession` for the
//! active identity and signing. A scriptable in-memory implementation lives
//! in [`mock`].

pub mod events;
pub mod mock;

use std::time::Duration;

use async_trait::async_trait;
use palisade_core::{Address, GatewayError, OperationKind, ScaledAmount, SignError, TxHash};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub use events::{EventFilter, PoolEvent};

/// Default timeout for gateway calls (30 seconds).
/// Long enough for congested RPC providers, short enough to avoid perpetual spinners.
const GATEWAY_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// One remote step of a workflow.
///
/// Deposits and repays are preceded by an `Approve` step granting the pool a
/// token allowance; the action itself is an `Execute` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Approve,
    Execute(OperationKind),
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Execute(kind) => kind.as_str(),
        }
    }
}

/// A single remote step, ready to be signed and submitted
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub step: StepKind,
    /// Token contract the step touches
    pub asset: Address,
    /// Integer magnitude at the asset's precision
    pub amount: ScaledAmount,
    /// Account on whose behalf the step runs
    pub account: Address,
}

/// An operation request carrying the wallet's signature
#[derive(Debug, Clone)]
pub struct SignedOperation {
    pub request: OperationRequest,
    /// Opaque signature payload produced by the wallet
    pub signature: String,
}

/// Handle returned at submission time; keys the confirmation feed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationHandle {
    pub tx_hash: TxHash,
}

/// Outcome of a confirmation query for one operation handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Pending,
    Confirmed,
    Reverted { reason: String },
}

/// WAD-scaled account snapshot as the pool contract reports it.
///
/// Magnitudes are in the pool's base currency. `health_factor_wad` uses
/// `u128::MAX` to encode the zero-debt position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshotRaw {
    pub total_collateral_value: u128,
    pub total_debt_value: u128,
    pub available_borrow_value: u128,
    pub liquidation_threshold_bps: u32,
    pub loan_to_value_bps: u32,
    pub health_factor_wad: u128,
}

/// Remote ledger gateway.
///
/// Implementations submit one signed operation at a time, report the
/// confirmation outcome per handle, serve read-only snapshot queries, and
/// fan pool events out over a broadcast channel.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Submit a signed operation for execution.
    async fn submit(&self, op: &SignedOperation) -> Result<OperationHandle>;

    /// Current confirmation outcome for a submitted operation.
    async fn confirmation(&self, handle: &OperationHandle) -> Result<ConfirmationStatus>;

    /// Read-only snapshot of one account's position.
    async fn read_snapshot(&self, account: &Address) -> Result<AccountSnapshotRaw>;

    /// Oracle price of `asset` quoted in the pool's base currency (WAD).
    async fn read_asset_price(&self, asset: &Address) -> Result<ScaledAmount>;

    /// Subscribe to pool events. Receivers narrow the stream with their own
    /// [`EventFilter`]; the gateway may over-deliver.
    fn subscribe(&self) -> broadcast::Receiver<PoolEvent>;
}

/// Active wallet identity and signer
#[async_trait]
pub trait WalletSession: Send + Sync {
    /// Account the wallet currently exposes, if connected.
    fn account(&self) -> Option<Address>;

    /// Ask the wallet to sign one remote step. The user may decline.
    async fn sign(
        &self,
        request: &OperationRequest,
    ) -> std::result::Result<SignedOperation, SignError>;
}

/// Wrap a gateway call with the standard request timeout.
pub async fn timed<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(GATEWAY_REQUEST_TIMEOUT, fut)
        .await
        .map_err(|_| GatewayError::RequestTimeout {
            secs: GATEWAY_REQUEST_TIMEOUT.as_secs(),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_kind_labels() {
        assert_eq!(StepKind::Approve.as_str(), "approve");
        assert_eq!(StepKind::Execute(OperationKind::Borrow).as_str(), "borrow");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_passes_result_through() {
        let ok: Result<u32> = timed(async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_times_out() {
        let res: Result<u32> = timed(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(7)
        })
        .await;
        assert!(matches!(res, Err(GatewayError::RequestTimeout { secs: 30 })));
    }
}
