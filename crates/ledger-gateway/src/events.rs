//! Pool event types and subscription filtering

use palisade_core::{Address, OperationKind, ScaledAmount, TxHash};
use serde::{Deserialize, Serialize};

/// Capacity of the gateway event broadcast channel.
/// Slow receivers that lag past this many events observe `RecvError::Lagged`
/// and re-synchronize by refreshing.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A confirmed pool interaction observed on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEvent {
    pub kind: OperationKind,
    pub account: Address,
    /// Token contract the operation touched
    pub asset: Address,
    pub amount: ScaledAmount,
    pub tx_hash: TxHash,
}

/// Subscriber-side event narrowing.
///
/// Gateways fan out the full pool stream; each consumer keeps only what its
/// filter matches.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub account: Option<Address>,
    pub kinds: Option<Vec<OperationKind>>,
}

impl EventFilter {
    /// Match all four operation kinds for one account.
    pub fn for_account(account: Address) -> Self {
        Self {
            account: Some(account),
            kinds: None,
        }
    }

    pub fn matches(&self, event: &PoolEvent) -> bool {
        if let Some(account) = &self.account {
            if *account != event.account {
                return false;
            }
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: OperationKind, account: &str) -> PoolEvent {
        PoolEvent {
            kind,
            account: Address::new(account),
            asset: Address::new("0xusdc"),
            amount: 1_000,
            tx_hash: TxHash::new("0xabc"),
        }
    }

    #[test]
    fn test_filter_by_account() {
        let filter = EventFilter::for_account(Address::new("0xaa"));
        assert!(filter.matches(&event(OperationKind::Deposit, "0xaa")));
        assert!(!filter.matches(&event(OperationKind::Deposit, "0xbb")));
    }

    #[test]
    fn test_filter_by_kind() {
        let filter = EventFilter {
            account: None,
            kinds: Some(vec![OperationKind::Borrow, OperationKind::Repay]),
        };
        assert!(filter.matches(&event(OperationKind::Borrow, "0xaa")));
        assert!(!filter.matches(&event(OperationKind::Withdraw, "0xaa")));
    }

    #[test]
    fn test_default_filter_matches_everything() {
        let filter = EventFilter::default();
        for kind in OperationKind::ALL {
            assert!(filter.matches(&event(kind, "0xaa")));
        }
    }
}
