//! Transaction history
//!
//! In-memory, newest-first record of the active account's confirmed pool
//! interactions, accumulated from the gateway's event stream. Nothing is
//! persisted; reconnecting starts a fresh list.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use ledger_gateway::{EventFilter, LedgerGateway, PoolEvent};
use palisade_core::{Address, OperationKind, ScaledAmount, TxHash};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Records kept per account
const MAX_RECORDS: usize = 100;

/// One confirmed pool interaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TxRecord {
    pub id: String,
    pub kind: OperationKind,
    /// Asset symbol when the token is listed, otherwise its address
    pub asset: String,
    pub amount: ScaledAmount,
    pub tx_hash: TxHash,
    /// Unix timestamp of when the event was observed
    pub seen_at: u64,
}

impl TxRecord {
    fn from_event(event: &PoolEvent) -> Self {
        let asset = lending::constants::asset_by_address(event.asset.as_str())
            .map(|a| a.symbol.to_string())
            .unwrap_or_else(|| event.asset.to_string());
        Self {
            id: event.tx_hash.to_string(),
            kind: event.kind,
            asset,
            amount: event.amount,
            tx_hash: event.tx_hash.clone(),
            seen_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }
}

/// Event-fed transaction list for the active account
#[derive(Clone)]
pub struct TxHistory {
    inner: Arc<HistoryInner>,
}

struct HistoryInner {
    gateway: Arc<dyn LedgerGateway>,
    records: Mutex<VecDeque<TxRecord>>,
    epoch: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TxHistory {
    pub fn new(gateway: Arc<dyn LedgerGateway>) -> Self {
        Self {
            inner: Arc::new(HistoryInner {
                gateway,
                records: Mutex::new(VecDeque::new()),
                epoch: AtomicU64::new(0),
                task: Mutex::new(None),
            }),
        }
    }

    /// Switch the tracked account, clearing the list.
    pub fn set_account(&self, account: Option<Address>) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.inner.task.lock().unwrap().take() {
            task.abort();
        }
        self.inner.records.lock().unwrap().clear();

        let Some(account) = account else { return };

        let history = self.clone();
        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        let filter = EventFilter::for_account(account);
        let mut rx = self.inner.gateway.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if history.inner.epoch.load(Ordering::SeqCst) != epoch {
                            break;
                        }
                        if !filter.matches(&event) {
                            continue;
                        }
                        history.push(TxRecord::from_event(&event));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("History stream lagged by {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        *self.inner.task.lock().unwrap() = Some(handle);
    }

    /// Records, newest first.
    pub fn records(&self) -> Vec<TxRecord> {
        self.inner.records.lock().unwrap().iter().cloned().collect()
    }

    fn push(&self, record: TxRecord) {
        let mut records = self.inner.records.lock().unwrap();
        records.push_front(record);
        records.truncate(MAX_RECORDS);
    }
}

impl Drop for HistoryInner {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_gateway::mock::MockLedger;
    use std::time::Duration;

    fn account() -> Address {
        Address::new("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
    }

    fn event(kind: OperationKind, account: Address, tx: &str) -> PoolEvent {
        let usdc = lending::constants::asset("USDC").unwrap();
        PoolEvent {
            kind,
            account,
            asset: Address::new(usdc.address),
            amount: 1_000_000,
            tx_hash: TxHash::new(tx),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_accumulate_newest_first() {
        let ledger = Arc::new(MockLedger::new());
        let history = TxHistory::new(ledger.clone());
        history.set_account(Some(account()));
        tokio::time::sleep(Duration::from_millis(1)).await;

        ledger.emit(event(OperationKind::Deposit, account(), "0x01"));
        ledger.emit(event(OperationKind::Borrow, account(), "0x02"));
        tokio::time::sleep(Duration::from_millis(1)).await;

        let records = history.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, OperationKind::Borrow);
        assert_eq!(records[1].kind, OperationKind::Deposit);
        assert_eq!(records[0].asset, "USDC");
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_events_excluded() {
        let ledger = Arc::new(MockLedger::new());
        let history = TxHistory::new(ledger.clone());
        history.set_account(Some(account()));
        tokio::time::sleep(Duration::from_millis(1)).await;

        let other = Address::new("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
        ledger.emit(event(OperationKind::Repay, other, "0x03"));
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(history.records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_account_switch_clears_records() {
        let ledger = Arc::new(MockLedger::new());
        let history = TxHistory::new(ledger.clone());
        history.set_account(Some(account()));
        tokio::time::sleep(Duration::from_millis(1)).await;

        ledger.emit(event(OperationKind::Deposit, account(), "0x04"));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(history.records().len(), 1);

        history.set_account(None);
        assert!(history.records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlisted_asset_falls_back_to_address() {
        let ledger = Arc::new(MockLedger::new());
        let history = TxHistory::new(ledger.clone());
        history.set_account(Some(account()));
        tokio::time::sleep(Duration::from_millis(1)).await;

        let mut ev = event(OperationKind::Deposit, account(), "0x05");
        ev.asset = Address::new("0x1111111111111111111111111111111111111111");
        ledger.emit(ev);
        tokio::time::sleep(Duration::from_millis(1)).await;

        let records = history.records();
        assert_eq!(
            records[0].asset,
            "0x1111111111111111111111111111111111111111"
        );
    }
}
