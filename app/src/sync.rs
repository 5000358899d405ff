//! Account state synchronizer
//!
//! Keeps one wallet's cached account snapshot fresh through a recurring
//! poll and a ledger event subscription, and republishes it to any number
//! of consumers. The snapshot is the only shared mutable value in the
//! dashboard: it is written by whole-value replacement and read by clone.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ledger_gateway::{timed, EventFilter, LedgerGateway};
use lending::{AccountSnapshot, RiskLevel};
use palisade_core::{Address, GatewayError};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;

/// How often the recurring poll re-reads the account snapshot (seconds).
const POLL_INTERVAL_SECS: u64 = 5;

/// A snapshot younger than this is served without a network read (seconds).
const STALE_AFTER_SECS: u64 = 2;

/// Synchronizer tuning
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub poll_interval: Duration,
    pub stale_after: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
            stale_after: Duration::from_secs(STALE_AFTER_SECS),
        }
    }
}

/// Cloneable handle over the synchronizer's shared state
#[derive(Clone)]
pub struct AccountSync {
    inner: Arc<SyncInner>,
}

struct SyncInner {
    gateway: Arc<dyn LedgerGateway>,
    config: SyncConfig,
    account: RwLock<Option<Address>>,
    snapshot: RwLock<Option<AccountSnapshot>>,
    /// Set when a landed transaction or ledger event outdates the cache.
    /// The stale value keeps being served until the refresh lands.
    invalidated: AtomicBool,
    last_error: RwLock<Option<String>>,
    /// Bumped on every account switch; in-flight reads from an older epoch
    /// are discarded on arrival.
    epoch: AtomicU64,
    /// Coalesces concurrent refreshes to one network read at a time.
    inflight: Mutex<()>,
    published: watch::Sender<Option<AccountSnapshot>>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl AccountSync {
    pub fn new(gateway: Arc<dyn LedgerGateway>, config: SyncConfig) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            inner: Arc::new(SyncInner {
                gateway,
                config,
                account: RwLock::new(None),
                snapshot: RwLock::new(None),
                invalidated: AtomicBool::new(false),
                last_error: RwLock::new(None),
                epoch: AtomicU64::new(0),
                inflight: Mutex::new(()),
                published,
                tasks: std::sync::Mutex::new(Vec::new()),
            }),
        }
    }

    /// Receive every published snapshot replacement.
    pub fn subscribe(&self) -> watch::Receiver<Option<AccountSnapshot>> {
        self.inner.published.subscribe()
    }

    pub async fn snapshot(&self) -> Option<AccountSnapshot> {
        self.inner.snapshot.read().await.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.inner.last_error.read().await.clone()
    }

    pub async fn risk(&self) -> Option<RiskLevel> {
        self.snapshot().await.map(|s| s.risk())
    }

    /// Switch the active wallet address.
    ///
    /// Clears the cached snapshot, discards in-flight reads for the previous
    /// address, and restarts the poll and event tasks. Data fetched for one
    /// address is never displayed under another.
    pub async fn set_account(&self, account: Option<Address>) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.abort_tasks();

        *self.inner.account.write().await = account.clone();
        *self.inner.snapshot.write().await = None;
        *self.inner.last_error.write().await = None;
        self.inner.invalidated.store(false, Ordering::SeqCst);
        self.inner.published.send_replace(None);

        if let Some(account) = account {
            tracing::info!(account = %account, "Synchronizing account");
            self.spawn_poll_loop();
            self.spawn_event_loop(account);
        }
    }

    /// Mark the cached snapshot stale without dropping it.
    ///
    /// The next refresh goes to the network; readers keep seeing the old
    /// value until the replacement lands.
    pub fn invalidate(&self) {
        self.inner.invalidated.store(true, Ordering::SeqCst);
    }

    /// Fetch the latest snapshot, coalescing with any refresh already in
    /// flight.
    ///
    /// Callers that arrive while a read is outstanding wait for it and share
    /// its result instead of issuing a second read. Responses that arrive
    /// after an account switch are discarded. Read failures keep the last
    /// good snapshot and surface through [`last_error`](Self::last_error).
    pub async fn refresh(&self) -> Result<Option<AccountSnapshot>, GatewayError> {
        let account = match self.inner.account.read().await.clone() {
            Some(account) => account,
            None => return Ok(None),
        };
        let epoch = self.inner.epoch.load(Ordering::SeqCst);

        if let Some(current) = self.fresh_snapshot().await {
            return Ok(Some(current));
        }

        let _guard = self.inner.inflight.lock().await;

        // A refresh that completed while we queued on the guard counts as ours
        if let Some(current) = self.fresh_snapshot().await {
            return Ok(Some(current));
        }

        let result = timed(self.inner.gateway.read_snapshot(&account)).await;

        if self.inner.epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!(account = %account, "Discarding snapshot for a previous wallet");
            return Ok(None);
        }

        match result {
            Ok(raw) => {
                let snapshot = AccountSnapshot::from_raw(&raw);
                self.inner.invalidated.store(false, Ordering::SeqCst);
                *self.inner.snapshot.write().await = Some(snapshot.clone());
                *self.inner.last_error.write().await = None;
                self.inner.published.send_replace(Some(snapshot.clone()));
                Ok(Some(snapshot))
            }
            Err(err) => {
                tracing::warn!(account = %account, "Snapshot read failed: {}", err);
                *self.inner.last_error.write().await = Some(err.to_string());
                Err(err)
            }
        }
    }

    async fn fresh_snapshot(&self) -> Option<AccountSnapshot> {
        if self.inner.invalidated.load(Ordering::SeqCst) {
            return None;
        }
        let guard = self.inner.snapshot.read().await;
        guard
            .as_ref()
            .filter(|s| s.is_fresh(self.inner.config.stale_after))
            .cloned()
    }

    fn spawn_poll_loop(&self) {
        let sync = self.clone();
        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(sync.inner.config.poll_interval).await;
                if sync.inner.epoch.load(Ordering::SeqCst) != epoch {
                    break;
                }
                if let Err(err) = sync.refresh().await {
                    tracing::debug!("Scheduled snapshot poll failed: {}", err);
                }
            }
        });
        self.inner.tasks.lock().unwrap().push(handle);
    }

    fn spawn_event_loop(&self, account: Address) {
        let sync = self.clone();
        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        let filter = EventFilter::for_account(account);
        let mut rx = self.inner.gateway.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if sync.inner.epoch.load(Ordering::SeqCst) != epoch {
                            break;
                        }
                        if !filter.matches(&event) {
                            continue;
                        }
                        tracing::debug!(kind = %event.kind, tx = %event.tx_hash, "Pool event; refreshing snapshot");
                        sync.invalidate();
                        if let Err(err) = sync.refresh().await {
                            tracing::warn!("Event-triggered refresh failed: {}", err);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Event stream lagged by {} events; refreshing", skipped);
                        sync.invalidate();
                        let _ = sync.refresh().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        self.inner.tasks.lock().unwrap().push(handle);
    }

    fn abort_tasks(&self) {
        for task in self.inner.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}

impl Drop for SyncInner {
    fn drop(&mut self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_gateway::mock::MockLedger;
    use ledger_gateway::{AccountSnapshotRaw, PoolEvent};
    use palisade_core::constants::WAD;
    use palisade_core::{OperationKind, TxHash};

    fn raw(collateral: u128) -> AccountSnapshotRaw {
        AccountSnapshotRaw {
            total_collateral_value: collateral,
            total_debt_value: WAD,
            available_borrow_value: 2 * WAD,
            liquidation_threshold_bps: 8_000,
            loan_to_value_bps: 7_000,
            health_factor_wad: 3 * WAD,
        }
    }

    fn quiet_config() -> SyncConfig {
        // Poll far enough out that tests control every read explicitly
        SyncConfig {
            poll_interval: Duration::from_secs(10_000),
            stale_after: Duration::from_secs(2),
        }
    }

    fn setup(config: SyncConfig) -> (Arc<MockLedger>, AccountSync, Address) {
        let ledger = Arc::new(MockLedger::new());
        let account = Address::new("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        ledger.set_snapshot(&account, raw(10 * WAD));
        let sync = AccountSync::new(ledger.clone(), config);
        (ledger, sync, account)
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_populates_snapshot() {
        let (ledger, sync, account) = setup(quiet_config());
        sync.set_account(Some(account.clone())).await;

        let snapshot = sync.refresh().await.unwrap().unwrap();
        assert_eq!(snapshot.total_collateral_value, 10 * WAD);
        assert_eq!(ledger.snapshot_reads(&account), 1);
        assert_eq!(sync.snapshot().await, Some(snapshot));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_without_account_is_a_no_op() {
        let (ledger, sync, account) = setup(quiet_config());
        assert_eq!(sync.refresh().await.unwrap(), None);
        assert_eq!(ledger.snapshot_reads(&account), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_snapshot_served_without_read() {
        let (ledger, sync, account) = setup(quiet_config());
        sync.set_account(Some(account.clone())).await;

        sync.refresh().await.unwrap();
        sync.refresh().await.unwrap();
        assert_eq!(ledger.snapshot_reads(&account), 1);

        // Past the staleness window the next refresh reads again
        tokio::time::advance(Duration::from_secs(3)).await;
        sync.refresh().await.unwrap();
        assert_eq!(ledger.snapshot_reads(&account), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refreshes_coalesce() {
        let (ledger, sync, account) = setup(quiet_config());
        sync.set_account(Some(account.clone())).await;
        ledger.set_read_delay(Some(Duration::from_secs(1)));

        let (a, b) = tokio::join!(sync.refresh(), sync.refresh());
        let a = a.unwrap().unwrap();
        let b = b.unwrap().unwrap();

        assert_eq!(ledger.snapshot_reads(&account), 1);
        assert_eq!(a, b);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_keeps_last_good_snapshot() {
        let (ledger, sync, account) = setup(quiet_config());
        sync.set_account(Some(account.clone())).await;

        let good = sync.refresh().await.unwrap().unwrap();

        tokio::time::advance(Duration::from_secs(3)).await;
        ledger.set_fail_reads(true);
        assert!(sync.refresh().await.is_err());

        assert_eq!(sync.snapshot().await, Some(good));
        assert!(sync.last_error().await.unwrap().contains("snapshot read failed"));

        // Recovery clears the error
        ledger.set_fail_reads(false);
        tokio::time::advance(Duration::from_secs(3)).await;
        sync.refresh().await.unwrap();
        assert_eq!(sync.last_error().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_network_read() {
        let (ledger, sync, account) = setup(quiet_config());
        sync.set_account(Some(account.clone())).await;

        sync.refresh().await.unwrap();
        sync.invalidate();

        // Still inside the staleness window, but invalidated
        sync.refresh().await.unwrap();
        assert_eq!(ledger.snapshot_reads(&account), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wallet_switch_discards_in_flight_response() {
        let (ledger, sync, account_a) = setup(quiet_config());
        let account_b = Address::new("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
        ledger.set_snapshot(&account_b, raw(77 * WAD));

        sync.set_account(Some(account_a.clone())).await;
        ledger.set_read_delay(Some(Duration::from_secs(5)));

        let slow = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.refresh().await })
        };
        // Let the read for A get in flight, then switch wallets
        tokio::time::sleep(Duration::from_millis(10)).await;
        ledger.set_read_delay(None);
        sync.set_account(Some(account_b.clone())).await;

        // A's response arrives after the switch and is dropped
        assert_eq!(slow.await.unwrap().unwrap(), None);
        assert_eq!(sync.snapshot().await, None);

        let snapshot = sync.refresh().await.unwrap().unwrap();
        assert_eq!(snapshot.total_collateral_value, 77 * WAD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_rereads_on_interval() {
        let config = SyncConfig {
            poll_interval: Duration::from_secs(5),
            stale_after: Duration::from_secs(2),
        };
        let (ledger, sync, account) = setup(config);
        sync.set_account(Some(account.clone())).await;

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(ledger.snapshot_reads(&account), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ledger.snapshot_reads(&account), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_event_triggers_refresh() {
        let (ledger, sync, account) = setup(quiet_config());
        sync.set_account(Some(account.clone())).await;
        sync.refresh().await.unwrap();

        ledger.emit(PoolEvent {
            kind: OperationKind::Deposit,
            account: account.clone(),
            asset: Address::new("0xusdc"),
            amount: 1_000_000,
            tx_hash: TxHash::new("0xdead"),
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Event invalidated the fresh cache and re-read
        assert_eq!(ledger.snapshot_reads(&account), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_event_is_ignored() {
        let (ledger, sync, account) = setup(quiet_config());
        sync.set_account(Some(account.clone())).await;
        sync.refresh().await.unwrap();

        ledger.emit(PoolEvent {
            kind: OperationKind::Borrow,
            account: Address::new("0xcccccccccccccccccccccccccccccccccccccccc"),
            asset: Address::new("0xusdc"),
            amount: 5,
            tx_hash: TxHash::new("0xbeef"),
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(ledger.snapshot_reads(&account), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_clears_published_snapshot() {
        let (_ledger, sync, account) = setup(quiet_config());
        let mut rx = sync.subscribe();

        sync.set_account(Some(account.clone())).await;
        sync.refresh().await.unwrap();
        assert!(rx.borrow_and_update().is_some());

        sync.set_account(None).await;
        assert!(rx.borrow_and_update().is_none());
        assert_eq!(sync.snapshot().await, None);
    }
}
