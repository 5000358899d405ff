//! Oracle price feed
//!
//! Slow-polls the price oracle for the quote asset and caches the result.
//! Prices move rarely compared to account state, so the interval is long;
//! consumers convert displayed magnitudes with the cached quote.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ledger_gateway::{timed, LedgerGateway};
use lending::constants::AssetConfig;
use lending::oracle;
use palisade_core::{Address, GatewayError, ScaledAmount};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// How often the oracle is re-queried (seconds).
const PRICE_POLL_INTERVAL_SECS: u64 = 300;

/// Cached oracle quote for one asset
#[derive(Clone)]
pub struct PriceFeed {
    inner: Arc<PriceInner>,
}

struct PriceInner {
    gateway: Arc<dyn LedgerGateway>,
    asset: &'static AssetConfig,
    poll_interval: Duration,
    /// Latest quote in the pool's base currency (WAD); stale-but-available
    /// on read failure
    quote: RwLock<Option<ScaledAmount>>,
    polling: AtomicBool,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl PriceFeed {
    pub fn new(gateway: Arc<dyn LedgerGateway>, asset: &'static AssetConfig) -> Self {
        Self::with_interval(gateway, asset, Duration::from_secs(PRICE_POLL_INTERVAL_SECS))
    }

    pub fn with_interval(
        gateway: Arc<dyn LedgerGateway>,
        asset: &'static AssetConfig,
        poll_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(PriceInner {
                gateway,
                asset,
                poll_interval,
                quote: RwLock::new(None),
                polling: AtomicBool::new(false),
                task: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Start the recurring poll. Idempotent.
    pub fn start(&self) {
        if self.inner.polling.swap(true, Ordering::SeqCst) {
            return; // Already running
        }

        let feed = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                if let Err(err) = feed.refresh().await {
                    tracing::warn!(asset = feed.inner.asset.symbol, "Oracle read failed: {}", err);
                }
                tokio::time::sleep(feed.inner.poll_interval).await;
            }
        });
        *self.inner.task.lock().unwrap() = Some(handle);
    }

    pub fn stop(&self) {
        if let Some(task) = self.inner.task.lock().unwrap().take() {
            task.abort();
        }
        self.inner.polling.store(false, Ordering::SeqCst);
    }

    /// Re-query the oracle once. Failures keep the last good quote.
    pub async fn refresh(&self) -> Result<ScaledAmount, GatewayError> {
        let asset = Address::new(self.inner.asset.address);
        let quote = timed(self.inner.gateway.read_asset_price(&asset)).await?;
        *self.inner.quote.write().await = Some(quote);
        Ok(quote)
    }

    /// Latest raw quote (asset priced in the pool's base currency, WAD).
    pub async fn quote(&self) -> Option<ScaledAmount> {
        *self.inner.quote.read().await
    }

    /// USD per ETH derived from the stablecoin quote; `None` until the first
    /// successful read.
    pub async fn usd_per_eth(&self) -> Option<f64> {
        self.quote().await.and_then(oracle::usd_per_eth)
    }
}

impl Drop for PriceInner {
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
    use palisade_core::constants::WAD;

    fn usdc() -> &'static AssetConfig {
        lending::constants::asset("USDC").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_caches_quote() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_price(&Address::new(usdc().address), WAD / 2000);
        let feed = PriceFeed::new(ledger.clone(), usdc());

        assert_eq!(feed.usd_per_eth().await, None);
        feed.refresh().await.unwrap();
        assert_eq!(feed.usd_per_eth().await, Some(2000.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_last_quote() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_price(&Address::new(usdc().address), WAD / 2000);
        let feed = PriceFeed::new(ledger.clone(), usdc());

        feed.refresh().await.unwrap();
        ledger.set_fail_reads(true);
        assert!(feed.refresh().await.is_err());
        assert_eq!(feed.usd_per_eth().await, Some(2000.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_tracks_oracle_updates() {
        let ledger = Arc::new(MockLedger::new());
        let asset_addr = Address::new(usdc().address);
        ledger.set_price(&asset_addr, WAD / 2000);
        let feed = PriceFeed::with_interval(ledger.clone(), usdc(), Duration::from_secs(300));

        feed.start();
        feed.start(); // Idempotent
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(feed.usd_per_eth().await, Some(2000.0));

        ledger.set_price(&asset_addr, WAD / 2500);
        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(feed.usd_per_eth().await, Some(2500.0));

        feed.stop();
    }
}
