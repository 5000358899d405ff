//! Application session state shared across the dashboard

use std::sync::Arc;
use std::time::Instant;

use ledger_gateway::LedgerGateway;
use palisade_core::{Address, AppConfig, Network, SessionError};
use tokio::sync::RwLock;

/// State representing a connected wallet.
///
/// The address is stored in standard 0x-prefixed hex form.
#[derive(Clone, Debug)]
pub struct WalletState {
    pub address: Address,
    /// When the wallet was connected
    pub connected_at: Instant,
}

impl WalletState {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            connected_at: Instant::now(),
        }
    }
}

/// Validate that an address has the canonical wallet address format.
///
/// This performs format validation only:
/// - "0x" prefix
/// - exactly 40 hex characters after the prefix
///
/// It does not checksum the address; the wallet is the authority on what it
/// actually controls.
fn validate_wallet_address(address: &Address) -> Result<(), SessionError> {
    let s = address.as_str();

    if !s.starts_with("0x") {
        return Err(SessionError::InvalidAddress {
            reason: "Address must start with '0x'".to_string(),
        });
    }

    let body = &s[2..];
    if body.len() != 40 {
        return Err(SessionError::InvalidAddress {
            reason: format!("Expected 40 hex characters, got {}", body.len()),
        });
    }

    if let Some(c) = body.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(SessionError::InvalidAddress {
            reason: format!("Invalid hex character '{}' in address", c),
        });
    }

    Ok(())
}

/// Shared application session
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: RwLock<AppConfig>,
    gateway: Arc<dyn LedgerGateway>,
    wallet: RwLock<Option<WalletState>>,
}

impl Session {
    pub fn new(gateway: Arc<dyn LedgerGateway>, config: AppConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config: RwLock::new(config),
                gateway,
                wallet: RwLock::new(None),
            }),
        }
    }

    /// Get current config
    pub async fn config(&self) -> AppConfig {
        self.inner.config.read().await.clone()
    }

    /// Get current network
    pub async fn network(&self) -> Network {
        self.inner.config.read().await.network
    }

    /// The gateway this session talks to
    pub fn gateway(&self) -> Arc<dyn LedgerGateway> {
        self.inner.gateway.clone()
    }

    /// Get current wallet state
    pub async fn wallet(&self) -> Option<WalletState> {
        self.inner.wallet.read().await.clone()
    }

    /// The connected account, if any
    pub async fn account(&self) -> Option<Address> {
        self.inner.wallet.read().await.as_ref().map(|w| w.address.clone())
    }

    /// Set the connected wallet with address validation.
    ///
    /// # Errors
    /// Returns `SessionError::InvalidAddress` if the address format is invalid.
    pub async fn set_wallet(&self, address: Address) -> Result<(), SessionError> {
        validate_wallet_address(&address)?;
        tracing::info!(address = %address, "Wallet connected");
        let mut wallet = self.inner.wallet.write().await;
        *wallet = Some(WalletState::new(address));
        Ok(())
    }

    /// Disconnect wallet (clear wallet state)
    pub async fn disconnect_wallet(&self) {
        let mut wallet = self.inner.wallet.write().await;
        if wallet.take().is_some() {
            tracing::info!("Wallet disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_gateway::mock::MockLedger;

    fn session() -> Session {
        Session::new(Arc::new(MockLedger::new()), AppConfig::default())
    }

    #[tokio::test]
    async fn test_set_wallet_validates_format() {
        let session = session();

        let good = Address::new("0x742d35cc6634c0532925a3b844bc9e7595f2bd18");
        session.set_wallet(good.clone()).await.unwrap();
        assert_eq!(session.account().await, Some(good));
    }

    #[tokio::test]
    async fn test_set_wallet_rejects_bad_addresses() {
        let session = session();

        for bad in [
            "742d35cc6634c0532925a3b844bc9e7595f2bd18",   // no prefix
            "0x742d35cc",                                  // too short
            "0x742d35cc6634c0532925a3b844bc9e7595f2bdzz", // non-hex
        ] {
            let err = session.set_wallet(Address::new(bad)).await.unwrap_err();
            assert!(matches!(err, SessionError::InvalidAddress { .. }));
        }
        assert_eq!(session.account().await, None);
    }

    #[tokio::test]
    async fn test_disconnect_clears_wallet() {
        let session = session();
        let address = Address::new("0x742d35cc6634c0532925a3b844bc9e7595f2bd18");

        session.set_wallet(address).await.unwrap();
        session.disconnect_wallet().await;
        assert!(session.wallet().await.is_none());
    }

    #[tokio::test]
    async fn test_default_network() {
        assert_eq!(session().network().await, Network::Sepolia);
    }
}
