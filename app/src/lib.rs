//! Palisade dashboard orchestration
//!
//! Wires the ledger gateway and wallet session into the pieces a lending
//! dashboard needs: validated session state, the transaction workflow
//! engine, the account state synchronizer, the oracle price feed, and the
//! transaction history.

pub mod history;
pub mod price;
pub mod session;
pub mod sync;
pub mod workflow;

use std::sync::Arc;

use ledger_gateway::{LedgerGateway, WalletSession};
use palisade_core::{Address, AppConfig, Error, OperationKind, Result};
use uuid::Uuid;

pub use history::{TxHistory, TxRecord};
pub use price::PriceFeed;
pub use session::{Session, WalletState};
pub use sync::{AccountSync, SyncConfig};
pub use workflow::{Operation, WorkflowConfig, WorkflowEngine, WorkflowState};

/// Install the tracing subscriber for an embedding application.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("palisade=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .init();
}

/// The assembled dashboard core
pub struct Dashboard {
    pub session: Session,
    pub sync: AccountSync,
    pub price: PriceFeed,
    pub history: TxHistory,
    pub workflow: WorkflowEngine,
}

impl Dashboard {
    pub fn new(gateway: Arc<dyn LedgerGateway>, wallet: Arc<dyn WalletSession>) -> Self {
        let session = Session::new(gateway.clone(), AppConfig::default());
        let sync = AccountSync::new(gateway.clone(), SyncConfig::default());
        let quote_asset =
            lending::constants::asset("USDC").unwrap_or(&lending::constants::sepolia::ASSETS[0]);
        let price = PriceFeed::new(gateway.clone(), quote_asset);
        let history = TxHistory::new(gateway.clone());
        let workflow = WorkflowEngine::new(gateway, wallet, sync.clone(), WorkflowConfig::default());
        Self {
            session,
            sync,
            price,
            history,
            workflow,
        }
    }

    /// Connect a wallet and fan the account out to every consumer.
    pub async fn connect(&self, address: Address) -> Result<()> {
        self.session.set_wallet(address.clone()).await?;
        self.sync.set_account(Some(address.clone())).await;
        self.history.set_account(Some(address));
        self.price.start();

        // Prime the snapshot; a failure surfaces as a banner, not an error
        if let Err(err) = self.sync.refresh().await {
            tracing::warn!("Initial snapshot read failed: {}", err);
        }
        Ok(())
    }

    /// Disconnect the wallet and clear everything tied to it.
    pub async fn disconnect(&self) {
        self.session.disconnect_wallet().await;
        self.sync.set_account(None).await;
        self.history.set_account(None);
    }

    /// Validate and launch one pool operation by asset symbol.
    pub fn submit(&self, kind: OperationKind, asset_symbol: &str, amount: &str) -> Result<Uuid> {
        let asset = lending::constants::asset(asset_symbol)
            .ok_or_else(|| Error::Config(format!("Unknown asset: {}", asset_symbol)))?;
        Ok(self.workflow.submit(kind, asset, amount)?)
    }
}
