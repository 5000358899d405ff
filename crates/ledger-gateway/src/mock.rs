//! Scriptable in-memory gateway and wallet.
//!
//! Backs the workflow-engine and synchronizer tests: confirmations are
//! planned per submission, snapshot reads can be delayed or failed, and
//! every call is recorded so tests can assert submission ordering.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use palisade_core::{Address, GatewayError, ScaledAmount, SignError, TxHash};
use tokio::sync::broadcast;

use crate::events::{PoolEvent, EVENT_CHANNEL_CAPACITY};
use crate::{
    AccountSnapshotRaw, ConfirmationStatus, LedgerGateway, OperationHandle, OperationRequest,
    Result, SignedOperation, StepKind, WalletSession,
};

/// A single recorded gateway call
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Submit {
        step: StepKind,
        account: Address,
        amount: ScaledAmount,
    },
    Confirmation { tx_hash: TxHash },
    ReadSnapshot { account: Address },
    ReadAssetPrice { asset: Address },
}

/// How the mock resolves one submitted operation's confirmation feed
#[derive(Debug, Clone)]
pub enum ConfirmationPlan {
    /// Report `Pending` for the given number of polls, then `Confirmed`.
    ConfirmAfter(u32),
    /// Report `Reverted` with the given reason on every poll.
    Revert(String),
    /// Report `Pending` forever; only a fallback timer moves the caller on.
    StayPending,
}

struct HandleState {
    plan: ConfirmationPlan,
    polls: u32,
}

#[derive(Default)]
struct MockState {
    plans: VecDeque<ConfirmationPlan>,
    handles: HashMap<String, HandleState>,
    snapshots: HashMap<String, AccountSnapshotRaw>,
    prices: HashMap<String, ScaledAmount>,
    read_delay: Option<Duration>,
    fail_reads: bool,
    next_submit_error: Option<String>,
}

pub struct MockLedger {
    state: Mutex<MockState>,
    calls: Mutex<Vec<GatewayCall>>,
    next_tx: AtomicU64,
    events: broadcast::Sender<PoolEvent>,
}

impl MockLedger {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(MockState::default()),
            calls: Mutex::new(Vec::new()),
            next_tx: AtomicU64::new(1),
            events,
        }
    }

    /// Queue the confirmation plan for the next submitted operation.
    /// Submissions without a queued plan confirm on the first poll.
    pub fn plan_confirmation(&self, plan: ConfirmationPlan) {
        self.state.lock().unwrap().plans.push_back(plan);
    }

    pub fn set_snapshot(&self, account: &Address, raw: AccountSnapshotRaw) {
        self.state
            .lock()
            .unwrap()
            .snapshots
            .insert(account.as_str().to_string(), raw);
    }

    pub fn set_price(&self, asset: &Address, price: ScaledAmount) {
        self.state
            .lock()
            .unwrap()
            .prices
            .insert(asset.as_str().to_string(), price);
    }

    /// Delay every snapshot/price read by `delay` before responding.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().read_delay = delay;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    /// Make the next `submit` fail with a gateway error.
    pub fn fail_next_submit(&self, message: impl Into<String>) {
        self.state.lock().unwrap().next_submit_error = Some(message.into());
    }

    /// Inject a pool event into the broadcast stream.
    pub fn emit(&self, event: PoolEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Submitted steps in submission order.
    pub fn submitted_steps(&self) -> Vec<StepKind> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::Submit { step, .. } => Some(step),
                _ => None,
            })
            .collect()
    }

    /// Number of snapshot reads issued for `account`.
    pub fn snapshot_reads(&self, account: &Address) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::ReadSnapshot { account: a } if a == account))
            .count()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn submit(&self, op: &SignedOperation) -> Result<OperationHandle> {
        self.record(GatewayCall::Submit {
            step: op.request.step,
            account: op.request.account.clone(),
            amount: op.request.amount,
        });

        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.next_submit_error.take() {
            return Err(GatewayError::ApiError { message });
        }

        let n = self.next_tx.fetch_add(1, Ordering::SeqCst);
        let tx_hash = TxHash::new(format!("0xmock{:04}", n));
        let plan = state
            .plans
            .pop_front()
            .unwrap_or(ConfirmationPlan::ConfirmAfter(0));
        state
            .handles
            .insert(tx_hash.as_str().to_string(), HandleState { plan, polls: 0 });

        Ok(OperationHandle { tx_hash })
    }

    async fn confirmation(&self, handle: &OperationHandle) -> Result<ConfirmationStatus> {
        self.record(GatewayCall::Confirmation {
            tx_hash: handle.tx_hash.clone(),
        });

        let mut state = self.state.lock().unwrap();
        let entry = state
            .handles
            .get_mut(handle.tx_hash.as_str())
            .ok_or_else(|| GatewayError::ApiError {
                message: format!("unknown operation handle: {}", handle.tx_hash),
            })?;

        entry.polls += 1;
        let status = match &entry.plan {
            ConfirmationPlan::ConfirmAfter(n) => {
                if entry.polls > *n {
                    ConfirmationStatus::Confirmed
                } else {
                    ConfirmationStatus::Pending
                }
            }
            ConfirmationPlan::Revert(reason) => ConfirmationStatus::Reverted {
                reason: reason.clone(),
            },
            ConfirmationPlan::StayPending => ConfirmationStatus::Pending,
        };
        Ok(status)
    }

    async fn read_snapshot(&self, account: &Address) -> Result<AccountSnapshotRaw> {
        self.record(GatewayCall::ReadSnapshot {
            account: account.clone(),
        });

        let delay = self.state.lock().unwrap().read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(GatewayError::ApiError {
                message: "snapshot read failed".to_string(),
            });
        }
        state
            .snapshots
            .get(account.as_str())
            .cloned()
            .ok_or_else(|| GatewayError::ApiError {
                message: format!("no snapshot for {}", account),
            })
    }

    async fn read_asset_price(&self, asset: &Address) -> Result<ScaledAmount> {
        self.record(GatewayCall::ReadAssetPrice {
            asset: asset.clone(),
        });

        let delay = self.state.lock().unwrap().read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(GatewayError::ApiError {
                message: "price read failed".to_string(),
            });
        }
        state
            .prices
            .get(asset.as_str())
            .copied()
            .ok_or_else(|| GatewayError::ApiError {
                message: format!("no price for {}", asset),
            })
    }

    fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.events.subscribe()
    }
}

pub struct MockWallet {
    account: Mutex<Option<Address>>,
    reject: AtomicBool,
    sign_delay: Mutex<Option<Duration>>,
    signatures: AtomicU64,
}

impl MockWallet {
    pub fn connected(account: Address) -> Self {
        Self {
            account: Mutex::new(Some(account)),
            reject: AtomicBool::new(false),
            sign_delay: Mutex::new(None),
            signatures: AtomicU64::new(1),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            account: Mutex::new(None),
            reject: AtomicBool::new(false),
            sign_delay: Mutex::new(None),
            signatures: AtomicU64::new(1),
        }
    }

    /// Make every subsequent `sign` call behave as a user decline.
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Delay every `sign` call, simulating a user staring at the prompt.
    pub fn set_sign_delay(&self, delay: Option<Duration>) {
        *self.sign_delay.lock().unwrap() = delay;
    }

    pub fn disconnect(&self) {
        *self.account.lock().unwrap() = None;
    }
}

#[async_trait]
impl WalletSession for MockWallet {
    fn account(&self) -> Option<Address> {
        self.account.lock().unwrap().clone()
    }

    async fn sign(
        &self,
        request: &OperationRequest,
    ) -> std::result::Result<SignedOperation, SignError> {
        let delay = *self.sign_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.account.lock().unwrap().is_none() {
            return Err(SignError::NotConnected);
        }
        if self.reject.load(Ordering::SeqCst) {
            return Err(SignError::Rejected);
        }

        let n = self.signatures.fetch_add(1, Ordering::SeqCst);
        Ok(SignedOperation {
            request: request.clone(),
            signature: format!("0xsig{:04}", n),
        })
    }
}
