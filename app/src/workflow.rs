//! Transaction workflow engine
//!
//! Drives one user-initiated pool operation through its remote steps: sign,
//! submit, await confirmation - twice for operations that need a token
//! approval first. One engine instance backs one action dialog; every state
//! transition is published on a watch channel so the dialog can render
//! progress. The same parameterized sequence serves all four operation
//! kinds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ledger_gateway::{
    ConfirmationStatus, LedgerGateway, OperationHandle, OperationRequest, StepKind, WalletSession,
};
use lending::constants::AssetConfig;
use lending::normalize;
use palisade_core::{Address, OperationKind, ScaledAmount, SignError, WorkflowError};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::sync::AccountSync;

/// How often an awaited confirmation is polled (seconds).
const CONFIRMATION_POLL_SECS: u64 = 3;

/// Fallback window per confirmation wait (seconds). If the feed neither
/// confirms nor fails within this long, the step is treated as confirmed.
const CONFIRMATION_FALLBACK_SECS: u64 = 30;

/// Delay before the extra post-success refresh that absorbs indexer lag (seconds).
const POST_SUCCESS_REFRESH_DELAY_SECS: u64 = 1;

/// How long the success state stays visible before resetting to idle (seconds).
const SUCCESS_DISPLAY_SECS: u64 = 3;

// ─── Types ───────────────────────────────────────────────────────────────────

/// Progress of one in-flight operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    AwaitingApprovalSignature,
    AwaitingApprovalConfirmation,
    AwaitingActionSignature,
    AwaitingActionConfirmation,
    Succeeded,
    Failed(String),
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingApprovalSignature => "awaiting_approval_signature",
            Self::AwaitingApprovalConfirmation => "awaiting_approval_confirmation",
            Self::AwaitingActionSignature => "awaiting_action_signature",
            Self::AwaitingActionConfirmation => "awaiting_action_confirmation",
            Self::Succeeded => "succeeded",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }

    /// Cancellation is only allowed before a ledger call is outstanding.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            Self::Idle | Self::AwaitingApprovalSignature | Self::AwaitingActionSignature
        )
    }
}

/// One user-requested action, alive for the duration of its workflow
#[derive(Debug, Clone)]
pub struct Operation {
    pub id: Uuid,
    pub kind: OperationKind,
    pub asset: &'static AssetConfig,
    pub amount: ScaledAmount,
    pub account: Address,
}

/// Workflow tuning
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub confirmation_poll: Duration,
    pub confirmation_fallback: Duration,
    pub post_success_refresh_delay: Duration,
    pub success_display: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            confirmation_poll: Duration::from_secs(CONFIRMATION_POLL_SECS),
            confirmation_fallback: Duration::from_secs(CONFIRMATION_FALLBACK_SECS),
            post_success_refresh_delay: Duration::from_secs(POST_SUCCESS_REFRESH_DELAY_SECS),
            success_display: Duration::from_secs(SUCCESS_DISPLAY_SECS),
        }
    }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct WorkflowEngine {
    inner: Arc<EngineInner>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

struct EngineInner {
    gateway: Arc<dyn LedgerGateway>,
    wallet: Arc<dyn WalletSession>,
    sync: AccountSync,
    config: WorkflowConfig,
    state: watch::Sender<WorkflowState>,
    /// Bumped on submit, cancel, and reset. Transitions carry the epoch they
    /// were started under; a stale epoch means the operation was abandoned
    /// and its late signals must not touch the current state.
    epoch: AtomicU64,
}

impl WorkflowEngine {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        wallet: Arc<dyn WalletSession>,
        sync: AccountSync,
        config: WorkflowConfig,
    ) -> Self {
        let (state, _) = watch::channel(WorkflowState::Idle);
        Self {
            inner: Arc::new(EngineInner {
                gateway,
                wallet,
                sync,
                config,
                state,
                epoch: AtomicU64::new(0),
            }),
            task: std::sync::Mutex::new(None),
        }
    }

    /// Receive every state transition.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> WorkflowState {
        self.inner.state.borrow().clone()
    }

    /// Validate and launch one operation.
    ///
    /// Validation failures surface synchronously and never reach the
    /// gateway. On success the workflow runs in the background; watch the
    /// state channel for progress.
    pub fn submit(
        &self,
        kind: OperationKind,
        asset: &'static AssetConfig,
        amount: &str,
    ) -> Result<Uuid, WorkflowError> {
        if self.state() != WorkflowState::Idle {
            return Err(WorkflowError::Busy);
        }

        let amount = normalize(amount, asset)?;
        let account = match self.inner.wallet.account() {
            Some(account) => account,
            None => return Err(SignError::NotConnected.into()),
        };

        let operation = Operation {
            id: Uuid::new_v4(),
            kind,
            asset,
            amount,
            account,
        };
        tracing::info!(
            operation = %operation.id,
            kind = %kind,
            asset = asset.symbol,
            amount,
            "Submitting operation"
        );

        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        // Enter the first signing state synchronously so a second submit in
        // the same tick observes a busy engine
        let first = if kind.requires_approval() {
            WorkflowState::AwaitingApprovalSignature
        } else {
            WorkflowState::AwaitingActionSignature
        };
        self.inner.state.send_replace(first);

        let id = operation.id;
        let inner = self.inner.clone();
        let handle = tokio::spawn(drive(inner, operation, epoch));
        *self.task.lock().unwrap() = Some(handle);

        Ok(id)
    }

    /// Abandon the current operation.
    ///
    /// Only allowed while no ledger call is outstanding; once a step has
    /// been signed it cannot be retracted.
    pub fn cancel(&self) -> Result<(), WorkflowError> {
        if !self.state().can_cancel() {
            return Err(WorkflowError::NotCancellable);
        }
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
        self.inner.state.send_replace(WorkflowState::Idle);
        Ok(())
    }

    /// Acknowledge a terminal state and return to idle.
    pub fn reset(&self) {
        if !self.state().is_terminal() {
            return;
        }
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
        self.inner.state.send_replace(WorkflowState::Idle);
    }
}

impl Drop for WorkflowEngine {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
    }
}

impl EngineInner {
    /// Publish `next` unless the operation was abandoned in the meantime.
    fn transition(&self, epoch: u64, next: WorkflowState) -> bool {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        tracing::debug!(state = next.as_str(), "Workflow transition");
        self.state.send_replace(next);
        true
    }
}

// ─── Driving task ────────────────────────────────────────────────────────────

async fn drive(inner: Arc<EngineInner>, operation: Operation, epoch: u64) {
    if let Err(err) = run_operation(&inner, &operation, epoch).await {
        let reason = err.to_string();
        tracing::warn!(operation = %operation.id, kind = %operation.kind, "Operation failed: {}", reason);
        inner.transition(epoch, WorkflowState::Failed(reason));
    }
}

async fn run_operation(
    inner: &Arc<EngineInner>,
    operation: &Operation,
    epoch: u64,
) -> Result<(), WorkflowError> {
    let steps: Vec<StepKind> = if operation.kind.requires_approval() {
        vec![StepKind::Approve, StepKind::Execute(operation.kind)]
    } else {
        vec![StepKind::Execute(operation.kind)]
    };

    for (index, step) in steps.iter().enumerate() {
        let (signing, confirming) = step_states(step);

        // The first signing state was already published by `submit`
        if index > 0 && !inner.transition(epoch, signing) {
            return Ok(());
        }

        let request = OperationRequest {
            step: *step,
            asset: Address::new(operation.asset.address),
            amount: operation.amount,
            account: operation.account.clone(),
        };
        let signed = inner.wallet.sign(&request).await?;
        let handle = inner.gateway.submit(&signed).await?;
        tracing::debug!(step = step.as_str(), tx = %handle.tx_hash, "Step submitted");

        if !inner.transition(epoch, confirming) {
            return Ok(());
        }
        if let ConfirmationStatus::Reverted { reason } = await_confirmation(inner, &handle).await? {
            return Err(WorkflowError::Reverted { reason });
        }
    }

    if !inner.transition(epoch, WorkflowState::Succeeded) {
        return Ok(());
    }
    tracing::info!(operation = %operation.id, kind = %operation.kind, "Operation succeeded");
    finish_success(inner, epoch).await;
    Ok(())
}

fn step_states(step: &StepKind) -> (WorkflowState, WorkflowState) {
    match step {
        StepKind::Approve => (
            WorkflowState::AwaitingApprovalSignature,
            WorkflowState::AwaitingApprovalConfirmation,
        ),
        StepKind::Execute(_) => (
            WorkflowState::AwaitingActionSignature,
            WorkflowState::AwaitingActionConfirmation,
        ),
    }
}

/// Wait for the confirmation feed to resolve `handle`.
///
/// Polls the specific handle returned at submission; elapsed time alone is
/// never the primary signal. The fallback timer covers an unresponsive
/// feed: when it fires first, the step counts as confirmed. A real signal
/// cancels the timer by resolving the wait, and nothing polls the handle
/// afterwards, so a confirmation arriving after the fallback is ignored.
async fn await_confirmation(
    inner: &EngineInner,
    handle: &OperationHandle,
) -> Result<ConfirmationStatus, WorkflowError> {
    let fallback = tokio::time::sleep(inner.config.confirmation_fallback);
    tokio::pin!(fallback);

    loop {
        tokio::select! {
            _ = &mut fallback => {
                tracing::warn!(
                    tx = %handle.tx_hash,
                    "No confirmation signal within {}s; treating step as confirmed",
                    inner.config.confirmation_fallback.as_secs()
                );
                return Ok(ConfirmationStatus::Confirmed);
            }
            status = poll_confirmation(inner, handle) => {
                match status? {
                    ConfirmationStatus::Pending => continue,
                    terminal => return Ok(terminal),
                }
            }
        }
    }
}

async fn poll_confirmation(
    inner: &EngineInner,
    handle: &OperationHandle,
) -> Result<ConfirmationStatus, WorkflowError> {
    let status = inner.gateway.confirmation(handle).await?;
    if status == ConfirmationStatus::Pending {
        tokio::time::sleep(inner.config.confirmation_poll).await;
    }
    Ok(status)
}

/// Post-success choreography: refresh the account data behind the dialog,
/// schedule a second refresh for the indexer's benefit, and reset to idle
/// once the success state has been seen.
async fn finish_success(inner: &Arc<EngineInner>, epoch: u64) {
    inner.sync.invalidate();
    if let Err(err) = inner.sync.refresh().await {
        // The transaction itself still succeeded
        tracing::warn!("Post-success refresh failed: {}", err);
    }

    let sync = inner.sync.clone();
    let delay = inner.config.post_success_refresh_delay;
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        sync.invalidate();
        if let Err(err) = sync.refresh().await {
            tracing::debug!("Delayed post-success refresh failed: {}", err);
        }
    });

    tokio::time::sleep(inner.config.success_display).await;
    inner.transition(epoch, WorkflowState::Idle);
}
