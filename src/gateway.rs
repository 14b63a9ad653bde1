use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use ethers::types::H256;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tower_http::cors::CorsLayer;

use crate::bridge::{
    BridgeError, BurnStatus, DepositStatus, Direction, ExitWatchHandle, PendingTransaction, Rebalancer, StatusRequest, TransferRequest,
    WebhookSink,
};
use crate::models::ApiResponse;

pub struct AppState {
    pub rebalancer: Arc<Rebalancer>,
    /// Used for exit webhooks
    pub http_client: Client,
    /// Running exit watches by burn tx hash
    pub watches: Mutex<HashMap<H256, ExitWatchHandle>>,
}

impl AppState {
    pub fn new(rebalancer: Arc<Rebalancer>, http_client: Client) -> Self {
        Self {
            rebalancer,
            http_client,
            watches: Mutex::new(HashMap::new()),
        }
    }

    /// Drops handles whose watch already delivered, failed or was cancelled.
    pub fn prune_finished_watches(&self) -> usize {
        let mut watches = self.watches.lock().unwrap();
        let before = watches.len();
        watches.retain(|_, handle| !handle.is_finished());
        before - watches.len()
    }

    /// Prunes finished watches every `period` until the state is dropped.
    pub fn spawn_watch_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let state = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(state) = state.upgrade() else { break };
                let pruned = state.prune_finished_watches();
                if pruned > 0 {
                    log::debug!("pruned {} finished exit watches", pruned);
                }
            }
        })
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/matic/deposit/approval", post(deposit_approval))
        .route("/matic/deposit/execute", post(deposit_execute))
        .route("/matic/deposit/status", post(deposit_status))
        .route("/matic/withdraw/approval", post(withdraw_approval))
        .route("/matic/withdraw/execute", post(withdraw_execute))
        .route("/matic/withdraw/status", post(withdraw_status))
        .route("/matic/withdraw/watch", post(withdraw_watch))
        .route("/matic/withdraw/watch/cancel", post(withdraw_watch_cancel))
        .layer(Extension(state))
        .layer(CorsLayer::permissive())
}

/// HTTP status for a bridge error
pub fn status_for(error: &BridgeError) -> StatusCode {
    match error {
        BridgeError::TransactionNotFound { .. } => StatusCode::NOT_FOUND,
        BridgeError::BridgeEncodingFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_REQUEST,
    }
}

pub struct ApiError(pub BridgeError);

impl From<BridgeError> for ApiError {
    fn from(error: BridgeError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            log::error!("request failed: {}", self.0);
        } else {
            log::warn!("request rejected: {}", self.0);
        }
        let body = ApiResponse::rejected(status.as_u16(), &self.0);
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApprovalResponse {
    /// Decimal string, or `not_needed` for withdrawals
    pub allowance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<PendingTransaction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub transaction: PendingTransaction,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DepositStatusResponse {
    pub status: DepositStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BurnState {
    pub completed: bool,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BurnStatusResponse {
    pub status: BurnState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<PendingTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchRequest {
    #[serde(flatten)]
    pub request: StatusRequest,
    pub callback_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelWatchRequest {
    pub tx_hash: H256,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchResponse {
    pub tx_hash: H256,
    pub watching: bool,
}

async fn ping() -> &'static str {
    "pong\n"
}

async fn deposit_approval(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<TransferRequest>,
) -> ApiResult<ApprovalResponse> {
    log::info!("deposit approval: {:?}", payload);
    let decision = state.rebalancer.prepare_approval_for(&payload, Direction::Deposit).await?;
    Ok(Json(ApiResponse::success(ApprovalResponse {
        allowance: decision.allowance().to_string(),
        transaction: decision.transaction().cloned(),
    })))
}

async fn deposit_execute(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<TransferRequest>,
) -> ApiResult<ExecuteResponse> {
    log::info!("deposit execute: {:?}", payload);
    let transaction = state.rebalancer.prepare_deposit(&payload).await?;
    Ok(Json(ApiResponse::success(ExecuteResponse { transaction })))
}

async fn deposit_status(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<StatusRequest>,
) -> ApiResult<DepositStatusResponse> {
    log::info!("deposit status: {:?}", payload);
    let status = state.rebalancer.get_deposit_status(&payload).await?;
    Ok(Json(ApiResponse::success(DepositStatusResponse { status })))
}

async fn withdraw_approval(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<TransferRequest>,
) -> ApiResult<ApprovalResponse> {
    log::info!("withdraw approval: {:?}", payload);
    // burns need no approval
    state.rebalancer.prepare_approval_for(&payload, Direction::Withdraw).await?;
    Ok(Json(ApiResponse::success(ApprovalResponse {
        allowance: "not_needed".to_string(),
        transaction: None,
    })))
}

async fn withdraw_execute(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<TransferRequest>,
) -> ApiResult<ExecuteResponse> {
    log::info!("withdraw execute: {:?}", payload);
    let transaction = state.rebalancer.prepare_burn(&payload).await?;
    Ok(Json(ApiResponse::success(ExecuteResponse { transaction })))
}

async fn withdraw_status(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<StatusRequest>,
) -> ApiResult<BurnStatusResponse> {
    log::info!("withdraw status: {:?}", payload);
    let status = state.rebalancer.get_burn_status(&payload).await?;
    let message = match &status {
        BurnStatus::Unknown(message) => Some(message.clone()),
        _ => None,
    };
    Ok(Json(ApiResponse::success(BurnStatusResponse {
        status: BurnState {
            completed: status.is_completed(),
            state: status.as_str().to_string(),
            message,
        },
        transaction: status.exit_transaction().cloned(),
    })))
}

async fn withdraw_watch(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<WatchRequest>,
) -> ApiResult<WatchResponse> {
    log::info!("withdraw watch: {:?} -> {}", payload.request, payload.callback_url);
    let url = reqwest::Url::parse(&payload.callback_url)
        .map_err(|e| BridgeError::InvalidRequest(format!("invalid callbackUrl: {}", e)))?;
    let sink = Arc::new(WebhookSink::new(state.http_client.clone(), url.as_str()));
    let handle = state.rebalancer.watch_exit(&payload.request, sink).await?;

    let tx_hash = payload.request.tx_hash;
    state.prune_finished_watches();
    let mut watches = state.watches.lock().unwrap();
    // a previous watch of the same burn is replaced, and cancelled on drop
    watches.insert(tx_hash, handle);
    Ok(Json(ApiResponse::success(WatchResponse { tx_hash, watching: true })))
}

async fn withdraw_watch_cancel(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CancelWatchRequest>,
) -> ApiResult<WatchResponse> {
    let handle = state.watches.lock().unwrap().remove(&payload.tx_hash);
    state.prune_finished_watches();
    let mut handle = handle.ok_or_else(|| {
        BridgeError::InvalidRequest(format!("no watch registered for {:?}", payload.tx_hash))
    })?;
    handle.cancel();
    log::info!("watch for {:?} cancelled", payload.tx_hash);
    Ok(Json(ApiResponse::success(WatchResponse { tx_hash: payload.tx_hash, watching: false })))
}
