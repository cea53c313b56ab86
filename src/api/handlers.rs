//! REST API handlers
//!
//! Each handler makes at most one call into a collaborator and projects
//! the result as JSON.

use crate::api::error::ApiError;
use crate::api::extract::{ApiPath, JsonPayload, QueryParams};
use crate::api::services::{LedgerService, MempoolService, PeerService, WalletService};
use crate::core::{Block, LedgerStatus, Transaction, UTXO};
use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub ledger: Arc<dyn LedgerService>,
    pub mempool: Arc<dyn MempoolService>,
    pub peers: Arc<dyn PeerService>,
    pub wallet: Arc<dyn WalletService>,
    /// Port this server is bound to
    pub port: u16,
}

impl ApiState {
    pub fn new(
        ledger: Arc<dyn LedgerService>,
        mempool: Arc<dyn MempoolService>,
        peers: Arc<dyn PeerService>,
        wallet: Arc<dyn WalletService>,
        port: u16,
    ) -> Self {
        Self {
            ledger,
            mempool,
            peers,
            wallet,
            port,
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UrlDescription {
    pub url: String,
    pub method: &'static str,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<&'static str>,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: u64,
}

#[derive(Serialize)]
pub struct WalletResponse {
    pub address: String,
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct AddTransactionPayload {
    #[serde(alias = "To")]
    pub to: String,
    #[serde(alias = "Amount")]
    pub amount: i64,
}

#[derive(Deserialize)]
pub struct AddPeerPayload {
    #[serde(alias = "Address")]
    pub address: String,
    #[serde(alias = "Port")]
    pub port: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// (method, path, description, payload) for every route, in table order
const ROUTES: [(&str, &str, &str, Option<&str>); 12] = [
    ("GET", "/", "See Documentation", None),
    ("GET", "/status", "See the Status of the Blockchain", None),
    ("GET", "/blocks", "See All Blocks", None),
    ("POST", "/blocks", "Add a Block", None),
    ("GET", "/blocks/{hash}", "See a Block", None),
    (
        "GET",
        "/balance/{address}",
        "Get TxOuts for an Address (?total=true for the balance)",
        None,
    ),
    ("GET", "/mempool", "See the Mempool", None),
    ("GET", "/wallet", "See the Wallet Address", None),
    (
        "POST",
        "/transactions",
        "Make a Transaction",
        Some("to:string, amount:int"),
    ),
    ("GET", "/ws", "Upgrade to WebSockets", None),
    ("GET", "/peers", "See Peers", None),
    (
        "POST",
        "/peers",
        "Add a Peer",
        Some("address:string, port:string"),
    ),
];

/// GET / - Describe every route
pub async fn documentation(State(state): State<ApiState>) -> Json<Vec<UrlDescription>> {
    Json(
        ROUTES
            .iter()
            .map(|&(method, path, description, payload)| UrlDescription {
                url: format!("http://localhost:{}{}", state.port, path),
                method,
                description,
                payload,
            })
            .collect(),
    )
}

/// GET /status - Ledger summary
pub async fn status(State(state): State<ApiState>) -> Json<LedgerStatus> {
    Json(state.ledger.status().await)
}

/// GET /blocks - All blocks as the ledger orders them
pub async fn list_blocks(State(state): State<ApiState>) -> Json<Vec<Block>> {
    Json(state.ledger.blocks().await)
}

/// POST /blocks - Mine the next block; any body is ignored
pub async fn add_block(State(state): State<ApiState>) -> Result<StatusCode, ApiError> {
    state.ledger.append_block().await?;
    Ok(StatusCode::CREATED)
}

/// GET /blocks/{hash} - One block; the route only admits `[a-f0-9]+`
pub async fn get_block(
    State(state): State<ApiState>,
    ApiPath(hash): ApiPath<String>,
) -> Result<Json<Block>, ApiError> {
    Ok(Json(state.ledger.find_block(&hash).await?))
}

/// GET /balance/{address} - Unspent outputs, or their sum with `?total=true`
pub async fn balance(
    State(state): State<ApiState>,
    ApiPath(address): ApiPath<String>,
    query: QueryParams,
) -> Response {
    if query.first("total") == Some("true") {
        let balance = state.ledger.balance_for_address(&address).await;
        Json(BalanceResponse { address, balance }).into_response()
    } else {
        let utxos: Vec<UTXO> = state.ledger.utxos_for_address(&address).await;
        Json(utxos).into_response()
    }
}

/// GET /mempool - Pending transactions
pub async fn mempool(State(state): State<ApiState>) -> Json<Vec<Transaction>> {
    Json(state.mempool.transactions().await)
}

/// GET /wallet - This node's address
pub async fn wallet(State(state): State<ApiState>) -> Json<WalletResponse> {
    Json(WalletResponse {
        address: state.wallet.own_address().await,
    })
}

/// POST /transactions - Queue a payment from this node's wallet
pub async fn add_transaction(
    State(state): State<ApiState>,
    JsonPayload(payload): JsonPayload<AddTransactionPayload>,
) -> Result<StatusCode, ApiError> {
    state
        .mempool
        .add_transaction(&payload.to, payload.amount)
        .await?;
    Ok(StatusCode::CREATED)
}

/// GET /peers - Known peers
pub async fn list_peers(State(state): State<ApiState>) -> Json<Vec<String>> {
    Json(state.peers.peers().await)
}

/// POST /peers - Connect to a peer
pub async fn add_peer(
    State(state): State<ApiState>,
    JsonPayload(payload): JsonPayload<AddPeerPayload>,
) -> Result<StatusCode, ApiError> {
    let address = payload.address.trim();
    if address.is_empty() {
        return Err(ApiError::bad_request("Peer address is required"));
    }
    let port: u16 = payload
        .port
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid peer port: {:?}", payload.port)))?;

    state.peers.add_peer(address, port, state.port).await?;
    Ok(StatusCode::OK)
}

/// Fallback for requests no route matches
pub async fn no_route(method: Method, uri: Uri) -> ApiError {
    ApiError::no_route(&method, uri.path())
}
