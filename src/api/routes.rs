//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use crate::api::middleware::{json_content_type, log_requests, require_block_hash};
use crate::api::websocket::ws_handler;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::documentation))
        .route("/status", get(handlers::status))
        // Ledger
        .route("/blocks", get(handlers::list_blocks).post(handlers::add_block))
        .route(
            "/blocks/{hash}",
            get(handlers::get_block).layer(middleware::from_fn(require_block_hash)),
        )
        .route("/balance/{address}", get(handlers::balance))
        // Mempool and wallet
        .route("/mempool", get(handlers::mempool))
        .route("/wallet", get(handlers::wallet))
        .route("/transactions", post(handlers::add_transaction))
        // Peers
        .route("/ws", get(ws_handler))
        .route("/peers", get(handlers::list_peers).post(handlers::add_peer))
        .fallback(handlers::no_route)
        .with_state(state)
        .layer(cors)
        .layer(json_content_type())
        .layer(middleware::from_fn(log_requests))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::services::{LedgerService, MempoolService, PeerService, WalletService};
    use crate::core::{Block, BlockchainError, LedgerStatus, Transaction, UTXO};
    use crate::mining::MempoolError;
    use crate::network::PeerError;
    use crate::wallet::WalletError;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::ws::WebSocket;
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    const PORT: u16 = 4000;
    const FUNDS: i64 = 100;

    /// Blocks stored newest first
    struct FakeLedger {
        blocks: Mutex<Vec<Block>>,
    }

    #[async_trait]
    impl LedgerService for FakeLedger {
        async fn status(&self) -> LedgerStatus {
            let blocks = self.blocks.lock().unwrap();
            LedgerStatus {
                newest_hash: blocks[0].hash.clone(),
                height: blocks[0].height,
                current_difficulty: 1,
            }
        }

        async fn blocks(&self) -> Vec<Block> {
            self.blocks.lock().unwrap().clone()
        }

        async fn append_block(&self) -> Result<Block, BlockchainError> {
            let mut blocks = self.blocks.lock().unwrap();
            let mut block = Block::new(
                blocks[0].height + 1,
                blocks[0].hash.clone(),
                vec![Transaction::coinbase("miner", 50, blocks[0].height + 1)],
                1,
            );
            block.mine();
            blocks.insert(0, block.clone());
            Ok(block)
        }

        async fn find_block(&self, hash: &str) -> Result<Block, BlockchainError> {
            self.blocks
                .lock()
                .unwrap()
                .iter()
                .find(|b| b.hash == hash)
                .cloned()
                .ok_or_else(|| BlockchainError::BlockNotFound(hash.to_string()))
        }

        async fn utxos_for_address(&self, _address: &str) -> Vec<UTXO> {
            Vec::new()
        }

        async fn balance_for_address(&self, _address: &str) -> u64 {
            0
        }
    }

    #[derive(Default)]
    struct FakeMempool {
        txs: Mutex<Vec<Transaction>>,
    }

    #[async_trait]
    impl MempoolService for FakeMempool {
        async fn transactions(&self) -> Vec<Transaction> {
            self.txs.lock().unwrap().clone()
        }

        async fn add_transaction(&self, to: &str, amount: i64) -> Result<Transaction, MempoolError> {
            if amount <= 0 {
                return Err(MempoolError::InvalidAmount(amount));
            }
            if amount > FUNDS {
                return Err(MempoolError::Wallet(WalletError::InsufficientFunds {
                    have: FUNDS as u64,
                    need: amount as u64,
                }));
            }
            let mut txs = self.txs.lock().unwrap();
            let tx = Transaction::coinbase(to, amount as u64, txs.len() as u64);
            txs.push(tx.clone());
            Ok(tx)
        }
    }

    #[derive(Default)]
    struct FakePeers {
        peers: Mutex<BTreeSet<String>>,
        self_ports: Mutex<Vec<u16>>,
    }

    #[async_trait]
    impl PeerService for FakePeers {
        async fn add_peer(&self, address: &str, port: u16, self_port: u16) -> Result<(), PeerError> {
            if address == "unreachable" {
                return Err(PeerError::ConnectionFailed(format!("{}:{}", address, port)));
            }
            self.self_ports.lock().unwrap().push(self_port);
            self.peers
                .lock()
                .unwrap()
                .insert(format!("{}:{}", address, port));
            Ok(())
        }

        async fn peers(&self) -> Vec<String> {
            self.peers.lock().unwrap().iter().cloned().collect()
        }

        async fn accept(&self, _socket: WebSocket, _address: String, _port: u16) {}
    }

    struct FakeWallet;

    #[async_trait]
    impl WalletService for FakeWallet {
        async fn own_address(&self) -> String {
            "1OwnWalletAddress".to_string()
        }
    }

    struct TestApp {
        router: Router,
        peers: Arc<FakePeers>,
    }

    fn test_app() -> TestApp {
        let ledger = Arc::new(FakeLedger {
            blocks: Mutex::new(vec![Block::genesis(1)]),
        });
        let peers = Arc::new(FakePeers::default());
        let state = ApiState::new(
            ledger,
            Arc::new(FakeMempool::default()),
            peers.clone(),
            Arc::new(FakeWallet),
            PORT,
        );
        TestApp {
            router: create_router(state),
            peers,
        }
    }

    struct TestResponse {
        status: StatusCode,
        content_type: Option<String>,
        body: Value,
    }

    async fn send(app: &TestApp, method: &str, uri: &str, body: Option<&str>) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();

        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse {
            status,
            content_type,
            body,
        }
    }

    fn error_message(response: &TestResponse) -> &str {
        response.body["errorMessage"].as_str().unwrap()
    }

    #[tokio::test]
    async fn test_documentation_is_fixed() {
        let app = test_app();

        let first = send(&app, "GET", "/", None).await;
        assert_eq!(first.status, StatusCode::OK);
        let routes = first.body.as_array().unwrap();
        assert_eq!(routes.len(), 12);
        assert_eq!(routes[0]["url"], "http://localhost:4000/");
        assert_eq!(routes[4]["url"], "http://localhost:4000/blocks/{hash}");
        assert_eq!(routes[8]["payload"], "to:string, amount:int");
        // Block creation takes no payload
        assert!(routes[3].get("payload").is_none());

        send(&app, "POST", "/blocks", None).await;
        let second = send(&app, "GET", "/", None).await;
        assert_eq!(second.body, first.body);
    }

    #[tokio::test]
    async fn test_status_and_wallet() {
        let app = test_app();

        let status = send(&app, "GET", "/status", None).await;
        assert_eq!(status.status, StatusCode::OK);
        assert_eq!(status.body["height"], 0);
        assert!(status.body["newestHash"].is_string());
        assert!(status.body["currentDifficulty"].is_number());

        let wallet = send(&app, "GET", "/wallet", None).await;
        assert_eq!(wallet.body["address"], "1OwnWalletAddress");
    }

    #[tokio::test]
    async fn test_add_block_appends_one() {
        let app = test_app();
        let before = send(&app, "GET", "/blocks", None).await;

        let created = send(&app, "POST", "/blocks", Some(r#"{"data":"ignored"}"#)).await;
        assert_eq!(created.status, StatusCode::CREATED);
        assert_eq!(created.body, Value::Null);

        let after = send(&app, "GET", "/blocks", None).await;
        let before = before.body.as_array().unwrap();
        let after = after.body.as_array().unwrap();
        assert_eq!(after.len(), before.len() + 1);
        assert!(before.iter().all(|b| b["hash"] != after[0]["hash"]));
    }

    #[tokio::test]
    async fn test_get_block() {
        let app = test_app();
        let blocks = send(&app, "GET", "/blocks", None).await;
        let hash = blocks.body[0]["hash"].as_str().unwrap().to_string();

        let found = send(&app, "GET", &format!("/blocks/{}", hash), None).await;
        assert_eq!(found.status, StatusCode::OK);
        assert_eq!(found.body["hash"], hash.as_str());
    }

    #[tokio::test]
    async fn test_unknown_block_is_not_found() {
        let app = test_app();

        let missing = send(&app, "GET", "/blocks/abc123", None).await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        assert!(!error_message(&missing).is_empty());

        let blocks = send(&app, "GET", "/blocks", None).await;
        assert_eq!(blocks.body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_non_hex_hash_is_route_miss() {
        let app = test_app();

        let upper = send(&app, "GET", "/blocks/ABC123", None).await;
        assert_eq!(upper.status, StatusCode::NOT_FOUND);
        assert_eq!(error_message(&upper), "no route for GET /blocks/ABC123");

        // The constraint holds for every method, not only GET
        let posted = send(&app, "POST", "/blocks/XYZ", None).await;
        assert_eq!(posted.status, StatusCode::NOT_FOUND);
        assert_eq!(error_message(&posted), "no route for POST /blocks/XYZ");

        let deleted = send(&app, "DELETE", "/blocks/abc123", None).await;
        assert_eq!(deleted.status, StatusCode::METHOD_NOT_ALLOWED);

        let unknown = send(&app, "GET", "/nowhere", None).await;
        assert_eq!(unknown.status, StatusCode::NOT_FOUND);
        assert_eq!(error_message(&unknown), "no route for GET /nowhere");
    }

    #[tokio::test]
    async fn test_balance_for_empty_address() {
        let app = test_app();

        let utxos = send(&app, "GET", "/balance/1Nobody", None).await;
        assert_eq!(utxos.status, StatusCode::OK);
        assert_eq!(utxos.body, serde_json::json!([]));

        let total = send(&app, "GET", "/balance/1Nobody?total=true", None).await;
        assert_eq!(total.body, serde_json::json!({"address": "1Nobody", "balance": 0}));

        let other = send(&app, "GET", "/balance/1Nobody?total=yes", None).await;
        assert_eq!(other.body, serde_json::json!([]));

        // Only the first `total` counts
        let repeated = send(&app, "GET", "/balance/1Nobody?total=true&total=true", None).await;
        assert_eq!(repeated.status, StatusCode::OK);
        assert_eq!(repeated.body["balance"], 0);

        let mixed = send(&app, "GET", "/balance/1Nobody?total=no&total=true", None).await;
        assert_eq!(mixed.body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_upgrade_rejections_are_json() {
        let app = test_app();

        let missing = send(&app, "GET", "/ws", None).await;
        assert_eq!(missing.status, StatusCode::BAD_REQUEST);
        assert_eq!(error_message(&missing), "openPort must be a valid port");

        // A plain GET is not a WebSocket handshake
        let plain = send(&app, "GET", "/ws?openPort=5000", None).await;
        assert!(plain.status.is_client_error());
        assert_eq!(plain.content_type.as_deref(), Some("application/json"));
        assert!(!error_message(&plain).is_empty());
    }

    #[tokio::test]
    async fn test_preflight_is_json() {
        let app = test_app();
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/peers")
            .header(header::ORIGIN, "http://example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let response = app.router.clone().oneshot(request).await.unwrap();
        assert!(response.status().is_success());
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_rejected_transactions() {
        let app = test_app();

        for (payload, expected) in [
            (r#"{"to":"1Someone","amount":0}"#, "Invalid amount: 0"),
            (r#"{"to":"1Someone","amount":-3}"#, "Invalid amount: -3"),
            (
                r#"{"to":"1Someone","amount":500}"#,
                "Insufficient funds: have 100, need 500",
            ),
        ] {
            let response = send(&app, "POST", "/transactions", Some(payload)).await;
            assert_eq!(response.status, StatusCode::BAD_REQUEST);
            assert_eq!(error_message(&response), expected);
        }

        for malformed in ["not json", r#"{"to":"1Someone"}"#, r#"{"to":"1Someone","amount":"5"}"#] {
            let response = send(&app, "POST", "/transactions", Some(malformed)).await;
            assert_eq!(response.status, StatusCode::BAD_REQUEST);
            assert!(!error_message(&response).is_empty());
        }

        let mempool = send(&app, "GET", "/mempool", None).await;
        assert_eq!(mempool.body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_accepted_transaction() {
        let app = test_app();

        let created = send(
            &app,
            "POST",
            "/transactions",
            Some(r#"{"to":"1Someone","amount":25}"#),
        )
        .await;
        assert_eq!(created.status, StatusCode::CREATED);
        assert_eq!(created.body, Value::Null);

        let mempool = send(&app, "GET", "/mempool", None).await;
        let txs = mempool.body.as_array().unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0]["outputs"][0]["address"], "1Someone");
    }

    #[tokio::test]
    async fn test_add_peer_is_idempotent() {
        let app = test_app();
        let payload = r#"{"address":"127.0.0.1","port":"5000"}"#;

        for _ in 0..2 {
            let response = send(&app, "POST", "/peers", Some(payload)).await;
            assert_eq!(response.status, StatusCode::OK);
            assert_eq!(response.body, Value::Null);
        }

        let peers = send(&app, "GET", "/peers", None).await;
        assert_eq!(peers.body, serde_json::json!(["127.0.0.1:5000"]));
        assert_eq!(*app.peers.self_ports.lock().unwrap(), vec![PORT, PORT]);
    }

    #[tokio::test]
    async fn test_add_peer_fails_closed() {
        let app = test_app();

        for payload in [
            "{}",
            r#"{"address":"","port":"5000"}"#,
            r#"{"address":"127.0.0.1","port":"abc"}"#,
            r#"{"address":"127.0.0.1","port":"70000"}"#,
            r#"{"address":"127.0.0.1","port":5000}"#,
            "garbage",
        ] {
            let response = send(&app, "POST", "/peers", Some(payload)).await;
            assert_eq!(response.status, StatusCode::BAD_REQUEST, "{}", payload);
            assert!(!error_message(&response).is_empty());
        }

        let unreachable = send(
            &app,
            "POST",
            "/peers",
            Some(r#"{"address":"unreachable","port":"5000"}"#),
        )
        .await;
        assert_eq!(unreachable.status, StatusCode::BAD_GATEWAY);

        let peers = send(&app, "GET", "/peers", None).await;
        assert_eq!(peers.body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let app = test_app();

        let response = send(&app, "DELETE", "/blocks", None).await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);

        let response = send(&app, "GET", "/transactions", None).await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_every_response_is_json() {
        let app = test_app();

        for (method, uri, body) in [
            ("GET", "/", None),
            ("POST", "/blocks", None),
            ("GET", "/blocks/ffff", None),
            ("GET", "/blocks/XYZ", None),
            ("POST", "/blocks/XYZ", None),
            ("GET", "/balance/1Nobody?total=true&total=true", None),
            ("PUT", "/peers", None),
            ("POST", "/transactions", Some("{}")),
            ("POST", "/peers", Some(r#"{"address":"127.0.0.1","port":"5000"}"#)),
        ] {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .body(body.map(Body::from).unwrap_or_else(Body::empty))
                .unwrap();
            let response = app.router.clone().oneshot(request).await.unwrap();
            assert_eq!(
                response.headers().get(header::CONTENT_TYPE).unwrap(),
                "application/json",
                "{} {}",
                method,
                uri
            );
        }

        let created = send(&app, "POST", "/blocks", None).await;
        assert_eq!(created.content_type.as_deref(), Some("application/json"));
    }
}
