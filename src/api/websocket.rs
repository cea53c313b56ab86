//! WebSocket upgrade for peer connections
//!
//! The control-plane only validates the request and performs the
//! handshake; the socket then belongs to the peer network.

use crate::api::error::ApiError;
use crate::api::extract::QueryParams;
use crate::api::handlers::ApiState;
use axum::{
    extract::{
        rejection::ExtensionRejection,
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use std::net::SocketAddr;

/// GET /ws?openPort=P - Hand the connection to the peer network
///
/// `openPort` is the port the dialing node accepts connections on.
pub async fn ws_handler(
    State(state): State<ApiState>,
    query: QueryParams,
    remote: Result<ConnectInfo<SocketAddr>, ExtensionRejection>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let port = query
        .first("openPort")
        .and_then(|p| p.parse::<u16>().ok())
        .filter(|p| *p != 0)
        .ok_or_else(|| ApiError::bad_request("openPort must be a valid port"))?;

    let ws = ws.map_err(|e| ApiError::new(e.status(), e.body_text()))?;
    let ConnectInfo(remote) = remote.map_err(|e| ApiError::new(e.status(), e.body_text()))?;

    let address = remote.ip().to_string();
    log::debug!("Upgrading peer connection from {}:{}", address, port);

    let peers = state.peers.clone();
    Ok(ws.on_upgrade(move |socket| async move {
        peers.accept(socket, address, port).await;
    }))
}
