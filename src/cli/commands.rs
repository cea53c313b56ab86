//! Server startup for each mode
//!
//! Opens the node, wires the peer network to it and serves the REST API,
//! the explorer, or both.

use crate::api::{create_router, ApiState};
use crate::explorer::{create_explorer, ExplorerState};
use crate::network::PeerNetwork;
use crate::node::Node;
use crate::storage::StorageConfig;
use axum::Router;
use clap::ValueEnum;
use log::{error, info};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// In `both` mode the explorer listens this far above the REST port
pub const EXPLORER_PORT_OFFSET: u16 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// JSON API only
    Rest,
    /// HTML explorer only
    Html,
    /// JSON API on the port, explorer on port + 1000
    Both,
}

/// Everything the node needs to start
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub port: u16,
    pub mode: Mode,
    pub data_dir: PathBuf,
    pub difficulty: u32,
}

impl NodeConfig {
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            data_dir: self.data_dir.clone(),
            ..Default::default()
        }
    }

    /// Port of the explorer in `both` mode
    pub fn explorer_port(&self) -> CliResult<u16> {
        self.port
            .checked_add(EXPLORER_PORT_OFFSET)
            .ok_or_else(|| format!("port {} leaves no room for the explorer", self.port).into())
    }
}

/// Bind `port` on all interfaces; the process cannot run without it
async fn bind_or_exit(port: u16) -> TcpListener {
    match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind port {}: {}", port, e);
            std::process::exit(1);
        }
    }
}

async fn serve(listener: TcpListener, app: Router, name: &str) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("{} listening on http://localhost:{}", name, addr.port());
    }
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

/// Save the chain and exit on Ctrl+C
fn spawn_shutdown_handler(node: Arc<Node>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        info!("Shutting down, saving chain...");
        if let Err(e) = node.save().await {
            error!("Failed to save blockchain: {}", e);
        }
        std::process::exit(0);
    });
}

/// Run the node until the servers stop or the process is interrupted
pub async fn run(config: NodeConfig) -> CliResult<()> {
    let node = Arc::new(Node::open(config.storage_config(), config.difficulty)?);

    let network = PeerNetwork::new(node.clone(), config.port);
    network.spawn_relay();
    spawn_shutdown_handler(node.clone());

    let rest_state = ApiState::new(
        node.clone(),
        node.clone(),
        Arc::new(network),
        node.clone(),
        config.port,
    );
    let explorer_state = ExplorerState {
        ledger: node.clone(),
    };

    match config.mode {
        Mode::Rest => {
            let listener = bind_or_exit(config.port).await;
            serve(listener, create_router(rest_state), "REST API").await?;
        }
        Mode::Html => {
            let listener = bind_or_exit(config.port).await;
            serve(listener, create_explorer(explorer_state), "Explorer").await?;
        }
        Mode::Both => {
            let explorer_port = config.explorer_port()?;
            let rest = bind_or_exit(config.port).await;
            let explorer = bind_or_exit(explorer_port).await;
            tokio::try_join!(
                serve(rest, create_router(rest_state), "REST API"),
                serve(explorer, create_explorer(explorer_state), "Explorer"),
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(port: u16) -> NodeConfig {
        NodeConfig {
            port,
            mode: Mode::Both,
            data_dir: PathBuf::from(".chainport"),
            difficulty: 16,
        }
    }

    #[test]
    fn test_explorer_port_offset() {
        assert_eq!(config(4000).explorer_port().unwrap(), 5000);
        assert!(config(65000).explorer_port().is_err());
    }

    #[test]
    fn test_storage_config_uses_data_dir() {
        let storage = config(4000).storage_config();
        assert_eq!(storage.data_dir, PathBuf::from(".chainport"));
        assert_eq!(storage.blockchain_file, "blockchain.json");
    }
}
