//! REST API module
//!
//! The node's JSON control-plane. Handlers reach node state only through
//! the service traits in [`services`].
//!
//! # Endpoints
//!
//! - `GET /` - Route documentation
//! - `GET /status` - Ledger status
//! - `GET /blocks` - All blocks, newest first
//! - `POST /blocks` - Mine and append a block
//! - `GET /blocks/{hash}` - One block (`hash` must be lowercase hex)
//! - `GET /balance/{address}` - Unspent outputs, or `{address, balance}` with `?total=true`
//! - `GET /mempool` - Pending transactions
//! - `GET /wallet` - This node's address
//! - `POST /transactions` - Queue a payment: `{"to": "...", "amount": 10}`
//! - `GET /ws?openPort=P` - Upgrade to a peer connection
//! - `GET /peers` - Known peers
//! - `POST /peers` - Connect to a peer: `{"address": "...", "port": "..."}`

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod websocket;

pub use error::ApiError;
pub use handlers::ApiState;
pub use routes::create_router;
pub use services::{LedgerService, MempoolService, PeerService, WalletService};
