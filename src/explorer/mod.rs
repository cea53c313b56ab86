//! HTML block explorer
//!
//! A small server-rendered UI over the same ledger the REST API serves:
//! - `GET /` - Block list
//! - `GET /add`, `POST /add` - Mine a block
//! - `GET /static/{path}` - Embedded assets

pub mod pages;
pub mod routes;

pub use routes::{create_explorer, ExplorerState};
