//! chainport node
//!
//! Starts the REST API, the HTML explorer, or both.

use chainport::cli::{self, Cli};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Cli::parse().into_config();
    cli::run(config).await
}
