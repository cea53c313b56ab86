//! Command-line configuration

pub mod commands;

pub use commands::{run, CliResult, Mode, NodeConfig, EXPLORER_PORT_OFFSET};

use crate::core::DEFAULT_DIFFICULTY;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chainport")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "A blockchain node with a REST control-plane and HTML explorer", long_about = None)]
pub struct Cli {
    /// Port of the server ('both' puts the explorer on port+1000)
    #[arg(short, long, default_value_t = 4000)]
    pub port: u16,

    /// Which server to run
    #[arg(short, long, value_enum, default_value_t = Mode::Rest)]
    pub mode: Mode,

    /// Data directory for the chain and wallet
    #[arg(short, long, default_value = ".chainport")]
    pub data_dir: PathBuf,

    /// Mining difficulty of a new chain (number of leading zero bits)
    #[arg(long)]
    pub difficulty: Option<u32>,
}

impl Cli {
    pub fn into_config(self) -> NodeConfig {
        NodeConfig {
            port: self.port,
            mode: self.mode,
            data_dir: self.data_dir,
            difficulty: self.difficulty.unwrap_or(DEFAULT_DIFFICULTY),
        }
    }
}
