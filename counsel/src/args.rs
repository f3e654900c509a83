use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Counsel chat gateway
#[derive(Debug, Parser)]
#[command(name = "counsel", about = "Streams legal assistant answers to the chat front end")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "counsel.toml", env = "COUNSEL_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "COUNSEL_LISTEN")]
    pub listen: Option<SocketAddr>,
}
