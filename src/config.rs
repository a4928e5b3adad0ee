use clap::Parser;
use std::path::PathBuf;

/// Hostlink daemon - remote shell, browser and file operations over HTTP
#[derive(Parser, Debug)]
#[command(name = "hostlink-daemon")]
pub struct Args {
    /// Bind address
    #[arg(long, default_value = "127.0.0.1:8417")]
    pub listen: String,

    /// Default working directory for shell sessions
    #[arg(long, env = "HOSTLINK_WORKING_DIR")]
    pub working_dir: Option<PathBuf>,
}
