//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Session-coordinated transfer service.
#[derive(Parser, Debug)]
#[command(name = "xferd")]
#[command(about = "Run and monitor transfer sessions")]
#[command(version)]
pub struct Cli {
    /// Directory all transfers are written under
    #[arg(
        long = "download-dir",
        env = "XFER_DOWNLOAD_DIR",
        default_value = "downloads",
        global = true
    )]
    pub download_dir: PathBuf,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
