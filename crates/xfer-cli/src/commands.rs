//! Subcommands and their arguments.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP service
    Serve(ServeArgs),

    /// Transfer one resource in the foreground
    Fetch(FetchArgs),
}

/// Arguments of `xferd serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, env = "XFER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Allowed `user:password` pairs; none disables authentication
    #[arg(long = "user", env = "XFER_USERS", value_delimiter = ',')]
    pub users: Vec<String>,

    /// Serve a browser UI from this directory
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// Restrict CORS to these origins (default: any)
    #[arg(long = "allow-origin", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// File extensions shown by the file listing
    #[arg(long = "list-ext", value_delimiter = ',', default_values = ["mkv", "mp4"])]
    pub extensions: Vec<String>,
}

/// Arguments of `xferd fetch`.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Locator to transfer (URL, `file://` URL or local path)
    pub locator: String,

    /// Session id to run under (generated when omitted)
    #[arg(long)]
    pub id: Option<String>,

    /// Do not draw a progress bar
    #[arg(short, long)]
    pub quiet: bool,
}
