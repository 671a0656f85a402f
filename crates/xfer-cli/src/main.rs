//! CLI entry point.

use clap::Parser;

use xfer_cli::{Cli, Commands, handlers, init_logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Serve(args) => handlers::serve::execute(&cli.download_dir, args).await,
        Commands::Fetch(args) => handlers::fetch::execute(&cli.download_dir, args).await,
    }
}
