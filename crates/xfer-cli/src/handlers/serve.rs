//! Serve command handler.

use std::path::Path;

use anyhow::Result;

use xfer_axum::{Credentials, ServerConfig, start_server};

use crate::commands::ServeArgs;

/// Translate `serve` arguments into a server configuration.
pub fn server_config(download_dir: &Path, args: ServeArgs) -> Result<ServerConfig> {
    let credentials = Credentials::parse(&args.users)?;
    let mut config = ServerConfig::new(download_dir)
        .with_port(args.port)
        .with_bind(args.bind)
        .with_credentials(credentials)
        .with_listing_extensions(args.extensions);
    if let Some(dir) = args.static_dir {
        config = config.with_static_dir(dir);
    }
    if !args.allowed_origins.is_empty() {
        config = config.with_allowed_origins(args.allowed_origins);
    }
    Ok(config)
}

/// Execute the serve command. Runs until Ctrl-C.
pub async fn execute(download_dir: &Path, args: ServeArgs) -> Result<()> {
    let config = server_config(download_dir, args)?;
    if !config.credentials.is_enabled() {
        tracing::warn!("No users configured; the API is open to anyone who can reach it");
    }
    start_server(config).await
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::commands::Commands;
    use crate::parser::Cli;

    fn serve_args(argv: &[&str]) -> ServeArgs {
        match Cli::parse_from(argv).command {
            Commands::Serve(args) => args,
            Commands::Fetch(_) => panic!("expected serve"),
        }
    }

    #[test]
    fn builds_config_from_args() {
        let args = serve_args(&["xferd", "serve", "--port", "9001", "--user", "u:p", "--allow-origin", "http://a"]);
        let config = server_config(Path::new("/dl"), args).unwrap();
        assert_eq!(config.port, 9001);
        assert!(config.credentials.is_enabled());
        assert_eq!(config.session.download_root, Path::new("/dl"));
    }

    #[test]
    fn malformed_user_is_an_error() {
        let args = serve_args(&["xferd", "serve", "--user", "nopassword"]);
        assert!(server_config(Path::new("/dl"), args).is_err());
    }
}
