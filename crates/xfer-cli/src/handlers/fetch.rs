//! Fetch command handler.
//!
//! Runs one session against an in-process manager, draws its progress and
//! cancels it on Ctrl-C.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use indicatif::{ProgressBar, ProgressStyle};

use xfer_core::{
    NoopSessionEmitter, SessionConfig, SessionId, SessionServicePort, SessionSnapshot,
    SessionState, StartRequest, TransferEngine,
};
use xfer_engine::{HttpEngineConfig, SchemeRouter};
use xfer_session::{SessionManagerDeps, build_session_manager};

use crate::commands::FetchArgs;

/// How often the progress bar is refreshed.
const PROGRESS_TICK: Duration = Duration::from_millis(100);

fn create_download_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
    ) {
        pb.set_style(style.progress_chars("█▓░"));
    }
    pb
}

/// Execute the fetch command.
pub async fn execute(download_dir: &Path, args: FetchArgs) -> Result<()> {
    tokio::fs::create_dir_all(download_dir).await?;
    let engine = Arc::new(SchemeRouter::with_defaults(HttpEngineConfig::default())?);

    let mut request = StartRequest::new(args.locator);
    if let Some(id) = args.id {
        request = request.with_id(SessionId::parse(id)?);
    }

    let snapshot = run(
        engine,
        SessionConfig::new(download_dir),
        request,
        !args.quiet,
        tokio::signal::ctrl_c(),
    )
    .await?;

    match snapshot.state {
        SessionState::Completed => {
            match &snapshot.file_path {
                Some(path) => println!("{}", path.display()),
                None => println!("Nothing to transfer."),
            }
            Ok(())
        }
        SessionState::Cancelled => bail!("Transfer cancelled"),
        _ => {
            let message = snapshot
                .error
                .map_or_else(|| "transfer failed".to_string(), |e| e.user_message());
            bail!(message)
        }
    }
}

/// Run one session to its terminal state.
///
/// When `interrupt` resolves the session is cancelled; the call still waits
/// for the worker to clean up.
pub async fn run<T, F>(
    engine: Arc<T>,
    config: SessionConfig,
    request: StartRequest,
    show_progress: bool,
    interrupt: F,
) -> Result<SessionSnapshot>
where
    T: TransferEngine + 'static,
    F: Future<Output = std::io::Result<()>>,
{
    let manager = build_session_manager(SessionManagerDeps {
        engine,
        event_emitter: Arc::new(NoopSessionEmitter::new()),
        config,
    });
    let id = manager.start_session(request).await?;
    tracing::debug!(id = %id, "Fetch started");

    let bar = show_progress.then(create_download_bar);
    let mut ticker = tokio::time::interval(PROGRESS_TICK);
    let mut interrupted = false;
    let wait = manager.wait_until_terminal(&id);
    tokio::pin!(wait, interrupt);

    let outcome = loop {
        tokio::select! {
            biased;
            snapshot = &mut wait => break snapshot,
            signal = &mut interrupt, if !interrupted => {
                interrupted = true;
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "Interrupt listener failed");
                    continue;
                }
                tracing::warn!(id = %id, "Interrupted, cancelling");
                if let Err(e) = manager.cancel_session(&id).await {
                    tracing::debug!(id = %id, error = %e, "Cancel after interrupt");
                }
            }
            _ = ticker.tick() => {
                if let (Some(bar), Ok(report)) = (&bar, manager.get_progress(&id).await) {
                    bar.set_length(report.total_size_bytes);
                    bar.set_position(report.downloaded_bytes);
                }
            }
        }
    };

    if let Some(bar) = bar {
        match &outcome {
            Ok(snapshot) if snapshot.state == SessionState::Completed => {
                bar.set_position(snapshot.progress.downloaded());
                bar.finish();
            }
            _ => bar.abandon(),
        }
    }
    manager.shutdown().await;
    Ok(outcome?)
}
