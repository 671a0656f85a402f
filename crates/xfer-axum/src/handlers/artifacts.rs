//! Completed-artifact handlers - listing and file streaming.

use std::path::PathBuf;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;

use xfer_core::{ArtifactRef, CompletedArtifact};

use crate::error::HttpError;
use crate::handlers::sessions::parse_id;
use crate::state::AppState;

/// All completed artifacts, oldest first.
pub async fn list_completed(State(state): State<AppState>) -> Json<Vec<CompletedArtifact>> {
    Json(state.sessions.list_completed().await)
}

/// Download the artifact of a completed session.
pub async fn by_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, HttpError> {
    let id = parse_id(id)?;
    let path = state
        .sessions
        .resolve_artifact(&ArtifactRef::Session(id))
        .await?;
    stream_file(path).await
}

/// Download a file under the download root by relative path.
pub async fn by_path(
    State(state): State<AppState>,
    Path(relative): Path<String>,
) -> Result<Response, HttpError> {
    let path = state
        .sessions
        .resolve_artifact(&ArtifactRef::Path(relative))
        .await?;
    stream_file(path).await
}

/// `attachment` disposition with a header-safe file name.
fn content_disposition(path: &std::path::Path) -> HeaderValue {
    let name: String = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

async fn stream_file(path: PathBuf) -> Result<Response, HttpError> {
    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            HttpError::NotFound(format!("Artifact not found: {}", path.display()))
        } else {
            HttpError::Internal(format!("opening {}: {e}", path.display()))
        }
    })?;
    let len = file
        .metadata()
        .await
        .map_err(|e| HttpError::Internal(format!("reading {}: {e}", path.display())))?
        .len();

    tracing::debug!(path = %path.display(), bytes = len, "Streaming artifact");
    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(len)),
            (header::CONTENT_DISPOSITION, content_disposition(&path)),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_sanitizes_name() {
        let value = content_disposition(std::path::Path::new("/d/my \"movie\".mkv"));
        assert_eq!(value, "attachment; filename=\"my _movie_.mkv\"");
    }
}
