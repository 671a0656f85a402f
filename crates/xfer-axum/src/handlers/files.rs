//! Download directory listing handler.

use axum::Json;
use axum::extract::State;

use crate::error::HttpError;
use crate::listing::list_files;
use crate::state::AppState;

/// List media files under the download root.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<String>>, HttpError> {
    let root = state.download_root.clone();
    let extensions = state.listing_extensions.clone();
    let files = tokio::task::spawn_blocking(move || list_files(&root, &extensions))
        .await
        .map_err(|e| HttpError::Internal(format!("listing task failed: {e}")))?;
    Ok(Json(files))
}
