// Upload persistence for handlers: store only validated files, release them when the write fails

use tracing::warn;

use crate::{
    app_state::AppState,
    error::AppResult,
    infrastructure::{Upload, UploadKind},
};

/// Persist an already validated upload, if one was sent.
pub async fn store(state: &AppState, kind: UploadKind, upload: Option<Upload>) -> AppResult<Option<String>> {
    match upload {
        Some(upload) => Ok(Some(state.blobs.store(kind, upload).await?)),
        None => Ok(None),
    }
}

/// Pass `result` through, deleting the freshly stored `keys` if it failed.
pub async fn release_on_error<T>(
    state: &AppState,
    result: AppResult<T>,
    keys: &[Option<&str>],
) -> AppResult<T> {
    if result.is_err() {
        for key in keys.iter().flatten() {
            if let Err(e) = state.blobs.delete(key).await {
                warn!(key = %key, "Failed to release orphaned upload: {}", e);
            }
        }
    }
    result
}
