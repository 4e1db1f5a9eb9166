//! HTTP handler for browser uploads.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;

use crate::common::{AppError, TransferEvent};
use crate::receive::state::ReceiveAppState;
use crate::receive::storage::IncomingFile;
use crate::server::progress::ProgressTracker;
use crate::ui::web;
use crate::utils::security;

/// Multipart field carrying file contents.
pub const FILE_FIELD: &str = "file";

fn bad_multipart(err: MultipartError) -> AppError {
    AppError::BadRequest(format!("malformed upload: {}", err.body_text()))
}

/// Accept one or more `file` fields and write each into the save directory.
pub async fn upload_handler(
    State(state): State<ReceiveAppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    // Request length includes multipart framing; close enough for progress
    let expected = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let mut tracker = match expected {
        Some(total) => ProgressTracker::new(total, state.events.clone()),
        None => ProgressTracker::without_total(state.events.clone()),
    };

    let mut saved = 0usize;
    while let Some(mut field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some(FILE_FIELD) {
            tracing::debug!(field = ?field.name(), "ignoring unexpected upload field");
            continue;
        }

        let raw_name = field.file_name().unwrap_or_default().to_string();
        let name = security::upload_file_name(&raw_name)
            .map_err(|e| AppError::BadRequest(format!("invalid file name: {e}")))?;

        // Dropped on any early return below, which deletes the partial file
        let mut incoming = IncomingFile::create(&state.save_dir, &name).await?;
        while let Some(chunk) = field.chunk().await.map_err(bad_multipart)? {
            incoming.write_chunk(&chunk).await?;
            tracker.advance(chunk.len() as u64);
        }
        let (path, bytes) = incoming.commit().await?;

        let stored_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(name);
        tracing::info!(name = %stored_name, bytes, "upload saved");
        state.events.emit(TransferEvent::FileReceived {
            name: stored_name,
            bytes,
        });
        saved += 1;
    }

    if saved == 0 {
        return Err(AppError::BadRequest(format!(
            "missing '{FILE_FIELD}' field"
        )));
    }
    tracker.finish();

    Ok(web::serve_upload_success())
}
