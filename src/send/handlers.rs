//! HTTP handlers for share info, password verification, and the download.

use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{header, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use crate::common::{AppError, TransferEvent};
use crate::send::content;
use crate::send::session::{DownloadCredentials, SlotGrant, Verification};
use crate::server::auth;
use crate::server::progress::{ProgressStream, ProgressTracker, StreamOutcome};

use super::SendAppState;

/// Payload of `GET /api/info`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub filename: String,
    pub size: u64,
    pub limit: u32,
    pub current: u32,
    pub has_password: bool,
    /// Unix seconds, 0 when the share never expires
    pub expiry: u64,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub code: String,
}

pub async fn info_handler(
    State(state): State<SendAppState>,
) -> Result<Json<InfoResponse>, AppError> {
    let info = state
        .session
        .info()
        .ok_or_else(|| AppError::Gone("no active share".to_string()))?;

    Ok(Json(InfoResponse {
        expiry: info.expiry_unix_secs(),
        filename: info.filename,
        size: info.size,
        limit: info.limit,
        current: info.current,
        has_password: info.has_password,
    }))
}

/// Check the share password. On success with a password-protected share
/// the response also carries the access cookie for `/download`.
pub async fn verify_handler(
    State(state): State<SendAppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) =
        payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let response = match state.session.verify(&request.code) {
        Verification::Rejected => {
            tracing::debug!("password verification failed");
            (StatusCode::OK, Json(serde_json::json!({ "success": false }))).into_response()
        }
        Verification::NotRequired => Json(serde_json::json!({ "success": true })).into_response(),
        Verification::Granted(token) => (
            [(header::SET_COOKIE, auth::access_cookie(&token))],
            Json(serde_json::json!({ "success": true })),
        )
            .into_response(),
    };
    Ok(response)
}

/// Stream the shared file to one client, consuming a download slot.
pub async fn download_handler(
    credentials: DownloadCredentials,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    State(state): State<SendAppState>,
) -> Result<Response<Body>, AppError> {
    // Credentials first so a wrong password never burns a slot
    auth::require_download_access(&state.session, &credentials)?;
    let grant = auth::claim_download_slot(&state.session)?;

    let remote = connect_info.map(|ConnectInfo(addr)| addr);
    tracing::info!(
        sequence = grant.sequence,
        limit = grant.limit,
        remote = ?remote,
        "download slot granted"
    );
    state.events.emit(TransferEvent::DownloadStarted {
        remote,
        sequence: grant.sequence,
    });

    match stream_target(&state, grant).await {
        Ok(response) => Ok(response),
        Err(err) => {
            // The slot stays consumed; the share still has to close
            if grant.is_final() {
                state.shutdown.schedule_limit_shutdown(state.grace_delay);
            }
            Err(err)
        }
    }
}

async fn stream_target(state: &SendAppState, grant: SlotGrant) -> Result<Response<Body>, AppError> {
    let target = state
        .session
        .target()
        .ok_or_else(|| AppError::Gone("no active share".to_string()))?;

    let file = tokio::fs::File::open(&target.path)
        .await
        .with_context(|| format!("Failed to open {}", target.path.display()))?;

    let content_type = {
        let name = target.display_name.clone();
        let path = target.path.clone();
        tokio::task::spawn_blocking(move || content::resolve_content_type(&name, &path))
            .await
            .context("content type detection failed")?
    };

    let shutdown = state.shutdown.clone();
    let grace = state.grace_delay;
    let tracker = ProgressTracker::new(target.size, state.events.clone());
    let body = ProgressStream::new(ReaderStream::new(file), tracker).on_finish(move |outcome| {
        match outcome {
            StreamOutcome::Completed => {
                tracing::info!(sequence = grant.sequence, "download completed")
            }
            other => tracing::warn!(sequence = grant.sequence, outcome = ?other, "download ended early"),
        }
        if grant.is_final() {
            shutdown.schedule_limit_shutdown(grace);
        }
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, target.size)
        .header(
            header::CONTENT_DISPOSITION,
            content::content_disposition(&target.display_name),
        )
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .header(header::PRAGMA, "no-cache")
        .header(header::EXPIRES, "0")
        .body(Body::from_stream(body))
        .context("build response")?;

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::InfoResponse;

    #[test]
    fn info_response_uses_camel_case_keys() {
        let value = serde_json::to_value(InfoResponse {
            filename: "a.txt".into(),
            size: 3,
            limit: 1,
            current: 0,
            has_password: true,
            expiry: 0,
        })
        .expect("serialize");

        assert_eq!(value["hasPassword"], true);
        assert_eq!(value["expiry"], 0);
        assert!(value.get("has_password").is_none());
    }
}
