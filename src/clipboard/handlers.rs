//! Browser-facing clipboard endpoints, mounted in every mode.

use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Redirect};
use axum::{Form, Json};
use serde::Deserialize;

use crate::clipboard::ClipboardRelay;
use crate::common::AppError;
use crate::ui::web;

pub const CLIPBOARD_PATH: &str = "/clipboard";

#[derive(Debug, Deserialize)]
pub struct ClipboardForm {
    pub text: String,
}

pub async fn clipboard_page() -> impl IntoResponse {
    web::serve_clipboard_page()
}

/// Replace the host clipboard with the submitted text.
pub async fn set_clipboard(
    State(relay): State<ClipboardRelay>,
    form: Result<Form<ClipboardForm>, FormRejection>,
) -> Result<Redirect, AppError> {
    let Form(form) = form.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    relay.set(form.text).await?;
    Ok(Redirect::to(CLIPBOARD_PATH))
}

pub async fn clipboard_data(State(relay): State<ClipboardRelay>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        relay.current().await,
    )
}

pub async fn clipboard_history(State(relay): State<ClipboardRelay>) -> Json<Vec<String>> {
    Json(relay.history().snapshot())
}
