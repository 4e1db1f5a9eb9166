//! Request extractors and gating helpers for the download endpoint.

use std::convert::Infallible;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use serde::Deserialize;

use crate::common::AppError;
use crate::send::session::{DownloadCredentials, SessionState, SlotGrant};

/// Cookie set by `/api/verify` once the password was accepted.
pub const ACCESS_COOKIE: &str = "ferrydrop_access";

#[derive(Deserialize)]
struct CodeQuery {
    code: Option<String>,
}

/// Collects `?code=` and the access cookie. Missing values are not an error
/// here; [`require_download_access`] decides.
#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for DownloadCredentials {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let code = Query::<CodeQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.code);

        Ok(DownloadCredentials {
            code,
            access_token: cookie_value(&parts.headers, ACCESS_COOKIE),
        })
    }
}

/// Value of cookie `name` from the `Cookie` header(s).
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value for a freshly issued access token.
pub fn access_cookie(token: &str) -> String {
    format!("{ACCESS_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict")
}

/// Reject requests that do not prove knowledge of the share password.
pub fn require_download_access(
    session: &SessionState,
    credentials: &DownloadCredentials,
) -> Result<(), AppError> {
    if !session.is_authorized(credentials) {
        return Err(AppError::Unauthorized("password required".to_string()));
    }
    Ok(())
}

/// Take a download slot or explain why there is none left.
pub fn claim_download_slot(session: &SessionState) -> Result<SlotGrant, AppError> {
    session
        .try_consume_slot()
        .map_err(|denied| AppError::Gone(denied.to_string()))
}
