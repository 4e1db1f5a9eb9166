use axum::{
    http::header,
    response::{Html, IntoResponse},
};

//-- HELPER FUNCS
const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self'; img-src 'self' data:; connect-src 'self'; object-src 'none'; base-uri 'none'; form-action 'self'; frame-ancestors 'none'";

fn hardening_headers() -> [(header::HeaderName, &'static str); 4] {
    [
        (header::CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY),
        (header::X_FRAME_OPTIONS, "DENY"),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::REFERRER_POLICY, "no-referrer"),
    ]
}

fn serve_html(content: &'static str) -> impl IntoResponse {
    (hardening_headers(), Html(content))
}

//-- PAGES
pub fn serve_download_page() -> impl IntoResponse {
    serve_html(include_str!("download.html"))
}

pub fn serve_upload_page() -> impl IntoResponse {
    serve_html(include_str!("upload.html"))
}

pub fn serve_upload_success() -> impl IntoResponse {
    serve_html(include_str!("success.html"))
}

pub fn serve_clipboard_page() -> impl IntoResponse {
    serve_html(include_str!("clipboard.html"))
}

//-- SHARED CSS
pub fn serve_shared_css() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/css; charset=utf-8"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        include_str!("styles.css"),
    )
}
