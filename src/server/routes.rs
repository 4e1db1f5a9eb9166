//! Router definitions for send, receive, and clipboard modes

use crate::{
    clipboard::{self, ClipboardRelay},
    receive::{self, ReceiveAppState},
    send::{self, SendAppState},
    ui::web,
};
use axum::{
    extract::DefaultBodyLimit,
    response::Redirect,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Endpoints every mode exposes.
fn shared_routes(clipboard: &ClipboardRelay) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/styles.css", get(|| async { web::serve_shared_css() }))
        .route(
            clipboard::handlers::CLIPBOARD_PATH,
            get(clipboard::handlers::clipboard_page).post(clipboard::handlers::set_clipboard),
        )
        .route(
            "/clipboard-data",
            get(clipboard::handlers::clipboard_data),
        )
        .route(
            "/clipboard-history",
            get(clipboard::handlers::clipboard_history),
        )
        .with_state(clipboard.clone())
}

/// Build the router for send endpoints and web assets.
pub fn create_send_router(state: &SendAppState, clipboard: &ClipboardRelay) -> Router {
    Router::new()
        .route("/", get(|| async { web::serve_download_page() }))
        .route("/api/info", get(send::handlers::info_handler))
        .route("/api/verify", post(send::handlers::verify_handler))
        .route("/download", get(send::handlers::download_handler))
        .with_state(state.clone())
        .merge(shared_routes(clipboard))
        .layer(TraceLayer::new_for_http())
}

/// Build the router for browser uploads into `state.save_dir`.
pub fn create_receive_router(
    state: &ReceiveAppState,
    clipboard: &ClipboardRelay,
    upload_limit: usize,
) -> Router {
    Router::new()
        .route("/", get(|| async { web::serve_upload_page() }))
        .route(
            "/upload",
            post(receive::handlers::upload_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state.clone())
        .merge(shared_routes(clipboard))
        .layer(TraceLayer::new_for_http())
}

/// Clipboard-only server.
pub fn create_clipboard_router(clipboard: &ClipboardRelay) -> Router {
    Router::new()
        .route(
            "/",
            get(|| async { Redirect::to(clipboard::handlers::CLIPBOARD_PATH) }),
        )
        .merge(shared_routes(clipboard))
        .layer(TraceLayer::new_for_http())
}
