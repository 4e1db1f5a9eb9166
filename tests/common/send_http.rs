use std::path::PathBuf;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use tokio::sync::mpsc::UnboundedReceiver;

use ferrydrop::common::TransferEvent;
use ferrydrop::send::session::{SessionInfo, SessionPolicy, SessionState};
use ferrydrop::send::SendAppState;
use ferrydrop::server::routes;
use ferrydrop::server::shutdown::ShutdownCoordinator;

use super::{memory_relay, test_events};

pub struct SendTestApp {
    pub app: Router,
    pub state: SendAppState,
    pub info: SessionInfo,
    pub events: UnboundedReceiver<TransferEvent>,
}

//===========
// App Factory
//===========
pub async fn create_send_test_app(paths: Vec<PathBuf>, policy: SessionPolicy) -> SendTestApp {
    create_send_test_app_with_grace(paths, policy, Duration::from_secs(5)).await
}

pub async fn create_send_test_app_with_grace(
    paths: Vec<PathBuf>,
    policy: SessionPolicy,
    grace_delay: Duration,
) -> SendTestApp {
    let (events, rx) = test_events();
    let session = SessionState::new();
    let info = session
        .start(paths, policy)
        .await
        .expect("Failed to start session");

    let shutdown = ShutdownCoordinator::new(
        axum_server::Handle::new(),
        Some((session.clone(), info.id)),
        None,
        events.clone(),
    );
    // No real listener behind these routers
    shutdown.listener_closed_token().cancel();

    let state = SendAppState {
        session,
        shutdown,
        events: events.clone(),
        grace_delay,
    };
    let (relay, _) = memory_relay("", events);
    let app = routes::create_send_router(&state, &relay);

    SendTestApp {
        app,
        state,
        info,
        events: rx,
    }
}

//=================
// Request Builders
//=================
pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn verify_request(code: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/verify")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::to_vec(&serde_json::json!({ "code": code })).expect("serialize"),
        ))
        .expect("Failed to build request")
}

pub fn raw_verify_request(body: &'static str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/verify")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("Failed to build request")
}

pub fn single_policy() -> SessionPolicy {
    SessionPolicy::new(1)
}
