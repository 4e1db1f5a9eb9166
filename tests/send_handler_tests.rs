mod common;

use std::io::{Cursor, Read};
use std::time::Duration;

use axum::http::{header, StatusCode};
use tower::ServiceExt;

use common::send_http::{
    create_send_test_app, create_send_test_app_with_grace, get, get_with_cookie,
    raw_verify_request, single_policy, verify_request,
};
use common::{body_bytes, body_json, drain_events, setup_temp_dir, write_file};
use ferrydrop::common::TransferEvent;
use ferrydrop::send::session::SessionPolicy;
use ferrydrop::server::shutdown::ShutdownReason;

#[tokio::test]
async fn download_streams_file_with_headers() {
    let dir = setup_temp_dir();
    let file = write_file(dir.path(), "notes.txt", b"hello from ferrydrop");
    let test = create_send_test_app(vec![file], SessionPolicy::new(2)).await;

    let response = test.app.clone().oneshot(get("/download")).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    assert_eq!(headers[header::CONTENT_LENGTH], "20");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"notes.txt\"; filename*=UTF-8''notes.txt"
    );
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(
        headers[header::CACHE_CONTROL],
        "no-cache, no-store, must-revalidate"
    );
    assert_eq!(headers[header::PRAGMA], "no-cache");
    assert_eq!(headers[header::EXPIRES], "0");

    assert_eq!(body_bytes(response).await, b"hello from ferrydrop");
}

#[tokio::test]
async fn second_download_over_limit_is_gone() {
    let dir = setup_temp_dir();
    let file = write_file(dir.path(), "a.bin", &[1u8; 64]);
    let test = create_send_test_app(vec![file], single_policy()).await;

    let first = test.app.clone().oneshot(get("/download")).await.expect("request");
    assert_eq!(first.status(), StatusCode::OK);

    let second = test.app.clone().oneshot(get("/download")).await.expect("request");
    assert_eq!(second.status(), StatusCode::GONE);
    let body = body_json(second).await;
    assert_eq!(body["error"]["type"], "gone");
}

#[tokio::test]
async fn info_reflects_granted_downloads() {
    let dir = setup_temp_dir();
    let file = write_file(dir.path(), "report.pdf", b"%PDF-1.4");
    let test = create_send_test_app(vec![file], SessionPolicy::new(3)).await;

    let _ = test.app.clone().oneshot(get("/download")).await.expect("request");

    let info = body_json(test.app.clone().oneshot(get("/api/info")).await.expect("request")).await;
    assert_eq!(info["filename"], "report.pdf");
    assert_eq!(info["size"], 8);
    assert_eq!(info["limit"], 3);
    assert_eq!(info["current"], 1);
    assert_eq!(info["hasPassword"], false);
    assert_eq!(info["expiry"], 0);
}

#[tokio::test]
async fn password_share_rejects_missing_credentials_without_using_slot() {
    let dir = setup_temp_dir();
    let file = write_file(dir.path(), "secret.txt", b"classified");
    let test =
        create_send_test_app(vec![file], SessionPolicy::new(1).with_password("hunter2")).await;

    let denied = test.app.clone().oneshot(get("/download")).await.expect("request");
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let wrong = test
        .app
        .clone()
        .oneshot(get("/download?code=Hunter2"))
        .await
        .expect("request");
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(test.state.session.info().expect("info").current, 0);

    let allowed = test
        .app
        .clone()
        .oneshot(get("/download?code=hunter2"))
        .await
        .expect("request");
    assert_eq!(allowed.status(), StatusCode::OK);
    assert_eq!(body_bytes(allowed).await, b"classified");
}

#[tokio::test]
async fn verify_issues_cookie_that_unlocks_download() {
    let dir = setup_temp_dir();
    let file = write_file(dir.path(), "secret.txt", b"classified");
    let test = create_send_test_app(vec![file], SessionPolicy::new(1).with_password("pw")).await;

    let rejected = test.app.clone().oneshot(verify_request("nope")).await.expect("request");
    assert_eq!(rejected.status(), StatusCode::OK);
    assert!(rejected.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(body_json(rejected).await["success"], false);

    let accepted = test.app.clone().oneshot(verify_request("pw")).await.expect("request");
    let cookie = accepted
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("access cookie")
        .to_string();
    assert!(cookie.contains("HttpOnly"));
    assert_eq!(body_json(accepted).await["success"], true);

    let pair = cookie.split(';').next().expect("cookie pair");
    let response = test
        .app
        .clone()
        .oneshot(get_with_cookie("/download", pair))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn verify_rejects_malformed_json() {
    let dir = setup_temp_dir();
    let file = write_file(dir.path(), "a.txt", b"a");
    let test = create_send_test_app(vec![file], single_policy()).await;

    let response = test
        .app
        .clone()
        .oneshot(raw_verify_request("{not json"))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["type"], "bad_request");
}

#[tokio::test]
async fn expired_share_is_gone() {
    let dir = setup_temp_dir();
    let file = write_file(dir.path(), "a.txt", b"a");
    let test = create_send_test_app(
        vec![file],
        SessionPolicy::new(0).with_ttl(Duration::from_secs(1)),
    )
    .await;

    let info = body_json(test.app.clone().oneshot(get("/api/info")).await.expect("request")).await;
    assert!(info["expiry"].as_u64().expect("expiry") > 0);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let response = test.app.clone().oneshot(get("/download")).await.expect("request");
    assert_eq!(response.status(), StatusCode::GONE);
}

#[tokio::test]
async fn stopped_session_is_gone_everywhere() {
    let dir = setup_temp_dir();
    let file = write_file(dir.path(), "a.txt", b"a");
    let test = create_send_test_app(vec![file], single_policy()).await;
    assert!(test.state.session.stop());

    let download = test.app.clone().oneshot(get("/download")).await.expect("request");
    assert_eq!(download.status(), StatusCode::GONE);
    let info = test.app.clone().oneshot(get("/api/info")).await.expect("request");
    assert_eq!(info.status(), StatusCode::GONE);
}

#[tokio::test]
async fn folder_share_serves_zip_and_cleans_up_after_final_download() {
    let dir = setup_temp_dir();
    let folder = dir.path().join("photos");
    write_file(&folder, "a.jpg", b"jpeg-a");
    write_file(&folder, "nested/b.jpg", b"jpeg-b");

    let test = create_send_test_app_with_grace(vec![folder], single_policy(), Duration::ZERO).await;
    let archive_path = test.state.session.target().expect("target").path;

    let response = test.app.clone().oneshot(get("/download")).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .expect("ascii")
        .contains("photos.zip"));

    let bytes = body_bytes(response).await;
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip");
    let mut nested = String::new();
    zip.by_name("nested/b.jpg")
        .expect("nested entry")
        .read_to_string(&mut nested)
        .expect("read entry");
    assert_eq!(nested, "jpeg-b");

    let termination = tokio::time::timeout(Duration::from_secs(5), test.state.shutdown.wait())
        .await
        .expect("limit shutdown fires");
    assert_eq!(termination.reason, ShutdownReason::LimitReached);
    assert!(test.state.session.info().is_none());
    assert!(!archive_path.exists());
}

#[tokio::test]
async fn download_emits_start_and_final_progress() {
    let dir = setup_temp_dir();
    let file = write_file(dir.path(), "data.bin", &[9u8; 4096]);
    let mut test = create_send_test_app(vec![file], SessionPolicy::new(0)).await;

    let response = test.app.clone().oneshot(get("/download")).await.expect("request");
    let _ = body_bytes(response).await;

    let events = drain_events(&mut test.events);
    assert!(matches!(
        events.first(),
        Some(TransferEvent::DownloadStarted { sequence: 1, remote: None })
    ));
    let finals: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            TransferEvent::Progress(obs) if obs.percent == 100 => Some(obs),
            _ => None,
        })
        .collect();
    assert_eq!(finals.len(), 1);
    assert_eq!(finals[0].transferred, 4096);
}

#[tokio::test]
async fn landing_page_and_health_respond() {
    let dir = setup_temp_dir();
    let file = write_file(dir.path(), "a.txt", b"a");
    let test = create_send_test_app(vec![file], single_policy()).await;

    let page = test.app.clone().oneshot(get("/")).await.expect("request");
    assert_eq!(page.status(), StatusCode::OK);
    assert!(page.headers()[header::CONTENT_TYPE]
        .to_str()
        .expect("ascii")
        .starts_with("text/html"));

    let health = test.app.clone().oneshot(get("/health")).await.expect("request");
    assert_eq!(body_bytes(health).await, b"OK");
}
