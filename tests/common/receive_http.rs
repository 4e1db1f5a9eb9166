use std::path::Path;

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use tokio::sync::mpsc::UnboundedReceiver;

use ferrydrop::common::TransferEvent;
use ferrydrop::receive::ReceiveAppState;
use ferrydrop::server::routes;

use super::{memory_relay, test_events};

pub const BOUNDARY: &str = "----WebKitFormBoundary7MA4YWxkTrZu0gW";

//===========
// App Factory
//===========
pub fn create_receive_test_app(
    save_dir: &Path,
    upload_limit: usize,
) -> (Router, UnboundedReceiver<TransferEvent>) {
    let (events, rx) = test_events();
    let state = ReceiveAppState::new(save_dir.to_path_buf(), events.clone());
    let (relay, _) = memory_relay("", events);
    (routes::create_receive_router(&state, &relay, upload_limit), rx)
}

//=================
// Request Builders
//=================
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub data: &'a [u8],
}

pub fn file_part<'a>(filename: &'a str, data: &'a [u8]) -> Part<'a> {
    Part {
        name: "file",
        filename: Some(filename),
        data,
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    part.name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                    .as_bytes(),
            ),
        }
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
    let body = multipart_body(parts);
    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .expect("Failed to build request")
}
