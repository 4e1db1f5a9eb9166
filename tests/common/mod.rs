#![allow(dead_code)]

pub mod config_test_utils;
pub mod receive_http;
pub mod send_http;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::response::Response;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

use ferrydrop::clipboard::{ClipboardRelay, MemoryClipboard, DEFAULT_CAPACITY};
use ferrydrop::common::events::ChannelEvents;
use ferrydrop::common::{SharedEventSink, TransferEvent};

pub fn setup_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dirs");
    }
    std::fs::write(&path, contents).expect("write test file");
    path
}

pub fn test_events() -> (SharedEventSink, UnboundedReceiver<TransferEvent>) {
    let (sink, rx) = ChannelEvents::new();
    (Arc::new(sink), rx)
}

pub fn drain_events(rx: &mut UnboundedReceiver<TransferEvent>) -> Vec<TransferEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

pub fn memory_relay(initial: &str, events: SharedEventSink) -> (ClipboardRelay, Arc<MemoryClipboard>) {
    let backend = Arc::new(MemoryClipboard::new(initial));
    let relay = ClipboardRelay::new(backend.clone(), DEFAULT_CAPACITY, events);
    (relay, backend)
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("Response body is not JSON")
}
