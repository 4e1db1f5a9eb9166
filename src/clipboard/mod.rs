//! Clipboard relay: mirrors the host clipboard into a short history and lets
//! browsers read or replace it.

mod backend;
pub mod handlers;
mod history;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::common::{SharedEventSink, TransferEvent};

pub use backend::{default_backend, ClipboardBackend, MemoryClipboard};
#[cfg(feature = "system-clipboard")]
pub use backend::SystemClipboard;
pub use history::{ClipboardHistory, DEFAULT_CAPACITY};

#[derive(Clone)]
pub struct ClipboardRelay {
    backend: Arc<dyn ClipboardBackend>,
    history: Arc<ClipboardHistory>,
    events: SharedEventSink,
    /// Last value seen by the poller or written through [`set`](Self::set)
    last_seen: Arc<Mutex<String>>,
}

impl ClipboardRelay {
    pub fn new(
        backend: Arc<dyn ClipboardBackend>,
        history_capacity: usize,
        events: SharedEventSink,
    ) -> Self {
        Self {
            backend,
            history: Arc::new(ClipboardHistory::with_capacity(history_capacity)),
            events,
            last_seen: Arc::new(Mutex::new(String::new())),
        }
    }

    pub fn history(&self) -> &ClipboardHistory {
        &self.history
    }

    /// Read the backend on the blocking pool.
    pub async fn current(&self) -> String {
        let backend = Arc::clone(&self.backend);
        match tokio::task::spawn_blocking(move || backend.read()).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!("clipboard read task failed: {}", err);
                String::new()
            }
        }
    }

    /// Replace the clipboard contents and record them.
    pub async fn set(&self, text: String) -> Result<()> {
        let backend = Arc::clone(&self.backend);
        let written = text.clone();
        tokio::task::spawn_blocking(move || backend.write(&written))
            .await
            .context("clipboard write task failed")??;

        self.observe(text);
        Ok(())
    }

    /// One poll step. Returns the new text when the clipboard changed.
    pub async fn poll_once(&self) -> Option<String> {
        let text = self.current().await;
        if self.observe(text.clone()) {
            Some(text)
        } else {
            None
        }
    }

    fn observe(&self, text: String) -> bool {
        if text.is_empty() {
            return false;
        }
        {
            let mut last = match self.last_seen.lock() {
                Ok(guard) => guard,
                Err(poisoned) => {
                    tracing::error!("Clipboard state lock poisoned, recovering");
                    poisoned.into_inner()
                }
            };
            if *last == text {
                return false;
            }
            last.clone_from(&text);
        }

        self.history.add(&text);
        self.events.emit(TransferEvent::ClipboardChanged(text));
        true
    }

    /// Poll the backend every `interval` until `token` is cancelled.
    pub fn spawn_poll_loop(&self, interval: Duration, token: CancellationToken) -> JoinHandle<()> {
        let relay = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        relay.poll_once().await;
                    }
                }
            }
            tracing::debug!("clipboard poll loop stopped");
        })
    }
}
