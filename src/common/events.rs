//! Observations forwarded from the transfer engine to whoever is watching
//! (terminal output, logs, tests).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::server::progress::ProgressObservation;
use crate::server::shutdown::Termination;

#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    DownloadStarted {
        remote: Option<SocketAddr>,
        sequence: u32,
    },
    Progress(ProgressObservation),
    FileReceived {
        name: String,
        bytes: u64,
    },
    ClipboardChanged(String),
    Stopped(Termination),
}

/// Receiver of transfer events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TransferEvent);
}

pub type SharedEventSink = Arc<dyn EventSink>;

/// Sink that writes every event to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEvents;

impl EventSink for LogEvents {
    fn emit(&self, event: TransferEvent) {
        match event {
            TransferEvent::DownloadStarted { remote, sequence } => match remote {
                Some(addr) => tracing::info!(%addr, sequence, "download started"),
                None => tracing::info!(sequence, "download started"),
            },
            TransferEvent::Progress(obs) => tracing::trace!(
                transferred = obs.transferred,
                total = obs.total,
                percent = obs.percent,
                "transfer progress"
            ),
            TransferEvent::FileReceived { name, bytes } => {
                tracing::info!(name, bytes, "file received")
            }
            TransferEvent::ClipboardChanged(text) => {
                tracing::debug!(len = text.len(), "clipboard changed")
            }
            TransferEvent::Stopped(termination) => {
                tracing::info!(reason = %termination.reason, "server stopped")
            }
        }
    }
}

/// Sink that forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelEvents {
    sender: mpsc::UnboundedSender<TransferEvent>,
}

impl ChannelEvents {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransferEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEvents {
    fn emit(&self, event: TransferEvent) {
        // Receiver gone just means nobody is watching anymore
        let _ = self.sender.send(event);
    }
}
