use std::path::PathBuf;

use crate::common::SharedEventSink;

/// Receive-specific application state
#[derive(Clone)]
pub struct ReceiveAppState {
    /// Existing directory uploads are written into
    pub save_dir: PathBuf,
    pub events: SharedEventSink,
}

impl ReceiveAppState {
    pub fn new(save_dir: PathBuf, events: SharedEventSink) -> Self {
        Self { save_dir, events }
    }
}
