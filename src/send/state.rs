use std::sync::Arc;
use std::time::Duration;

use crate::common::SharedEventSink;
use crate::send::session::SessionState;
use crate::server::shutdown::ShutdownCoordinator;

/// Send-specific application state.
/// Passed to all send handlers via Axum State extractor
#[derive(Clone)]
pub struct SendAppState {
    pub session: SessionState,
    pub shutdown: Arc<ShutdownCoordinator>,
    pub events: SharedEventSink,
    /// Delay between the final allowed download and shutdown
    pub grace_delay: Duration,
}
