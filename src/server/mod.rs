mod api;
pub mod auth;
pub mod progress;
pub mod routes;
pub mod shutdown;

pub use api::{RunningServer, ServerHost};
pub use shutdown::{ShutdownCoordinator, ShutdownReason, Termination};
