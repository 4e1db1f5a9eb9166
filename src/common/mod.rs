pub mod config;
pub mod config_commands;
pub mod errors;
pub mod events;

pub use config::AppConfig;
pub use errors::AppError;
pub use events::{EventSink, LogEvents, SharedEventSink, TransferEvent};
