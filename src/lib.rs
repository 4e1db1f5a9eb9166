pub mod clipboard;
pub mod common;
pub mod output;
pub mod receive;
pub mod send;
pub mod server;
pub mod transport;
pub mod ui;
pub mod utils;
