pub mod local;

pub use local::{bind_available, get_local_ip, start_local_server, BindError, BindScope};
