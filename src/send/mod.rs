pub mod archive;
pub mod content;
pub mod handlers;
pub mod session;
mod state;

pub use archive::{build_archive, ArchiveOutput, TempArchive};
pub use session::{SessionInfo, SessionPolicy, SessionState};
pub use state::SendAppState;
