//! Recording of live traffic into named sessions

mod engine;
mod session;

pub use engine::Recorder;
pub use session::{validate_session_name, HttpSession, SessionCollection};

/// Maximum number of sessions in one collection
pub const MAX_SESSIONS: usize = 1024;
