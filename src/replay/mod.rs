//! Replay of recorded sessions in strict order

mod cursor;
mod engine;

pub use cursor::Cursor;
pub use engine::Replayer;
