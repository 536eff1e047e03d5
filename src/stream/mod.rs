//! The `stream` module implements the server side of a resumable event
//! stream on top of the broker: a per-connection `Session` and the `Frame`s
//! it emits.

pub mod frame;
pub mod session;

pub use frame::Frame;
pub use session::{Session, SessionConfig, SessionEnd};
