//! Concrete byte sources

pub mod replay;
pub mod serial;

pub use replay::{ExhaustedBehavior, ReplayChunk, ReplayMode, ReplayTransport, WriteLog};
pub use serial::SerialTransport;
