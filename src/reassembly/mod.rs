//! Fixed-capacity reassembly of fragmented WebSocket messages.
//!
//! A single [`ReassemblyBuffer`] is reused for every message of a test run.
//! Its storage is allocated once and only the logical content is invalidated
//! between messages, so large payloads never force repeated allocation.

pub mod buffer;
pub mod error;

pub use buffer::{CompletedMessage, DEFAULT_CAPACITY, ReassemblyBuffer};
pub use error::{AppendStatus, ReassemblyError};

#[cfg(test)]
mod tests;
