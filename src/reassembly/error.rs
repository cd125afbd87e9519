//! Error and status types emitted by the reassembly buffer.

use thiserror::Error;

/// Result of appending a chunk to the [`ReassemblyBuffer`](super::ReassemblyBuffer).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendStatus {
    /// The logical message still expects more bytes.
    Incomplete,
    /// The chunk completed the logical message.
    Complete,
}

/// Errors produced while reassembling a message.
///
/// None of these are fatal: the dispatcher resets the buffer and waits for
/// the next message.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ReassemblyError {
    /// The announced message does not fit into the buffer.
    #[error("message of {requested} bytes exceeds reassembly capacity of {capacity} bytes")]
    SizeExceeded {
        /// Logical message length announced by the transport.
        requested: usize,
        /// Fixed buffer capacity.
        capacity: usize,
    },
    /// Backing storage could not be allocated.
    #[error("failed to allocate {requested} byte reassembly buffer")]
    OutOfMemory {
        /// Size of the attempted allocation.
        requested: usize,
    },
    /// The chunk would write past the end of the buffer.
    #[error("chunk of {len} bytes at offset {offset} overflows capacity {capacity}")]
    Overflow {
        /// Offset of the rejected chunk.
        offset: usize,
        /// Length of the rejected chunk.
        len: usize,
        /// Fixed buffer capacity.
        capacity: usize,
    },
    /// The chunk would write past the announced message length.
    #[error("chunk of {len} bytes at offset {offset} exceeds expected length {expected}")]
    LengthMismatch {
        /// Offset of the rejected chunk.
        offset: usize,
        /// Length of the rejected chunk.
        len: usize,
        /// Logical message length being assembled.
        expected: usize,
    },
    /// A continuation chunk starts beyond the bytes received so far.
    #[error("chunk at offset {offset} leaves a gap after {received} received bytes")]
    Discontinuity {
        /// Offset of the rejected chunk.
        offset: usize,
        /// Bytes received before the chunk arrived.
        received: usize,
    },
    /// No message is being assembled.
    #[error("no message is being reassembled")]
    Inactive,
}

impl ReassemblyError {
    /// Short label describing the failure, used for log fields and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SizeExceeded { .. } => "size_exceeded",
            Self::OutOfMemory { .. } => "out_of_memory",
            Self::Overflow { .. } => "overflow",
            Self::LengthMismatch { .. } => "length_mismatch",
            Self::Discontinuity { .. } => "discontinuity",
            Self::Inactive => "inactive",
        }
    }
}
