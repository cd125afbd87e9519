//! Reusable fixed-capacity buffer for one in-progress message.

use log::debug;

use super::{AppendStatus, ReassemblyError};
use crate::opcode::SendOpcode;

/// Default buffer capacity.
///
/// One byte above the largest single-frame payload exercised by the
/// conformance suite (65 536 bytes), so boundary cases still fit.
pub const DEFAULT_CAPACITY: usize = 65_537;

/// A message whose bytes have all been received.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletedMessage<'a> {
    /// Opcode to use when echoing the message.
    pub opcode: SendOpcode,
    /// The reassembled payload.
    pub payload: &'a [u8],
}

/// Single-message reassembly state backed by reusable storage.
///
/// The buffer upholds `received <= expected_len <= capacity` at all times,
/// and while inactive both `received` and `expected_len` are zero.
///
/// # Examples
///
/// ```
/// use ws_echo_testee::{
///     opcode::SendOpcode,
///     reassembly::{AppendStatus, ReassemblyBuffer},
/// };
///
/// let mut buffer = ReassemblyBuffer::with_capacity(16);
/// buffer.prepare(10, SendOpcode::Text).expect("fits");
/// assert_eq!(
///     buffer.append(0, b"hello").expect("within bounds"),
///     AppendStatus::Incomplete
/// );
/// assert_eq!(
///     buffer.append(5, b"world").expect("within bounds"),
///     AppendStatus::Complete
/// );
/// let message = buffer.take_completed().expect("message complete");
/// assert_eq!(message.payload, b"helloworld");
/// assert!(!buffer.is_active());
/// ```
#[derive(Debug)]
pub struct ReassemblyBuffer {
    storage: Vec<u8>,
    capacity: usize,
    expected_len: usize,
    received: usize,
    opcode: Option<SendOpcode>,
    active: bool,
}

impl Default for ReassemblyBuffer {
    fn default() -> Self { Self::with_capacity(DEFAULT_CAPACITY) }
}

impl ReassemblyBuffer {
    /// Create an inactive buffer. Storage is allocated lazily.
    #[must_use]
    pub const fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: Vec::new(),
            capacity,
            expected_len: 0,
            received: 0,
            opcode: None,
            active: false,
        }
    }

    /// Allocate the backing storage if it has not been allocated yet.
    ///
    /// Calling this early, before other long-lived allocations, gives the
    /// buffer the best chance of finding a contiguous block.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::OutOfMemory`] if the allocator refuses the
    /// request. The buffer stays unallocated and can be retried later.
    pub fn allocate(&mut self) -> Result<(), ReassemblyError> {
        if self.is_allocated() {
            return Ok(());
        }
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(self.capacity)
            .map_err(|_| ReassemblyError::OutOfMemory {
                requested: self.capacity,
            })?;
        storage.resize(self.capacity, 0);
        self.storage = storage;
        debug!("allocated reassembly buffer: capacity={}", self.capacity);
        Ok(())
    }

    /// Begin assembling a message of `total_len` bytes.
    ///
    /// A zero `total_len` is accepted and leaves the buffer untouched. The
    /// previous content is not cleared; only bytes below
    /// [`received`](Self::received) are meaningful.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::SizeExceeded`] when `total_len` exceeds the
    /// capacity and [`ReassemblyError::OutOfMemory`] when lazy allocation
    /// fails. In both cases the state is left unchanged.
    pub fn prepare(&mut self, total_len: usize, opcode: SendOpcode) -> Result<(), ReassemblyError> {
        if total_len == 0 {
            return Ok(());
        }
        if total_len > self.capacity {
            return Err(ReassemblyError::SizeExceeded {
                requested: total_len,
                capacity: self.capacity,
            });
        }
        self.allocate()?;

        self.expected_len = total_len;
        self.received = 0;
        self.opcode = Some(opcode);
        self.active = true;
        Ok(())
    }

    /// Copy `data` into the buffer at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::Inactive`] when no message is in progress,
    /// [`ReassemblyError::Overflow`] when the chunk would pass the capacity
    /// and [`ReassemblyError::LengthMismatch`] when it would pass the expected
    /// length. A failed call leaves the buffer unchanged.
    pub fn append(&mut self, offset: usize, data: &[u8]) -> Result<AppendStatus, ReassemblyError> {
        if !self.active {
            return Err(ReassemblyError::Inactive);
        }
        let len = data.len();
        let overflow = ReassemblyError::Overflow {
            offset,
            len,
            capacity: self.capacity,
        };
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.capacity)
            .ok_or(overflow)?;
        if end > self.expected_len {
            return Err(ReassemblyError::LengthMismatch {
                offset,
                len,
                expected: self.expected_len,
            });
        }
        let target = self.storage.get_mut(offset..end).ok_or(overflow)?;
        target.copy_from_slice(data);
        self.received = self.received.max(end);

        if self.received == self.expected_len {
            Ok(AppendStatus::Complete)
        } else {
            Ok(AppendStatus::Incomplete)
        }
    }

    /// Check that a continuation chunk at `offset` abuts the received prefix.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::Discontinuity`] when `offset` lies beyond
    /// the bytes received so far.
    pub fn ensure_contiguous(&self, offset: usize) -> Result<(), ReassemblyError> {
        if offset > self.received {
            return Err(ReassemblyError::Discontinuity {
                offset,
                received: self.received,
            });
        }
        Ok(())
    }

    /// Hand out the completed message and mark the buffer inactive.
    ///
    /// Returns `None` unless a message is active and fully received.
    pub fn take_completed(&mut self) -> Option<CompletedMessage<'_>> {
        if !self.active || self.received != self.expected_len {
            return None;
        }
        let opcode = self.opcode?;
        let len = self.expected_len;
        self.reset();
        let payload = self.storage.get(..len)?;
        Some(CompletedMessage { opcode, payload })
    }

    /// Forget the in-progress message. Storage is kept for reuse.
    pub fn reset(&mut self) {
        self.expected_len = 0;
        self.received = 0;
        self.opcode = None;
        self.active = false;
    }

    /// Reset and free the backing storage.
    pub fn release(&mut self) {
        self.reset();
        if self.is_allocated() {
            self.storage = Vec::new();
            debug!("released reassembly buffer");
        }
    }

    /// Whether a message is in progress.
    #[must_use]
    pub const fn is_active(&self) -> bool { self.active }

    /// Whether the backing storage has been allocated.
    #[must_use]
    pub fn is_allocated(&self) -> bool { self.capacity > 0 && self.storage.len() == self.capacity }

    /// Fixed capacity in bytes.
    #[must_use]
    pub const fn capacity(&self) -> usize { self.capacity }

    /// Length of the message being assembled, or zero when inactive.
    #[must_use]
    pub const fn expected_len(&self) -> usize { self.expected_len }

    /// Highest byte offset written so far.
    #[must_use]
    pub const fn received(&self) -> usize { self.received }

    /// Opcode of the message being assembled.
    #[must_use]
    pub const fn opcode(&self) -> Option<SendOpcode> { self.opcode }

    /// Bytes received so far for the active message.
    #[must_use]
    pub fn received_bytes(&self) -> &[u8] { self.storage.get(..self.received).unwrap_or_default() }
}
