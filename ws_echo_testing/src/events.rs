//! Builders for delivery sequences.

use bytes::Bytes;
use ws_echo_testee::{ClientEvent, DeliveryEvent, WireOpcode};

/// Split one frame into deliveries of at most `chunk_size` bytes, the way a
/// transport with a fixed read buffer reports a large frame.
///
/// # Panics
///
/// Panics if `chunk_size` is zero.
#[must_use]
pub fn chunked(opcode: WireOpcode, payload: &[u8], chunk_size: usize) -> Vec<DeliveryEvent> {
    assert!(chunk_size > 0, "chunk size must be non-zero");
    let total = payload.len();
    payload
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, chunk)| {
            let offset = index * chunk_size;
            DeliveryEvent::chunk(
                opcode,
                Bytes::copy_from_slice(chunk),
                total,
                offset,
                offset + chunk.len() == total,
            )
        })
        .collect()
}

/// Wrap deliveries in a full connection: `Connected`, the data, then
/// `Disconnected`.
#[must_use]
pub fn session_events(deliveries: impl IntoIterator<Item = DeliveryEvent>) -> Vec<ClientEvent> {
    std::iter::once(ClientEvent::Connected)
        .chain(deliveries.into_iter().map(ClientEvent::Data))
        .chain(std::iter::once(ClientEvent::Disconnected))
        .collect()
}

/// Deterministic payload of `len` bytes.
#[must_use]
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| u8::try_from(i % 251).unwrap_or_default())
        .collect()
}
