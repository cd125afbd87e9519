//! Tests for buffer preparation, bounds checks and completion.

use proptest::prelude::*;
use rstest::{fixture, rstest};

use super::{AppendStatus, DEFAULT_CAPACITY, ReassemblyBuffer, ReassemblyError};
use crate::opcode::SendOpcode;

#[fixture]
fn buffer() -> ReassemblyBuffer { ReassemblyBuffer::default() }

#[rstest]
fn reassembles_two_half_chunks_of_64k(mut buffer: ReassemblyBuffer) {
    let first = vec![0xAA_u8; 32_768];
    let second = vec![0x55_u8; 32_768];

    buffer
        .prepare(65_536, SendOpcode::Text)
        .expect("64 KiB fits the default capacity");
    assert_eq!(
        buffer.append(0, &first).expect("first half accepted"),
        AppendStatus::Incomplete
    );
    assert_eq!(
        buffer.append(32_768, &second).expect("second half accepted"),
        AppendStatus::Complete
    );
    assert_eq!(buffer.received(), 65_536);

    let message = buffer.take_completed().expect("message complete");
    assert_eq!(message.opcode, SendOpcode::Text);
    assert_eq!(message.payload.get(..32_768), Some(first.as_slice()));
    assert_eq!(message.payload.get(32_768..), Some(second.as_slice()));
}

#[rstest]
fn rejects_chunk_past_expected_length(mut buffer: ReassemblyBuffer) {
    buffer.prepare(100, SendOpcode::Text).expect("fits");

    let err = buffer
        .append(50, &[0_u8; 60])
        .expect_err("50 + 60 exceeds the expected 100 bytes");

    assert_eq!(
        err,
        ReassemblyError::LengthMismatch {
            offset: 50,
            len: 60,
            expected: 100,
        }
    );
    assert_eq!(buffer.received(), 0);
}

#[rstest]
fn prepare_with_zero_length_is_a_no_op(mut buffer: ReassemblyBuffer) {
    buffer.prepare(0, SendOpcode::Binary).expect("no-op succeeds");

    assert!(!buffer.is_active());
    assert!(!buffer.is_allocated());
    assert_eq!(buffer.opcode(), None);
}

#[test]
fn prepare_rejects_messages_larger_than_capacity() {
    let mut buffer = ReassemblyBuffer::with_capacity(8);

    let err = buffer
        .prepare(9, SendOpcode::Binary)
        .expect_err("nine bytes do not fit");

    assert_eq!(
        err,
        ReassemblyError::SizeExceeded {
            requested: 9,
            capacity: 8,
        }
    );
    assert!(!buffer.is_active());
    assert!(!buffer.is_allocated());
}

#[rstest]
fn prepare_allocates_lazily_once(mut buffer: ReassemblyBuffer) {
    assert!(!buffer.is_allocated());
    buffer.prepare(4, SendOpcode::Text).expect("fits");
    assert!(buffer.is_allocated());
    assert_eq!(buffer.capacity(), DEFAULT_CAPACITY);

    buffer.reset();
    assert!(buffer.is_allocated(), "reset keeps the storage");
}

#[rstest]
fn append_requires_an_active_message(mut buffer: ReassemblyBuffer) {
    assert_eq!(buffer.append(0, b"x"), Err(ReassemblyError::Inactive));
}

#[test]
fn append_reports_overflow_before_length_mismatch() {
    let mut buffer = ReassemblyBuffer::with_capacity(8);
    buffer.prepare(8, SendOpcode::Binary).expect("fits");

    let err = buffer
        .append(6, &[1, 2, 3])
        .expect_err("chunk crosses the capacity");

    assert_eq!(
        err,
        ReassemblyError::Overflow {
            offset: 6,
            len: 3,
            capacity: 8,
        }
    );
}

#[test]
fn append_treats_offset_overflow_as_buffer_overflow() {
    let mut buffer = ReassemblyBuffer::with_capacity(8);
    buffer.prepare(8, SendOpcode::Binary).expect("fits");

    let err = buffer
        .append(usize::MAX, &[1])
        .expect_err("offset arithmetic overflows");

    assert!(matches!(err, ReassemblyError::Overflow { .. }));
}

#[rstest]
fn reset_is_idempotent(mut buffer: ReassemblyBuffer) {
    buffer.reset();
    assert!(!buffer.is_active());

    buffer.prepare(10, SendOpcode::Text).expect("fits");
    buffer.append(0, b"abc").expect("accepted");
    buffer.reset();
    let once = (
        buffer.is_active(),
        buffer.expected_len(),
        buffer.received(),
        buffer.opcode(),
    );
    buffer.reset();
    let twice = (
        buffer.is_active(),
        buffer.expected_len(),
        buffer.received(),
        buffer.opcode(),
    );

    assert_eq!(once, (false, 0, 0, None));
    assert_eq!(once, twice);
}

#[rstest]
fn take_completed_requires_full_message(mut buffer: ReassemblyBuffer) {
    buffer.prepare(4, SendOpcode::Binary).expect("fits");
    buffer.append(0, b"ab").expect("accepted");

    assert!(buffer.take_completed().is_none());
    assert!(buffer.is_active(), "partial message stays in progress");
}

#[rstest]
fn repeated_chunk_does_not_lower_received(mut buffer: ReassemblyBuffer) {
    buffer.prepare(6, SendOpcode::Text).expect("fits");
    buffer.append(0, b"abcd").expect("accepted");
    buffer.append(0, b"ab").expect("rewrite accepted");

    assert_eq!(buffer.received(), 4);
}

#[rstest]
fn received_bytes_exposes_only_the_written_prefix(mut buffer: ReassemblyBuffer) {
    assert!(buffer.received_bytes().is_empty());

    buffer.prepare(8, SendOpcode::Binary).expect("fits");
    buffer.append(0, b"abc").expect("accepted");
    assert_eq!(buffer.received_bytes(), b"abc");

    buffer.reset();
    assert!(buffer.received_bytes().is_empty(), "reset hides old content");
}

#[rstest]
fn ensure_contiguous_rejects_gaps(mut buffer: ReassemblyBuffer) {
    buffer.prepare(10, SendOpcode::Text).expect("fits");
    buffer.append(0, b"abc").expect("accepted");

    assert_eq!(buffer.ensure_contiguous(3), Ok(()));
    assert_eq!(buffer.ensure_contiguous(1), Ok(()));
    assert_eq!(
        buffer.ensure_contiguous(4),
        Err(ReassemblyError::Discontinuity {
            offset: 4,
            received: 3,
        })
    );
}

#[rstest]
fn release_frees_storage_and_lazy_allocation_recovers(mut buffer: ReassemblyBuffer) {
    buffer.allocate().expect("allocation succeeds");
    buffer.release();
    assert!(!buffer.is_allocated());

    buffer.prepare(2, SendOpcode::Text).expect("reallocates lazily");
    assert!(buffer.is_allocated());
}

fn contiguous_chunks(message: &[u8], cuts: &[usize]) -> Vec<(usize, Vec<u8>)> {
    let mut bounds: Vec<usize> = cuts
        .iter()
        .map(|cut| cut % message.len())
        .filter(|cut| *cut > 0)
        .collect();
    bounds.sort_unstable();
    bounds.dedup();
    bounds.push(message.len());

    let mut start = 0;
    let mut chunks = Vec::with_capacity(bounds.len());
    for end in bounds {
        chunks.push((start, message[start..end].to_vec()));
        start = end;
    }
    chunks
}

proptest! {
    #[test]
    fn reassembles_any_contiguous_split(
        message in proptest::collection::vec(any::<u8>(), 1..512),
        cuts in proptest::collection::vec(any::<usize>(), 0..16),
    ) {
        let mut buffer = ReassemblyBuffer::with_capacity(512);
        buffer.prepare(message.len(), SendOpcode::Binary).expect("fits");

        let chunks = contiguous_chunks(&message, &cuts);
        let mut completions = 0;
        for (index, (offset, data)) in chunks.iter().enumerate() {
            let status = buffer.append(*offset, data).expect("chunk within bounds");
            if status == AppendStatus::Complete {
                completions += 1;
                prop_assert_eq!(index, chunks.len() - 1);
            }
        }

        prop_assert_eq!(completions, 1);
        let completed = buffer.take_completed().expect("message complete");
        prop_assert_eq!(completed.payload, message.as_slice());
    }

    #[test]
    fn received_never_exceeds_capacity(
        expected in 1_usize..=64,
        appends in proptest::collection::vec((0_usize..96, 0_usize..48), 1..24),
    ) {
        let mut buffer = ReassemblyBuffer::with_capacity(64);
        buffer.prepare(expected, SendOpcode::Text).expect("fits");

        for (offset, len) in appends {
            let before = buffer.received();
            let data = vec![7_u8; len];
            match buffer.append(offset, &data) {
                Ok(_) => prop_assert!(buffer.received() <= buffer.expected_len()),
                Err(ReassemblyError::Overflow { .. }) => {
                    prop_assert!(offset + len > buffer.capacity());
                    prop_assert_eq!(buffer.received(), before);
                }
                Err(ReassemblyError::LengthMismatch { .. }) => {
                    prop_assert!(offset + len > buffer.expected_len());
                    prop_assert_eq!(buffer.received(), before);
                }
                Err(other) => prop_assert!(false, "unexpected error: {other}"),
            }
            prop_assert!(buffer.received() <= buffer.capacity());
        }
    }
}
