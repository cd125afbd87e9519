//! Metric helpers for the echo engine.
//!
//! This module defines metric names and thin wrappers around the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::counter;

use crate::opcode::SendOpcode;

/// Name of the counter tracking successfully echoed messages.
pub const MESSAGES_ECHOED: &str = "testee_messages_echoed_total";
/// Name of the counter tracking discarded deliveries.
pub const MESSAGES_DROPPED: &str = "testee_messages_dropped_total";
/// Name of the counter tracking echo send retries.
pub const SEND_RETRIES: &str = "testee_send_retries_total";
/// Name of the counter tracking finished sessions.
pub const SESSIONS: &str = "testee_sessions_total";

/// Record an echoed message.
pub fn inc_echoed(opcode: SendOpcode) {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_ECHOED, "opcode" => opcode.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = opcode;
}

/// Record a discarded delivery with a short reason label.
pub fn inc_dropped(reason: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_DROPPED, "reason" => reason).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = reason;
}

/// Record one echo retry.
pub fn inc_send_retries() {
    #[cfg(feature = "metrics")]
    counter!(SEND_RETRIES).increment(1);
}

/// Record a finished session, labelled by how it ended.
pub fn inc_sessions(end: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(SESSIONS, "end" => end).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = end;
}
