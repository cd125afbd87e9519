//! Timing configuration for echo sends.

use std::{num::NonZeroU32, time::Duration};

use serde::{Deserialize, Serialize};

/// Number of entries in a [`BackoffSchedule`] before it saturates.
pub const BACKOFF_STEPS: usize = 6;

/// Attempt cap applied by [`EchoConfig::default`].
pub const DEFAULT_MAX_ATTEMPTS: NonZeroU32 = NonZeroU32::MIN.saturating_add(63);

/// Fixed delay table consulted by retry index.
///
/// Retry `n` sleeps for `steps[n]`; once the table is exhausted every further
/// retry sleeps for `saturated`.
///
/// # Default Values
/// - `steps`: 1, 1, 1, 2, 4, 8 milliseconds
/// - `saturated`: 32 milliseconds
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use ws_echo_testee::echo::BackoffSchedule;
///
/// let schedule = BackoffSchedule::default();
/// assert_eq!(schedule.delay_for(0), Duration::from_millis(1));
/// assert_eq!(schedule.delay_for(5), Duration::from_millis(8));
/// assert_eq!(schedule.delay_for(100), Duration::from_millis(32));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffSchedule {
    /// Delays for the first retries.
    pub steps: [Duration; BACKOFF_STEPS],
    /// Delay for every retry past the end of `steps`.
    pub saturated: Duration,
}

impl BackoffSchedule {
    /// Schedule used when none is configured.
    pub const DEFAULT: Self = Self {
        steps: [
            Duration::from_millis(1),
            Duration::from_millis(1),
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::from_millis(4),
            Duration::from_millis(8),
        ],
        saturated: Duration::from_millis(32),
    };

    /// Delay to sleep before retry number `retry` (zero-based).
    #[must_use]
    pub fn delay_for(&self, retry: usize) -> Duration {
        self.steps.get(retry).copied().unwrap_or(self.saturated)
    }

    /// Make the schedule non-decreasing and bounded by `saturated`.
    ///
    /// Each step is raised to at least its predecessor, and `saturated` is
    /// raised to at least the last step, so no retry ever waits longer than
    /// the saturated delay.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use ws_echo_testee::echo::BackoffSchedule;
    ///
    /// let ms = Duration::from_millis;
    /// let schedule = BackoffSchedule {
    ///     steps: [ms(4), ms(2), ms(8), ms(1), ms(16), ms(3)],
    ///     saturated: ms(5),
    /// }
    /// .normalized();
    ///
    /// assert_eq!(schedule.steps, [ms(4), ms(4), ms(8), ms(8), ms(16), ms(16)]);
    /// assert_eq!(schedule.saturated, ms(16));
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let mut floor = Duration::ZERO;
        for step in &mut self.steps {
            floor = floor.max(*step);
            *step = floor;
        }
        self.saturated = self.saturated.max(floor);
        self
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self { Self::DEFAULT }
}

/// Per-attempt send timeouts scaled by payload size.
///
/// Payloads up to `small_payload_limit` bytes get
/// `base + len / bytes_per_ms` milliseconds, capped at `small_ceiling`.
/// Larger payloads are split into several chunks by the transport and each
/// chunk gets the fixed `large_chunk` timeout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendTimeouts {
    /// Largest payload treated as small.
    pub small_payload_limit: usize,
    /// Timeout for an empty small payload.
    pub base: Duration,
    /// Payload bytes that add one millisecond to the small timeout.
    pub bytes_per_ms: usize,
    /// Upper bound for small-payload timeouts.
    pub small_ceiling: Duration,
    /// Timeout per transport chunk for large payloads.
    pub large_chunk: Duration,
}

impl SendTimeouts {
    /// Timeouts used when none are configured.
    pub const DEFAULT: Self = Self {
        small_payload_limit: 1024,
        base: Duration::from_millis(10),
        bytes_per_ms: 256,
        small_ceiling: Duration::from_millis(100),
        large_chunk: Duration::from_millis(500),
    };

    /// Timeout for one attempt at sending `len` bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use ws_echo_testee::echo::SendTimeouts;
    ///
    /// let timeouts = SendTimeouts::default();
    /// assert_eq!(timeouts.timeout_for(0), Duration::from_millis(10));
    /// assert_eq!(timeouts.timeout_for(1024), Duration::from_millis(14));
    /// assert_eq!(timeouts.timeout_for(1025), Duration::from_millis(500));
    /// ```
    #[must_use]
    pub fn timeout_for(&self, len: usize) -> Duration {
        if len > self.small_payload_limit {
            return self.large_chunk;
        }
        let extra_ms = u64::try_from(len / self.bytes_per_ms.max(1)).unwrap_or(u64::MAX);
        self.base
            .saturating_add(Duration::from_millis(extra_ms))
            .min(self.small_ceiling)
    }
}

impl Default for SendTimeouts {
    fn default() -> Self { Self::DEFAULT }
}

/// Configuration for [`EchoSender`](super::EchoSender).
///
/// # Examples
///
/// ```
/// use std::num::NonZeroU32;
///
/// use ws_echo_testee::echo::EchoConfig;
///
/// let config = EchoConfig::default().with_max_attempts(NonZeroU32::new(3));
/// assert_eq!(config.max_attempts, NonZeroU32::new(3));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    /// Delays between attempts.
    pub backoff: BackoffSchedule,
    /// Per-attempt timeouts.
    pub timeouts: SendTimeouts,
    /// Upper bound on attempts per message; `None` retries for as long as
    /// the connection stays up.
    pub max_attempts: Option<NonZeroU32>,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffSchedule::DEFAULT,
            timeouts: SendTimeouts::DEFAULT,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
        }
    }
}

impl EchoConfig {
    /// Replace the backoff schedule.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffSchedule) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replace the per-attempt timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: SendTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set or clear the attempt cap.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: Option<NonZeroU32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Clamp inconsistent values.
    ///
    /// Normalises the backoff schedule, raises `small_ceiling` to at least
    /// `base`, and forces `bytes_per_ms` to be non-zero.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.backoff = self.backoff.normalized();
        self.timeouts.small_ceiling = self.timeouts.small_ceiling.max(self.timeouts.base);
        self.timeouts.bytes_per_ms = self.timeouts.bytes_per_ms.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 10)]
    #[case(255, 10)]
    #[case(256, 11)]
    #[case(1000, 13)]
    #[case(1024, 14)]
    #[case(1025, 500)]
    #[case(65_536, 500)]
    fn default_timeouts_scale_with_payload(#[case] len: usize, #[case] expected_ms: u64) {
        assert_eq!(
            SendTimeouts::default().timeout_for(len),
            Duration::from_millis(expected_ms)
        );
    }

    #[test]
    fn small_timeouts_respect_ceiling() {
        let timeouts = SendTimeouts {
            bytes_per_ms: 1,
            ..SendTimeouts::DEFAULT
        };
        assert_eq!(timeouts.timeout_for(1024), Duration::from_millis(100));
    }

    #[test]
    fn zero_bytes_per_ms_does_not_divide_by_zero() {
        let timeouts = SendTimeouts {
            bytes_per_ms: 0,
            ..SendTimeouts::DEFAULT
        };
        assert_eq!(timeouts.timeout_for(50), Duration::from_millis(60));
    }

    #[test]
    fn default_schedule_is_already_normalized() {
        assert_eq!(BackoffSchedule::DEFAULT.normalized(), BackoffSchedule::DEFAULT);
    }

    #[test]
    fn schedule_saturates_after_last_step() {
        let schedule = BackoffSchedule::default();
        for retry in BACKOFF_STEPS..BACKOFF_STEPS + 10 {
            assert_eq!(schedule.delay_for(retry), schedule.saturated);
        }
    }

    #[test]
    fn default_config_caps_attempts() {
        assert_eq!(
            EchoConfig::default().max_attempts.map(NonZeroU32::get),
            Some(64)
        );
    }

    #[test]
    fn normalized_config_fixes_inverted_ceiling() {
        let config = EchoConfig::default()
            .with_timeouts(SendTimeouts {
                base: Duration::from_millis(50),
                small_ceiling: Duration::from_millis(5),
                bytes_per_ms: 0,
                ..SendTimeouts::DEFAULT
            })
            .normalized();
        assert_eq!(config.timeouts.small_ceiling, Duration::from_millis(50));
        assert_eq!(config.timeouts.bytes_per_ms, 1);
    }

    #[test]
    fn config_deserializes_with_defaults_for_missing_fields() {
        let config: EchoConfig =
            serde_json::from_str(r#"{"max_attempts": null}"#).expect("valid config");
        assert_eq!(config.max_attempts, None);
        assert_eq!(config.backoff, BackoffSchedule::DEFAULT);
        assert_eq!(config.timeouts, SendTimeouts::DEFAULT);
    }
}
