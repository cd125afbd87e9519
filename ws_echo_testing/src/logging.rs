//! Serialised log capture for engine tests.
//!
//! `logtest` installs one process-wide logger, so captures from concurrently
//! running tests would interleave. [`LoggerHandle`] holds a global lock for
//! the lifetime of a test and starts from an empty capture.

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use log::Level;
use logtest::Logger;
use rstest::fixture;

/// Exclusive access to the captured log records.
pub struct LoggerHandle {
    guard: MutexGuard<'static, Logger>,
}

impl LoggerHandle {
    /// Lock the global [`Logger`] and discard records left by earlier tests.
    #[must_use]
    pub fn new() -> Self {
        static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

        let logger = LOGGER.get_or_init(|| Mutex::new(Logger::start()));
        let mut handle = Self {
            guard: logger.lock().unwrap_or_else(PoisonError::into_inner),
        };
        handle.clear();
        handle
    }

    /// Drop every captured record.
    pub fn clear(&mut self) { while self.guard.pop().is_some() {} }

    /// Drain captured records, returning the formatted messages at `level`.
    pub fn messages_at(&mut self, level: Level) -> Vec<String> {
        let mut messages = Vec::new();
        while let Some(record) = self.guard.pop() {
            if record.level() == level {
                messages.push(record.args().to_string());
            }
        }
        messages
    }

    /// Drain captured records and report whether any message at `level`
    /// contains every fragment in `needles`.
    pub fn logged(&mut self, level: Level, needles: &[&str]) -> bool {
        self.messages_at(level)
            .iter()
            .any(|message| needles.iter().all(|needle| message.contains(needle)))
    }
}

impl Default for LoggerHandle {
    fn default() -> Self { Self::new() }
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn logger() -> LoggerHandle { LoggerHandle::new() }
