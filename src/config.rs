//! Engine configuration.
//!
//! [`TesteeConfig`] groups the reassembly capacity with the echo timing
//! settings. Every field has a default matching the conformance suite's
//! needs, so embedding applications usually only override a few values.

use serde::{Deserialize, Serialize};

use crate::{echo::EchoConfig, reassembly::DEFAULT_CAPACITY};

/// Configuration for a [`Dispatcher`](crate::dispatcher::Dispatcher).
///
/// # Examples
///
/// ```
/// use ws_echo_testee::{config::TesteeConfig, dispatcher::Dispatcher};
///
/// let config = TesteeConfig::default().with_capacity(1024);
/// let dispatcher = Dispatcher::from_config(&config);
/// assert_eq!(dispatcher.buffer().capacity(), 1024);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesteeConfig {
    /// Largest logical message that can be reassembled, in bytes.
    pub capacity: usize,
    /// Echo timing and retry settings.
    pub echo: EchoConfig,
}

impl Default for TesteeConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            echo: EchoConfig::default(),
        }
    }
}

impl TesteeConfig {
    /// Set the reassembly capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Replace the echo settings.
    #[must_use]
    pub fn with_echo(mut self, echo: EchoConfig) -> Self {
        self.echo = echo;
        self
    }
}
