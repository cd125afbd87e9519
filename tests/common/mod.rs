//! Shared utilities for integration tests.
//!
//! Provides fixtures for a connected [`MockTransport`] and a [`Dispatcher`]
//! whose session has already begun.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use rstest::fixture;
use ws_echo_testee::Dispatcher;
use ws_echo_testing::MockTransport;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[fixture]
pub fn transport() -> MockTransport { MockTransport::connected() }

#[fixture]
pub fn dispatcher() -> Dispatcher {
    let mut dispatcher = Dispatcher::default();
    dispatcher.begin_session();
    dispatcher
}
