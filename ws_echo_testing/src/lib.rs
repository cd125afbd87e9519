//! Test doubles for driving the echo engine without a network.
//!
//! [`MockTransport`] records every send attempt and can be scripted to fail
//! or drop the connection; [`ScriptedConnector`] hands out prepared
//! connections to a [`SuiteRunner`](ws_echo_testee::SuiteRunner).
//!
//! ```rust
//! use ws_echo_testee::{Dispatcher, WireOpcode};
//! use ws_echo_testing::{MockTransport, chunked, pattern};
//!
//! # async fn example() {
//! let transport = MockTransport::connected();
//! let mut dispatcher = Dispatcher::default();
//! dispatcher.begin_session();
//! for delivery in chunked(WireOpcode::BINARY, &pattern(100), 40) {
//!     dispatcher.dispatch(delivery, &transport).await;
//! }
//! assert_eq!(transport.echoed().len(), 1);
//! # }
//! ```

pub mod connector;
pub mod events;
pub mod logging;
pub mod transport;

pub use connector::{ScriptedConnection, ScriptedConnector};
pub use events::{chunked, pattern, session_events};
pub use logging::{LoggerHandle, logger};
pub use transport::{MockTransport, SendAttempt, SendScript};
