//! Public API for the `ws_echo_testee` library.
//!
//! This crate implements the echo side of a WebSocket conformance testee:
//! it reassembles messages that the transport delivers in several pieces
//! and echoes every complete message back with a bounded retry loop. The
//! WebSocket client itself is supplied through the
//! [`Transport`](transport::Transport) and [`Connector`](transport::Connector)
//! traits.

pub mod config;
pub mod dispatcher;
pub mod echo;
pub mod event;
pub mod metrics;
pub mod opcode;
pub mod reassembly;
pub mod session;
pub mod suite;
pub mod transport;

pub use config::TesteeConfig;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use echo::{BackoffSchedule, EchoConfig, EchoSender, SendFailure, SendOutcome, SendTimeouts};
pub use event::{ClientEvent, DeliveryEvent, PayloadDefect};
pub use opcode::{CONTROL_OPCODE_THRESHOLD, FrameClass, SendOpcode, WireOpcode};
pub use reassembly::{
    AppendStatus,
    CompletedMessage,
    DEFAULT_CAPACITY,
    ReassemblyBuffer,
    ReassemblyError,
};
pub use session::{SessionEnd, SessionReport, run_session};
pub use suite::{CaseOutcome, CaseRange, Category, SuiteConfig, SuiteError, SuiteReport, SuiteRunner};
pub use transport::{Connector, Transport, TransportError};
