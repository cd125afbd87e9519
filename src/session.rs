//! Drives a [`Dispatcher`] over the event stream of one connection.

use futures::{Stream, StreamExt};
use log::{info, warn};
use tracing::Instrument;

use crate::{
    dispatcher::{DispatchOutcome, Dispatcher},
    event::ClientEvent,
    metrics,
    transport::Transport,
};

/// How a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer or client closed the connection.
    Disconnected,
    /// The transport reported an error.
    Error,
    /// The client task finished.
    Finished,
    /// The event stream ended without a terminal event.
    StreamClosed,
    /// The session did not end within the allotted time.
    TimedOut,
    /// Shutdown was requested while the session was running.
    Interrupted,
}

impl SessionEnd {
    /// Short lower-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Error => "error",
            Self::Finished => "finished",
            Self::StreamClosed => "stream_closed",
            Self::TimedOut => "timed_out",
            Self::Interrupted => "interrupted",
        }
    }
}

/// Counters collected while running a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionReport {
    /// How the session ended.
    pub end: SessionEnd,
    /// Messages the transport accepted as echoes.
    pub echoed: u64,
    /// Completed messages whose echo failed.
    pub send_failures: u64,
    /// Deliveries discarded without an echo.
    pub dropped: u64,
    /// Control frames observed.
    pub control_frames: u64,
}

impl SessionReport {
    /// An empty report with the given end reason.
    #[must_use]
    pub const fn new(end: SessionEnd) -> Self {
        Self {
            end,
            echoed: 0,
            send_failures: 0,
            dropped: 0,
            control_frames: 0,
        }
    }

    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Completed { send, .. } if send.is_sent() => self.echoed += 1,
            DispatchOutcome::Completed { .. } => self.send_failures += 1,
            DispatchOutcome::Control(_) => self.control_frames += 1,
            DispatchOutcome::Buffering { .. } => {}
            DispatchOutcome::NotConnected
            | DispatchOutcome::Unsupported(_)
            | DispatchOutcome::Malformed(_)
            | DispatchOutcome::Dropped(_) => self.dropped += 1,
        }
    }
}

/// Process `events` until the connection ends.
///
/// Each event is handled to completion before the next is polled, so an echo
/// in progress delays further deliveries. The session stops on
/// [`ClientEvent::Disconnected`], [`ClientEvent::Error`],
/// [`ClientEvent::Finished`] or the end of the stream; in every case the
/// reassembly buffer is reset, but its storage is kept for the next session.
pub async fn run_session<T, S>(
    dispatcher: &mut Dispatcher,
    transport: &T,
    events: &mut S,
) -> SessionReport
where
    T: Transport + ?Sized,
    S: Stream<Item = ClientEvent> + Unpin + ?Sized,
{
    let span = tracing::info_span!("testee.session");
    async move {
        let mut report = SessionReport::new(SessionEnd::StreamClosed);

        while let Some(event) = events.next().await {
            let end = match event {
                ClientEvent::Connected => {
                    info!("connected");
                    dispatcher.begin_session();
                    continue;
                }
                ClientEvent::Data(delivery) => {
                    let outcome = dispatcher.dispatch(delivery, transport).await;
                    report.record(&outcome);
                    continue;
                }
                ClientEvent::Disconnected => {
                    info!("disconnected");
                    SessionEnd::Disconnected
                }
                ClientEvent::Error => {
                    warn!("websocket error event");
                    SessionEnd::Error
                }
                ClientEvent::Finished => {
                    info!("websocket finish event");
                    SessionEnd::Finished
                }
            };
            report.end = end;
            break;
        }

        dispatcher.end_session();
        metrics::inc_sessions(report.end.as_str());
        tracing::info!(
            end = report.end.as_str(),
            echoed = report.echoed,
            send_failures = report.send_failures,
            dropped = report.dropped,
            "session finished"
        );
        report
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream;
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        event::DeliveryEvent,
        opcode::{SendOpcode, WireOpcode},
        transport::TransportError,
    };

    /// Always connected; accepts every send.
    struct Loopback;

    #[async_trait]
    impl Transport for Loopback {
        fn is_connected(&self) -> bool { true }

        async fn send(
            &self,
            _opcode: SendOpcode,
            payload: &[u8],
            _timeout: Duration,
        ) -> Result<usize, TransportError> {
            Ok(payload.len())
        }

        async fn disconnect(&self) -> Result<(), TransportError> { Ok(()) }
    }

    #[traced_test]
    #[tokio::test]
    async fn session_summary_is_traced() {
        let mut dispatcher = Dispatcher::default();
        let mut events = stream::iter(vec![
            ClientEvent::Connected,
            ClientEvent::Data(DeliveryEvent::frame(
                WireOpcode::BINARY,
                Bytes::from_static(b"abc"),
            )),
            ClientEvent::Finished,
        ]);

        let report = run_session(&mut dispatcher, &Loopback, &mut events).await;

        assert_eq!(report.end, SessionEnd::Finished);
        assert!(logs_contain("testee.session"));
        assert!(logs_contain("session finished"));
        assert!(logs_contain("echoed=1"));
    }

    #[test]
    fn report_counts_outcomes() {
        let mut report = SessionReport::new(SessionEnd::StreamClosed);
        report.record(&DispatchOutcome::Control(WireOpcode::PING));
        report.record(&DispatchOutcome::NotConnected);
        report.record(&DispatchOutcome::Buffering {
            received: 1,
            expected: 2,
        });

        assert_eq!(report.control_frames, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.echoed, 0);
    }
}
