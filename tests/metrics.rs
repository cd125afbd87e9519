#![cfg(feature = "metrics")]
//! Tests for `ws_echo_testee` metrics helpers.
//!
//! Counters are captured with `metrics_util::debugging::DebuggingRecorder`.
//! Async paths run on a current-thread runtime inside the local recorder
//! scope so every increment lands on the recorder under test.

use futures::stream;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use ws_echo_testee::{
    ClientEvent,
    DeliveryEvent,
    Dispatcher,
    EchoSender,
    SendOpcode,
    WireOpcode,
    metrics::{MESSAGES_DROPPED, MESSAGES_ECHOED, SEND_RETRIES, SESSIONS},
    run_session,
};
use ws_echo_testing::MockTransport;

/// Creates a debugging recorder and snapshotter for metrics testing.
fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("failed to build runtime")
        .block_on(future)
}

/// Counter values captured by a single snapshot.
///
/// Taking a snapshot resets the debugging recorder's counters, so each test
/// snapshots once and runs every lookup against the result.
struct Counters(Vec<(String, Vec<(String, String)>, u64)>);

impl Counters {
    fn capture(snapshotter: &Snapshotter) -> Self {
        let entries = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(k, _, _, v)| match v {
                DebugValue::Counter(c) => Some((
                    k.key().name().to_owned(),
                    k.key()
                        .labels()
                        .map(|l| (l.key().to_owned(), l.value().to_owned()))
                        .collect(),
                    c,
                )),
                _ => None,
            })
            .collect();
        Self(entries)
    }

    fn get(&self, name: &str, label: Option<(&str, &str)>) -> u64 {
        self.0
            .iter()
            .filter(|(key, _, _)| key == name)
            .filter(|(_, labels, _)| {
                label.is_none_or(|(key, value)| {
                    labels.iter().any(|(k, v)| k == key && v == value)
                })
            })
            .map(|(_, _, count)| count)
            .sum()
    }
}

#[test]
fn echoed_metric_is_labelled_by_opcode() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        ws_echo_testee::metrics::inc_echoed(SendOpcode::Binary);
    });

    assert_eq!(
        Counters::capture(&snapshotter).get(MESSAGES_ECHOED, Some(("opcode", "binary"))),
        1
    );
}

#[test]
fn dropped_deliveries_are_counted_by_reason() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let transport = MockTransport::connected();
    metrics::with_local_recorder(&recorder, || {
        block_on(async {
            let mut dispatcher = Dispatcher::default();
            dispatcher.begin_session();
            let oversized =
                DeliveryEvent::chunk(WireOpcode::BINARY, vec![0_u8; 8], 70_000, 0, false);
            dispatcher.dispatch(oversized, &transport).await;
            dispatcher
                .dispatch(
                    DeliveryEvent::frame(WireOpcode::new(0x3), &b"x"[..]),
                    &transport,
                )
                .await;
            dispatcher
                .dispatch(DeliveryEvent::frame(WireOpcode::PING, &b"p"[..]), &transport)
                .await;
        });
    });

    let counters = Counters::capture(&snapshotter);
    assert_eq!(
        counters.get(MESSAGES_DROPPED, Some(("reason", "size_exceeded"))),
        1
    );
    assert_eq!(
        counters.get(MESSAGES_DROPPED, Some(("reason", "unsupported_opcode"))),
        1
    );
    assert_eq!(
        counters.get(MESSAGES_DROPPED, None),
        2,
        "control frames are not drops"
    );
}

#[test]
fn retries_are_counted() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let transport = MockTransport::connected();
    transport.fail_next(3);
    metrics::with_local_recorder(&recorder, || {
        block_on(EchoSender::default().send_with_retry(SendOpcode::Text, b"again", &transport));
    });

    let counters = Counters::capture(&snapshotter);
    assert_eq!(counters.get(SEND_RETRIES, None), 3);
    assert_eq!(
        counters.get(MESSAGES_ECHOED, Some(("opcode", "text"))),
        1
    );
}

#[test]
fn session_end_is_counted() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let transport = MockTransport::connected();
    metrics::with_local_recorder(&recorder, || {
        block_on(async {
            let mut dispatcher = Dispatcher::default();
            let mut events = stream::iter(vec![ClientEvent::Connected, ClientEvent::Error]);
            run_session(&mut dispatcher, &transport, &mut events).await;
        });
    });

    assert_eq!(Counters::capture(&snapshotter).get(SESSIONS, Some(("end", "error"))), 1);
}
