//! Sequencing of conformance test cases against a fuzzing server.
//!
//! Each case is one connection to `{server}/runCase?case={n}&agent={agent}`.
//! The server drives the case and closes the connection; the testee only
//! echoes what it receives. After the last case the runner asks the server to
//! regenerate its reports. A single [`Dispatcher`], and therefore a single
//! reassembly buffer, serves every case.

use std::{fmt, time::Duration};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::{
    dispatcher::Dispatcher,
    session::{SessionEnd, SessionReport, run_session},
    transport::{Connector, Transport, TransportError},
};

/// Longest URI the runner will request, in bytes (exclusive).
pub const MAX_URI_LEN: usize = 512;

/// Agent name reported to the server by default.
pub const DEFAULT_AGENT: &str = "ws_echo_testee";

/// Errors raised while sequencing cases.
#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    /// The generated URI exceeds [`MAX_URI_LEN`].
    #[error("uri of {len} bytes exceeds limit of {limit} bytes")]
    UriTooLong {
        /// Length of the generated URI.
        len: usize,
        /// Exclusive limit.
        limit: usize,
    },
    /// The requested case range is empty or starts at zero.
    #[error("invalid case range {start}..={end}")]
    InvalidCaseRange {
        /// First requested case.
        start: u32,
        /// Last requested case.
        end: u32,
    },
    /// The connector could not open the connection.
    #[error("failed to connect: {0}")]
    Connect(#[from] TransportError),
}

/// Groups of cases defined by the fuzzing server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Basic framing.
    Framing,
    /// Ping and pong handling.
    PingPong,
    /// Reserved header bits.
    ReservedBits,
    /// Reserved and invalid opcodes.
    Opcodes,
    /// Fragmented messages.
    Fragmentation,
    /// UTF-8 validation.
    Utf8,
    /// Close handshake.
    CloseHandshake,
    /// Every case the runner knows about.
    All,
}

impl Category {
    /// Inclusive case bounds for each category.
    const BOUNDS: [(Category, u32, u32); 8] = [
        (Category::Framing, 1, 16),
        (Category::PingPong, 17, 27),
        (Category::ReservedBits, 28, 34),
        (Category::Opcodes, 35, 44),
        (Category::Fragmentation, 45, 64),
        (Category::Utf8, 65, 209),
        (Category::CloseHandshake, 210, 246),
        (Category::All, 1, 300),
    ];

    /// Case range covered by the category.
    #[must_use]
    pub fn cases(self) -> CaseRange {
        let (start, end) = Self::BOUNDS
            .iter()
            .find(|(category, _, _)| *category == self)
            .map_or((1, 300), |(_, start, end)| (*start, *end));
        CaseRange { start, end }
    }
}

/// Inclusive, non-empty range of case numbers starting at one or later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCaseRange")]
pub struct CaseRange {
    start: u32,
    end: u32,
}

#[derive(Deserialize)]
struct RawCaseRange {
    start: u32,
    end: u32,
}

impl TryFrom<RawCaseRange> for CaseRange {
    type Error = SuiteError;

    fn try_from(raw: RawCaseRange) -> Result<Self, Self::Error> { Self::new(raw.start, raw.end) }
}

impl CaseRange {
    /// Build a range from inclusive bounds.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::InvalidCaseRange`] when `start` is zero or
    /// greater than `end`.
    pub fn new(start: u32, end: u32) -> Result<Self, SuiteError> {
        if start == 0 || start > end {
            return Err(SuiteError::InvalidCaseRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// First case.
    #[must_use]
    pub const fn start(&self) -> u32 { self.start }

    /// Last case.
    #[must_use]
    pub const fn end(&self) -> u32 { self.end }

    /// Number of cases in the range.
    #[must_use]
    pub const fn len(&self) -> u32 { self.end - self.start + 1 }

    /// Ranges are never empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool { false }

    /// Iterate over the case numbers.
    pub fn iter(&self) -> impl Iterator<Item = u32> { self.start..=self.end }
}

impl Default for CaseRange {
    fn default() -> Self { Category::Framing.cases() }
}

impl fmt::Display for CaseRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Settings for a [`SuiteRunner`].
///
/// # Default Values
/// - `agent`: [`DEFAULT_AGENT`]
/// - `cases`: the framing category, cases 1 to 16
/// - `case_timeout`: 60 seconds
/// - `case_pause`: 500 milliseconds
/// - `report_wait`: 3 seconds
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Base URI of the fuzzing server, e.g. `ws://192.168.1.10:9001`.
    pub server_uri: String,
    /// Agent name used to label reports.
    #[serde(default = "default_agent")]
    pub agent: String,
    /// Cases to run.
    #[serde(default)]
    pub cases: CaseRange,
    /// Maximum time to wait for the server to finish a case.
    #[serde(default = "default_case_timeout")]
    pub case_timeout: Duration,
    /// Pause between consecutive cases.
    #[serde(default = "default_case_pause")]
    pub case_pause: Duration,
    /// How long to hold the report-update connection open.
    #[serde(default = "default_report_wait")]
    pub report_wait: Duration,
}

fn default_agent() -> String { DEFAULT_AGENT.to_owned() }

const fn default_case_timeout() -> Duration { Duration::from_secs(60) }

const fn default_case_pause() -> Duration { Duration::from_millis(500) }

const fn default_report_wait() -> Duration { Duration::from_secs(3) }

impl SuiteConfig {
    /// Configuration for `server_uri` with default settings.
    #[must_use]
    pub fn new(server_uri: impl Into<String>) -> Self {
        Self {
            server_uri: server_uri.into(),
            agent: default_agent(),
            cases: CaseRange::default(),
            case_timeout: default_case_timeout(),
            case_pause: default_case_pause(),
            report_wait: default_report_wait(),
        }
    }

    /// Set the agent name.
    #[must_use]
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    /// Set the cases to run.
    #[must_use]
    pub fn with_cases(mut self, cases: CaseRange) -> Self {
        self.cases = cases;
        self
    }

    /// Set the per-case completion timeout.
    #[must_use]
    pub fn with_case_timeout(mut self, case_timeout: Duration) -> Self {
        self.case_timeout = case_timeout;
        self
    }

    /// Set the pause between cases.
    #[must_use]
    pub fn with_case_pause(mut self, case_pause: Duration) -> Self {
        self.case_pause = case_pause;
        self
    }

    /// Set how long the report-update connection stays open.
    #[must_use]
    pub fn with_report_wait(mut self, report_wait: Duration) -> Self {
        self.report_wait = report_wait;
        self
    }

    /// URI that runs `case`.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::UriTooLong`] when the URI reaches [`MAX_URI_LEN`].
    ///
    /// # Examples
    ///
    /// ```
    /// use ws_echo_testee::suite::SuiteConfig;
    ///
    /// let config = SuiteConfig::new("ws://127.0.0.1:9001").with_agent("probe");
    /// assert_eq!(
    ///     config.case_uri(7).expect("short uri"),
    ///     "ws://127.0.0.1:9001/runCase?case=7&agent=probe"
    /// );
    /// ```
    pub fn case_uri(&self, case: u32) -> Result<String, SuiteError> {
        bounded_uri(format!(
            "{}/runCase?case={case}&agent={}",
            self.server_uri, self.agent
        ))
    }

    /// URI that asks the server to regenerate its reports.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::UriTooLong`] when the URI reaches [`MAX_URI_LEN`].
    pub fn report_uri(&self) -> Result<String, SuiteError> {
        bounded_uri(format!(
            "{}/updateReports?agent={}",
            self.server_uri, self.agent
        ))
    }
}

fn bounded_uri(uri: String) -> Result<String, SuiteError> {
    if uri.len() >= MAX_URI_LEN {
        return Err(SuiteError::UriTooLong {
            len: uri.len(),
            limit: MAX_URI_LEN,
        });
    }
    Ok(uri)
}

/// Result of one case.
#[derive(Debug)]
pub struct CaseOutcome {
    /// Case number.
    pub case: u32,
    /// Session report, or the reason the case could not run.
    pub result: Result<SessionReport, SuiteError>,
}

/// Summary of a suite run.
#[derive(Debug, Default)]
pub struct SuiteReport {
    /// Per-case results in execution order.
    pub cases: Vec<CaseOutcome>,
    /// Whether the report-update request was delivered.
    pub reports_updated: bool,
    /// Whether shutdown was requested before every case had run.
    pub interrupted: bool,
}

impl SuiteReport {
    /// Number of cases that could not be run.
    #[must_use]
    pub fn failed_cases(&self) -> usize {
        self.cases
            .iter()
            .filter(|outcome| outcome.result.is_err())
            .count()
    }
}

/// Runs a range of cases sequentially through a [`Connector`].
pub struct SuiteRunner<C> {
    connector: C,
    config: SuiteConfig,
    dispatcher: Dispatcher,
}

impl<C: Connector> SuiteRunner<C> {
    /// Create a runner.
    ///
    /// Tries to allocate the reassembly buffer immediately; if that fails the
    /// buffer is allocated on the first fragmented message instead.
    pub fn new(connector: C, config: SuiteConfig, mut dispatcher: Dispatcher) -> Self {
        match dispatcher.preallocate() {
            Ok(()) => info!(
                "reassembly buffer ready: capacity={}",
                dispatcher.buffer().capacity()
            ),
            Err(err) => warn!("reassembly buffer not preallocated, will allocate on demand: {err}"),
        }
        Self {
            connector,
            config,
            dispatcher,
        }
    }

    /// Dispatcher shared by every case.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher { &self.dispatcher }

    /// Run every configured case, then request a report update.
    ///
    /// Case failures are logged and recorded; they never stop the suite. The
    /// reassembly buffer is released once all cases have run.
    pub async fn run(&mut self) -> SuiteReport { self.run_until(CancellationToken::new()).await }

    /// Like [`run`](Self::run), but stops early once `shutdown` is cancelled.
    ///
    /// A case in progress is recorded with [`SessionEnd::Interrupted`] and its
    /// connection is closed; no report update is requested.
    pub async fn run_until(&mut self, shutdown: CancellationToken) -> SuiteReport {
        info!("server: {}", self.config.server_uri);
        let mut report = SuiteReport::default();
        let cases = self.config.cases;

        for case in cases.iter() {
            if shutdown.is_cancelled() {
                report.interrupted = true;
                break;
            }
            info!("case {case}/{}", cases.end());
            let result = self.run_case_until(case, &shutdown).await;
            match &result {
                Ok(session) => info!("case {case} completed: end={}", session.end.as_str()),
                Err(err) => warn!("case {case} failed: {err}"),
            }
            let interrupted =
                matches!(&result, Ok(session) if session.end == SessionEnd::Interrupted);
            report.cases.push(CaseOutcome { case, result });
            if interrupted {
                report.interrupted = true;
                break;
            }
            tokio::select! {
                () = shutdown.cancelled() => {}
                () = sleep(self.config.case_pause) => {}
            }
        }

        if report.interrupted {
            warn!("shutdown requested, remaining cases skipped");
        } else {
            report.reports_updated = match self.update_reports().await {
                Ok(()) => {
                    info!("reports updated");
                    true
                }
                Err(err) => {
                    warn!("failed to update reports: {err}");
                    false
                }
            };
        }

        self.dispatcher.release();
        info!(
            "suite finished: cases={} failed={} interrupted={}",
            report.cases.len(),
            report.failed_cases(),
            report.interrupted
        );
        report
    }

    /// Run a single case.
    ///
    /// # Errors
    ///
    /// Returns a [`SuiteError`] when the URI is invalid or the connection
    /// cannot be opened.
    pub async fn run_case(&mut self, case: u32) -> Result<SessionReport, SuiteError> {
        self.run_case_until(case, &CancellationToken::new()).await
    }

    async fn run_case_until(
        &mut self,
        case: u32,
        shutdown: &CancellationToken,
    ) -> Result<SessionReport, SuiteError> {
        let uri = self.config.case_uri(case)?;
        info!("running case {case}: {uri}");
        let connected = tokio::select! {
            biased;
            () = shutdown.cancelled() => None,
            connected = self.connector.connect(&uri) => Some(connected),
        };
        let Some(connected) = connected else {
            return Ok(SessionReport::new(SessionEnd::Interrupted));
        };
        let (transport, mut events) = connected?;

        let case_timeout = self.config.case_timeout;
        let session = tokio::select! {
            biased;
            () = shutdown.cancelled() => None,
            session = timeout(
                case_timeout,
                run_session(&mut self.dispatcher, &transport, &mut events),
            ) => Some(session),
        };
        let report = match session {
            Some(Ok(report)) => report,
            Some(Err(_)) => {
                warn!("case {case} did not finish within {case_timeout:?}");
                self.dispatcher.end_session();
                SessionReport::new(SessionEnd::TimedOut)
            }
            None => {
                warn!("case {case} interrupted by shutdown");
                self.dispatcher.end_session();
                SessionReport::new(SessionEnd::Interrupted)
            }
        };

        close(&transport).await;
        Ok(report)
    }

    async fn update_reports(&mut self) -> Result<(), SuiteError> {
        let uri = self.config.report_uri()?;
        let (transport, _events) = self.connector.connect(&uri).await?;
        sleep(self.config.report_wait).await;
        close(&transport).await;
        Ok(())
    }
}

async fn close<T: Transport>(transport: &T) {
    if !transport.is_connected() {
        return;
    }
    if let Err(err) = transport.disconnect().await {
        warn!("failed to close connection: {err}");
    }
}
