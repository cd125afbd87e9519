//! Echo transmission with bounded retry.
//!
//! [`EchoSender`] hands a completed message to the [`Transport`], retrying
//! failed attempts after the delays of a fixed [`BackoffSchedule`]. Retrying
//! stops as soon as the connection drops or the configured attempt cap is
//! reached; neither case is an error for the caller.

pub mod config;

use log::{debug, info, warn};
use tokio::time::{Instant, sleep};

pub use self::config::{BACKOFF_STEPS, BackoffSchedule, EchoConfig, SendTimeouts};
use crate::{metrics, opcode::SendOpcode, transport::Transport};

/// Why an echo was abandoned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SendFailure {
    /// The connection went away before an attempt succeeded.
    #[error("connection lost")]
    ConnectionLost,
    /// Every permitted attempt failed.
    #[error("send attempts exhausted")]
    AttemptsExhausted,
}

/// Result of [`EchoSender::send_with_retry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The transport accepted the message.
    Sent {
        /// Bytes reported as sent by the transport.
        bytes: usize,
        /// Attempts used, including the successful one.
        attempts: u32,
    },
    /// The message was not echoed.
    Failed {
        /// Attempts made before giving up.
        attempts: u32,
        /// Reason for giving up.
        reason: SendFailure,
    },
}

impl SendOutcome {
    /// Whether the message reached the transport.
    #[must_use]
    pub const fn is_sent(&self) -> bool { matches!(self, Self::Sent { .. }) }

    /// Number of send attempts made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Sent { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Sends echo replies with size-scaled timeouts and fixed backoff.
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoSender {
    config: EchoConfig,
}

impl EchoSender {
    /// Create a sender using a normalised copy of `config`.
    #[must_use]
    pub fn new(config: EchoConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &EchoConfig { &self.config }

    /// Send `payload` until the transport accepts it, the connection drops,
    /// or the attempt cap is reached.
    ///
    /// Liveness is checked before every attempt, so a connection that is
    /// already closed yields [`SendFailure::ConnectionLost`] with zero
    /// attempts.
    pub async fn send_with_retry<T>(
        &self,
        opcode: SendOpcode,
        payload: &[u8],
        transport: &T,
    ) -> SendOutcome
    where
        T: Transport + ?Sized,
    {
        let started = Instant::now();
        let len = payload.len();
        let timeout = self.config.timeouts.timeout_for(len);
        let mut attempts: u32 = 0;
        let mut retry: usize = 0;

        loop {
            if !transport.is_connected() {
                warn!("connection lost before echo: opcode={opcode} len={len} attempts={attempts}");
                return SendOutcome::Failed {
                    attempts,
                    reason: SendFailure::ConnectionLost,
                };
            }

            debug!("sending echo: opcode={opcode} len={len} timeout={timeout:?}");
            attempts = attempts.saturating_add(1);
            match transport.send(opcode, payload, timeout).await {
                Ok(bytes) => {
                    info!(
                        "echo sent: opcode={opcode} bytes={bytes} attempts={attempts} elapsed={:?}",
                        started.elapsed()
                    );
                    metrics::inc_echoed(opcode);
                    return SendOutcome::Sent { bytes, attempts };
                }
                Err(err) => {
                    warn!("echo send retry: opcode={opcode} len={len} attempt={attempts} error={err}");
                }
            }

            if let Some(limit) = self.config.max_attempts
                && attempts >= limit.get()
            {
                warn!("echo abandoned: opcode={opcode} len={len} attempts={attempts}");
                return SendOutcome::Failed {
                    attempts,
                    reason: SendFailure::AttemptsExhausted,
                };
            }

            metrics::inc_send_retries();
            sleep(self.config.backoff.delay_for(retry)).await;
            retry = retry.saturating_add(1);
        }
    }
}
