//! Bounded retry around a single transport call

use crate::transport::{TransportError, TransportResponse};
use serde::Deserialize;
use slog::Logger;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_RETRIES: usize = 5;

/// Controls how often a failed request is retried; can be loaded from a config file.
/// Every failure is retried (connection errors and non-success statuses alike),
/// immediately unless a `delay` is configured.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt
    pub max_retries: usize,
    /// Pause between attempts
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
    /// Whether to surface the last error once the attempts are exhausted
    /// instead of treating the request as having returned nothing
    pub raise_on_failure: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: Duration::ZERO,
            raise_on_failure: false,
        }
    }
}

/// A single failed attempt
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("transport failed")]
    Transport(#[source] TransportError),
    #[error("request failed with non-success status code {status}")]
    Status { status: u16, body: String },
}

impl AttemptError {
    /// Body of the failed response, if the server answered at all
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => Some(body.as_str()),
            Self::Transport(_) => None,
        }
    }
}

/// Backoff that allows a fixed number of retries with a constant pause
#[derive(Debug, Clone)]
pub struct AttemptBudget {
    max_retries: usize,
    used: usize,
    delay: Duration,
}

impl backoff::backoff::Backoff for AttemptBudget {
    fn reset(&mut self) {
        self.used = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.used < self.max_retries {
            self.used += 1;
            Some(self.delay)
        } else {
            None
        }
    }
}

impl RetryPolicy {
    /// Total number of times a request is sent before giving up
    #[must_use]
    pub const fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    #[must_use]
    pub fn build(&self) -> AttemptBudget {
        AttemptBudget {
            max_retries: self.max_retries,
            used: 0,
            delay: self.delay,
        }
    }

    /// Runs `send` until it produces a success response or the attempts run out,
    /// in which case the last attempt's error is returned
    pub async fn run_to_exhaustion<F, Fut>(
        &self,
        logger: &Logger,
        mut send: F,
    ) -> Result<TransportResponse, AttemptError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<TransportResponse, TransportError>>,
    {
        let operation = || {
            let attempt = send();
            async move {
                let response = attempt
                    .await
                    .map_err(|err| backoff::Error::Transient(AttemptError::Transport(err)))?;
                if response.is_success() {
                    Ok(response)
                } else {
                    Err(backoff::Error::Transient(AttemptError::Status {
                        status: response.status,
                        body: response.body,
                    }))
                }
            }
        };

        let mut retries = 0_usize;
        let notify = |err: AttemptError, _: Duration| {
            retries += 1;
            slog::warn!(
                logger,
                "request to elasticsearch failed, retrying";
                "error" => %err,
                "retry" => retries,
            );
        };

        backoff::future::retry_notify(self.build(), operation, notify)
            .await
            .map_err(|err| {
                slog::error!(
                    logger,
                    "too many failed attempts, giving up";
                    "attempts" => self.max_attempts(),
                    "error" => %err,
                    "response_body" => err.body().unwrap_or("N/A"),
                );
                err
            })
    }
}
