//! Diagnostics for each request sent to Elasticsearch:
//! the equivalent curl command, then the status, time taken and (at debug verbosity) the body

use crate::retry::AttemptError;
use serde::Deserialize;
use slog::Logger;
use sloggers::types::Severity;
use std::sync::Arc;

const NOT_AVAILABLE: &str = "N/A";

/// Receives request/response diagnostics.
/// Values that could not be determined arrive as `"N/A"`.
pub trait RequestLogger: Send + Sync {
    /// Response bodies are only passed along at `debug` (or `trace`) verbosity
    fn verbosity(&self) -> Severity;
    fn log_request(&self, operation: &str, indices: &[String], command: &str);
    fn log_response(&self, status: &str, took: &str, body: &str);
}

/// Options for the request log (not to be confused with the service diagnostic logs)
#[derive(Debug, Deserialize, Clone)]
pub struct RequestLogConfig {
    pub level: Severity,
}

/// Writes request diagnostics as structured records on a `slog` logger
pub struct SlogRequestLogger {
    logger: Logger,
    verbosity: Severity,
}

impl SlogRequestLogger {
    #[must_use]
    pub fn new(logger: Logger, verbosity: Severity) -> Self {
        Self { logger, verbosity }
    }
}

impl RequestLogger for SlogRequestLogger {
    fn verbosity(&self) -> Severity {
        self.verbosity
    }

    fn log_request(&self, operation: &str, indices: &[String], command: &str) {
        slog::info!(
            self.logger,
            "sending request to elasticsearch";
            "operation" => operation,
            "indices" => indices.join(","),
            "command" => command,
        );
    }

    fn log_response(&self, status: &str, took: &str, body: &str) {
        slog::info!(
            self.logger,
            "received response from elasticsearch";
            "status" => status,
            "took_ms" => took,
            "body" => body,
        );
    }
}

/// Logs one request/response pair when dropped,
/// so the request logger runs exactly once on every exit path
/// (including when the enclosing future is dropped mid-request)
pub(crate) struct RequestLogScope {
    logger: Option<Arc<dyn RequestLogger>>,
    operation: &'static str,
    indices: Vec<String>,
    command: String,
    status: Option<u16>,
    took: Option<u64>,
    raw_body: Option<String>,
    decoded_body: Option<serde_json::Value>,
}

impl RequestLogScope {
    pub(crate) fn new(
        logger: Option<Arc<dyn RequestLogger>>,
        operation: &'static str,
        indices: Vec<String>,
        command: String,
    ) -> Self {
        Self {
            logger,
            operation,
            indices,
            command,
            status: None,
            took: None,
            raw_body: None,
            decoded_body: None,
        }
    }

    /// Whether any body recorded will actually be logged
    fn wants_body(&self) -> bool {
        self.logger
            .as_ref()
            .map_or(false, |logger| is_verbose(logger.verbosity()))
    }

    pub(crate) fn record_response(&mut self, status: u16, body: &str) {
        self.status = Some(status);
        if self.wants_body() {
            self.raw_body = Some(String::from(body));
        }
    }

    /// Keeps the status and body of a final non-success reply, if there was one
    pub(crate) fn record_failure(&mut self, err: &AttemptError) {
        if let AttemptError::Status { status, body } = err {
            self.record_response(*status, body);
        }
    }

    pub(crate) fn record_decoded(&mut self, decoded: &serde_json::Value) {
        self.took = decoded.get("took").and_then(serde_json::Value::as_u64);
        if self.wants_body() {
            self.decoded_body = Some(decoded.clone());
        }
    }

    fn rendered_body(&self, verbose: bool) -> String {
        if !verbose {
            return String::new();
        }

        match (&self.decoded_body, &self.raw_body) {
            (Some(decoded), _) => serde_json::to_string_pretty(decoded)
                .unwrap_or_else(|_| decoded.to_string()),
            (None, Some(raw)) => raw.clone(),
            (None, None) => String::from(NOT_AVAILABLE),
        }
    }
}

impl Drop for RequestLogScope {
    fn drop(&mut self) {
        if let Some(logger) = &self.logger {
            logger.log_request(self.operation, &self.indices, &self.command);

            let status = self
                .status
                .map_or_else(|| String::from(NOT_AVAILABLE), |status| status.to_string());
            let took = self
                .took
                .map_or_else(|| String::from(NOT_AVAILABLE), |took| took.to_string());
            let body = self.rendered_body(is_verbose(logger.verbosity()));
            logger.log_response(&status, &took, &body);
        }
    }
}

/// `trace` shows everything `debug` does
const fn is_verbose(severity: Severity) -> bool {
    matches!(severity, Severity::Debug | Severity::Trace)
}
