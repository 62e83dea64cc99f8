//! In-memory collaborators shared by the unit tests

use crate::request_log::RequestLogger;
use crate::transport::{Transport, TransportError, TransportResponse};
use async_trait::async_trait;
use sloggers::types::Severity;
use std::collections::VecDeque;
use std::sync::Mutex;
use url::Url;

pub fn discard_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

enum Scripted {
    Respond(TransportResponse),
    Fail,
}

impl Scripted {
    fn produce(&self, url: &Url) -> Result<TransportResponse, TransportError> {
        match self {
            Self::Respond(response) => Ok(response.clone()),
            Self::Fail => Err(TransportError::Connection {
                url: url.to_string(),
                reason: String::from("connection refused"),
            }),
        }
    }
}

/// Replays queued outcomes in order; once the queue is drained
/// every further call gets the fallback outcome
pub struct ScriptedTransport {
    queue: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::with_fallback(Scripted::Fail)
    }

    fn with_fallback(fallback: Scripted) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn responding(status: u16, body: &str) -> Self {
        Self::with_fallback(Scripted::Respond(TransportResponse::new(status, body)))
    }

    pub fn failing_with_status(status: u16, body: &str) -> Self {
        Self::responding(status, body)
    }

    pub fn failing_with_connection_error() -> Self {
        Self::with_fallback(Scripted::Fail)
    }

    pub fn push_status(&self, status: u16, body: &str) {
        self.queue
            .lock()
            .unwrap()
            .push_back(Scripted::Respond(TransportResponse::new(status, body)));
    }

    pub fn push_connection_error(&self) {
        self.queue.lock().unwrap().push_back(Scripted::Fail);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// (url, body) of every call so far
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, url: &Url, body: String) -> Result<TransportResponse, TransportError> {
        self.calls.lock().unwrap().push((url.to_string(), body));
        let next = self.queue.lock().unwrap().pop_front();
        match next {
            Some(scripted) => scripted.produce(url),
            None => self.fallback.produce(url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggedEvent {
    Request {
        operation: String,
        indices: Vec<String>,
        command: String,
    },
    Response {
        status: String,
        took: String,
        body: String,
    },
}

pub struct RecordingLogger {
    verbosity: Severity,
    events: Mutex<Vec<LoggedEvent>>,
}

impl RecordingLogger {
    pub fn new(verbosity: Severity) -> Self {
        Self {
            verbosity,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<LoggedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// (status, took, body) of every logged response
    pub fn responses(&self) -> Vec<(String, String, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LoggedEvent::Response { status, took, body } => Some((status, took, body)),
                LoggedEvent::Request { .. } => None,
            })
            .collect()
    }
}

impl RequestLogger for RecordingLogger {
    fn verbosity(&self) -> Severity {
        self.verbosity
    }

    fn log_request(&self, operation: &str, indices: &[String], command: &str) {
        self.events.lock().unwrap().push(LoggedEvent::Request {
            operation: String::from(operation),
            indices: indices.to_vec(),
            command: String::from(command),
        });
    }

    fn log_response(&self, status: &str, took: &str, body: &str) {
        self.events.lock().unwrap().push(LoggedEvent::Response {
            status: String::from(status),
            took: String::from(took),
            body: String::from(body),
        });
    }
}
