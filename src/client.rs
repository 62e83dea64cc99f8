//! Client that executes searches against the configured Elasticsearch

use crate::config::Configuration;
use crate::multi_search::MultiSearch;
use crate::request_log::{RequestLogScope, RequestLogger, SlogRequestLogger};
use crate::results::ResultCollection;
use crate::retry::{AttemptError, RetryPolicy};
use crate::search::SearchRequest;
use crate::transport::{ElasticsearchTransport, Transport, TransportError, TransportResponse};
use anyhow::Context as _;
use slog::Logger;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use url::Url;

/// Cheap to clone; every clone shares the same transport and loggers
#[derive(Clone)]
pub struct Client {
    base_url: Url,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    logger: Logger,
    request_logger: Option<Arc<dyn RequestLogger>>,
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("base URL {0} cannot have path segments appended to it")]
    UnusableBaseUrl(Url),
}

/// Instantiates a new client from the loaded configuration.
/// Note: returning Ok(client) from this function
/// does not guarantee that the server is reachable.
pub fn new_client(config: &Configuration, logger: Logger) -> anyhow::Result<Client> {
    let base_url = Url::parse(&config.url).context("could not parse Elasticsearch URL")?;
    let transport = ElasticsearchTransport::single_node(&base_url)
        .context("could not build Elasticsearch transport")?;

    let mut client = Client::new(base_url, Arc::new(transport), logger.clone())?
        .with_retry(config.retry.clone());
    if let Some(request_log) = &config.request_log {
        client = client.with_request_logger(Arc::new(SlogRequestLogger::new(
            logger,
            request_log.level,
        )));
    }

    Ok(client)
}

impl Client {
    pub fn new(
        base_url: Url,
        transport: Arc<dyn Transport>,
        logger: Logger,
    ) -> Result<Self, ClientError> {
        if base_url.cannot_be_a_base() {
            return Err(ClientError::UnusableBaseUrl(base_url));
        }

        Ok(Self {
            base_url,
            transport,
            retry: RetryPolicy::default(),
            logger,
            request_logger: None,
        })
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_request_logger(mut self, request_logger: Arc<dyn RequestLogger>) -> Self {
        self.request_logger = Some(request_logger);
        self
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub(crate) const fn logger(&self) -> &Logger {
        &self.logger
    }

    pub(crate) fn log_scope(
        &self,
        operation: &'static str,
        indices: Vec<String>,
        command: String,
    ) -> RequestLogScope {
        RequestLogScope::new(self.request_logger.clone(), operation, indices, command)
    }

    /// Sends one body through the retry policy.
    /// Once the attempts run out this returns `Ok(None)`,
    /// unless the policy asks for the last error to be raised.
    pub(crate) async fn send(
        &self,
        url: &Url,
        body: &str,
        log_scope: &mut RequestLogScope,
    ) -> Result<Option<TransportResponse>, AttemptError> {
        match self.send_or_fail(url, body, log_scope).await {
            Ok(response) => Ok(Some(response)),
            Err(err) if self.retry.raise_on_failure => Err(err),
            Err(_) => Ok(None),
        }
    }

    /// Sends one body through the retry policy, failing once the attempts run out.
    /// The last failed reply (if any) is kept for the request log.
    pub(crate) async fn send_or_fail(
        &self,
        url: &Url,
        body: &str,
        log_scope: &mut RequestLogScope,
    ) -> Result<TransportResponse, AttemptError> {
        let result = self
            .retry
            .run_to_exhaustion(&self.logger, || self.transport.post(url, String::from(body)))
            .await;
        if let Err(err) = &result {
            log_scope.record_failure(err);
        }
        result
    }

    /// Prepares a lazily-executed search
    pub fn search(&self, request: impl Into<Arc<SearchRequest>>) -> Search {
        Search {
            client: self.clone(),
            request: request.into(),
            executed: OnceCell::new(),
        }
    }

    /// Starts an empty multi-search batch
    #[must_use]
    pub fn multi_search(&self) -> MultiSearch {
        MultiSearch::new(self.clone())
    }
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("failed to serialize search body")]
    Serialization(#[source] serde_json::Error),
    #[error("search request failed with non-success status code {status}; request: {command}")]
    RequestFailed {
        status: u16,
        body: String,
        command: String,
    },
    #[error("search request could not be sent; request: {command}")]
    Transport {
        command: String,
        #[source]
        source: TransportError,
    },
    #[error("failed to decode response body as JSON from elasticsearch")]
    JsonDecodeError(#[source] serde_json::Error),
}

impl SearchError {
    fn from_attempt(err: AttemptError, command: String) -> Self {
        match err {
            AttemptError::Status { status, body } => Self::RequestFailed {
                status,
                body,
                command,
            },
            AttemptError::Transport(source) => Self::Transport { command, source },
        }
    }
}

/// Outcome of one execution of a [`Search`]
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Absent when every attempt failed and the retry policy does not raise
    pub response: Option<TransportResponse>,
    pub results: ResultCollection,
}

/// A single search bound to a client.
/// The request is sent on first access to the results, at most once,
/// until [`Search::invalidate`] or [`Search::perform`] is called.
pub struct Search {
    client: Client,
    request: Arc<SearchRequest>,
    executed: OnceCell<SearchOutcome>,
}

impl Search {
    #[must_use]
    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    pub fn to_curl(&self) -> Result<String, serde_json::Error> {
        self.request.to_curl(self.client.base_url())
    }

    /// Sends the search without touching the memoized results
    pub async fn execute(&self) -> Result<SearchOutcome, SearchError> {
        let url = self.request.request_url(self.client.base_url());
        let body = self.request.to_json().map_err(SearchError::Serialization)?;
        let command = self.to_curl().map_err(SearchError::Serialization)?;

        let mut log_scope =
            self.client
                .log_scope("_search", self.request.indices().to_vec(), command.clone());

        let response = self
            .client
            .send(&url, &body, &mut log_scope)
            .await
            .map_err(|err| SearchError::from_attempt(err, command))?;

        let results = match &response {
            Some(response) => {
                log_scope.record_response(response.status, &response.body);
                let decoded = serde_json::from_str::<serde_json::Value>(&response.body)
                    .map_err(SearchError::JsonDecodeError)?;
                log_scope.record_decoded(&decoded);
                ResultCollection::from_response(decoded)
            }
            None => ResultCollection::empty(),
        };

        Ok(SearchOutcome { response, results })
    }

    /// Results of the search, sending it first if it has not been sent yet.
    /// Concurrent callers share a single in-flight request.
    pub async fn results(&self) -> Result<&ResultCollection, SearchError> {
        let outcome = self.executed.get_or_try_init(|| self.execute()).await?;
        Ok(&outcome.results)
    }

    /// Raw response of the last execution, if any
    #[must_use]
    pub fn response(&self) -> Option<&TransportResponse> {
        self.executed
            .get()
            .and_then(|outcome| outcome.response.as_ref())
    }

    /// Forgets the memoized results so that the next access sends the search again
    pub fn invalidate(&mut self) {
        self.executed = OnceCell::new();
    }

    /// Sends the search again, replacing any earlier results
    pub async fn perform(&mut self) -> Result<&ResultCollection, SearchError> {
        self.invalidate();
        self.results().await
    }
}
