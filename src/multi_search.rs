//! Batches several searches into one call to the multi-search API:
//! `https://www.elastic.co/guide/en/elasticsearch/reference/7.10/search-multi-search.html`
//!
//! The response carries no request identifiers,
//! so results are matched back to requests purely by position.

use crate::client::Client;
use crate::results::ResultCollection;
use crate::retry::AttemptError;
use crate::search::SearchRequest;
use crate::transport::TransportResponse;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use url::Url;

#[derive(Error, Debug)]
pub enum MultiSearchError {
    #[error("failed to serialize multi-search body")]
    Serialization(#[source] serde_json::Error),
    #[error("multi-search request failed; request: {command}")]
    RequestFailed {
        command: String,
        /// Body of the last failed response, if the server answered at all
        body: Option<String>,
        #[source]
        source: AttemptError,
    },
    #[error("failed to decode response body as JSON from elasticsearch")]
    JsonDecodeError(#[source] serde_json::Error),
    #[error("multi-search response did not contain a `responses` array")]
    MissingResponses,
    #[error("multi-search response had {actual} entries for {expected} requests")]
    ResponseCountMismatch { expected: usize, actual: usize },
}

/// Everything produced by one execution of a [`MultiSearch`]
#[derive(Debug, Clone)]
pub struct MultiSearchOutcome {
    /// Absent only for an empty batch, which is never sent
    pub response: Option<TransportResponse>,
    pub envelope: Option<serde_json::Value>,
    /// One entry per request, in request order
    pub results: Vec<ResultCollection>,
}

/// Ordered batch of searches.
/// Results are computed on first access and kept until the batch changes
/// or is explicitly invalidated.
pub struct MultiSearch {
    client: Client,
    requests: Vec<Arc<SearchRequest>>,
    executed: OnceCell<MultiSearchOutcome>,
}

impl MultiSearch {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            requests: Vec::new(),
            executed: OnceCell::new(),
        }
    }

    /// Appends the request unless this exact instance is already in the batch.
    /// Returns whether it was added.
    pub fn add(&mut self, request: Arc<SearchRequest>) -> bool {
        if self
            .requests
            .iter()
            .any(|existing| Arc::ptr_eq(existing, &request))
        {
            return false;
        }

        self.requests.push(request);
        self.invalidate();
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    #[must_use]
    pub fn requests(&self) -> &[Arc<SearchRequest>] {
        &self.requests
    }

    /// Every index searched by the batch, in request order
    #[must_use]
    pub fn indices(&self) -> Vec<String> {
        let mut indices = Vec::<String>::new();
        for index in self.requests.iter().flat_map(|request| request.indices()) {
            if !indices.contains(index) {
                indices.push(index.clone());
            }
        }
        indices
    }

    #[must_use]
    pub fn url(&self) -> Url {
        let mut url = self.client.base_url().clone();
        url.set_query(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("_msearch");
        }
        url
    }

    /// Newline-delimited header/body pairs followed by a trailing newline.
    /// Each header names the first index of its request.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        let mut lines = Vec::with_capacity(self.requests.len() * 2 + 1);
        for request in &self.requests {
            let header = match request.indices().first() {
                Some(index) => format!(r#"{{"index": {}}}"#, serde_json::to_string(index)?),
                None => String::from("{}"),
            };
            lines.push(header);
            lines.push(request.to_json()?);
        }
        lines.push(String::new());
        Ok(lines.join("\n"))
    }

    /// Equivalent command line call, for diagnostics only
    pub fn to_curl(&self) -> Result<String, serde_json::Error> {
        Ok(format!(
            "curl -X POST \"{}?pretty=true\" -d '{}'",
            self.url(),
            self.to_payload()?
        ))
    }

    /// Sends the batch without touching the memoized results
    pub async fn execute(&self) -> Result<MultiSearchOutcome, MultiSearchError> {
        if self.requests.is_empty() {
            return Ok(MultiSearchOutcome {
                response: None,
                envelope: None,
                results: Vec::new(),
            });
        }

        let payload = self.to_payload().map_err(MultiSearchError::Serialization)?;
        let command = self.to_curl().map_err(MultiSearchError::Serialization)?;
        let mut log_scope = self
            .client
            .log_scope("_msearch", self.indices(), command.clone());

        // A failed batch is always surfaced, whatever the configured policy says
        let response = self
            .client
            .send_or_fail(&self.url(), &payload, &mut log_scope)
            .await
            .map_err(|source| MultiSearchError::RequestFailed {
                command,
                body: source.body().map(String::from),
                source,
            })?;

        log_scope.record_response(response.status, &response.body);
        let envelope = serde_json::from_str::<serde_json::Value>(&response.body)
            .map_err(MultiSearchError::JsonDecodeError)?;
        log_scope.record_decoded(&envelope);

        let results = self.demultiplex(&envelope)?;
        Ok(MultiSearchOutcome {
            response: Some(response),
            envelope: Some(envelope),
            results,
        })
    }

    /// Maps entry `i` of the `responses` array onto request `i`.
    /// Entries reporting an error become empty collections.
    fn demultiplex(
        &self,
        envelope: &serde_json::Value,
    ) -> Result<Vec<ResultCollection>, MultiSearchError> {
        let responses = envelope
            .get("responses")
            .and_then(serde_json::Value::as_array)
            .ok_or(MultiSearchError::MissingResponses)?;

        if responses.len() != self.requests.len() {
            return Err(MultiSearchError::ResponseCountMismatch {
                expected: self.requests.len(),
                actual: responses.len(),
            });
        }

        let results = responses
            .iter()
            .enumerate()
            .map(|(position, response)| match response.get("error") {
                Some(error) => {
                    slog::warn!(
                        self.client.logger(),
                        "search inside multi-search failed";
                        "position" => position,
                        "error" => %error,
                    );
                    ResultCollection::failed(error.clone())
                }
                None => ResultCollection::from_response(response.clone()),
            })
            .collect();
        Ok(results)
    }

    /// Results in request order, sending the batch first if it has not been sent yet.
    /// Concurrent callers share a single in-flight request.
    pub async fn results(&self) -> Result<&[ResultCollection], MultiSearchError> {
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

    /// Decoded JSON of the last response, if any
    #[must_use]
    pub fn envelope(&self) -> Option<&serde_json::Value> {
        self.executed
            .get()
            .and_then(|outcome| outcome.envelope.as_ref())
    }

    /// Forgets the memoized results so that the next access sends the batch again
    pub fn invalidate(&mut self) {
        self.executed = OnceCell::new();
    }

    /// Sends the batch again, replacing any earlier results
    pub async fn perform(&mut self) -> Result<&[ResultCollection], MultiSearchError> {
        self.invalidate();
        self.results().await
    }
}
