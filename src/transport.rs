//! Narrow HTTP interface used to send search bodies,
//! plus the implementation backed by the Elasticsearch client library

use async_trait::async_trait;
use bytes::Bytes;
use elasticsearch::http::headers::HeaderMap;
use elasticsearch::http::transport::Transport as LibTransport;
use elasticsearch::http::Method;
use elasticsearch::{Elasticsearch, Error as LibError};
use thiserror::Error;
use url::Url;

/// Raw status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("sending request to elasticsearch failed")]
    Send(#[source] LibError),
    #[error("failed to read response body from elasticsearch")]
    BodyRead(#[source] LibError),
    #[error("connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },
}

/// Sends a body to a URL and hands back whatever came back.
/// Non-success statuses are not errors at this level.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, url: &Url, body: String) -> Result<TransportResponse, TransportError>;
}

/// Transport over a single-node Elasticsearch connection pool
pub struct ElasticsearchTransport {
    inner: Elasticsearch,
    base_path: String,
}

impl ElasticsearchTransport {
    /// Note: returning Ok(transport) from this function
    /// does not guarantee that the server is reachable
    pub fn single_node(base_url: &Url) -> Result<Self, LibError> {
        let transport = LibTransport::single_node(base_url.as_str())?;
        // The connection always treats its URL as a directory
        let mut base_path = String::from(base_url.path());
        if !base_path.ends_with('/') {
            base_path.push('/');
        }
        Ok(Self {
            inner: Elasticsearch::new(transport),
            base_path,
        })
    }

    /// The library joins paths onto the node URL itself,
    /// so any prefix already present on the node URL is removed first
    fn relative_path<'a>(&self, url: &'a Url) -> &'a str {
        url.path()
            .strip_prefix(self.base_path.as_str())
            .unwrap_or_else(|| url.path())
    }
}

#[async_trait]
impl Transport for ElasticsearchTransport {
    async fn post(&self, url: &Url, body: String) -> Result<TransportResponse, TransportError> {
        let query = url.query_pairs().into_owned().collect::<Vec<(String, String)>>();
        let query = if query.is_empty() { None } else { Some(&query) };

        // Use the untyped send API so that the already-serialized body is sent as-is
        let response = self
            .inner
            .send(
                Method::Post,
                self.relative_path(url),
                HeaderMap::new(),
                query,
                Some(Bytes::from(body)),
                None,
            )
            .await
            .map_err(TransportError::Send)?;

        let status = response.status_code().as_u16();
        let body = response.text().await.map_err(TransportError::BodyRead)?;
        Ok(TransportResponse { status, body })
    }
}
