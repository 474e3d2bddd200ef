//! Remote GraphQL execution.
//!
//! The engine talks to the remote API only through [`RemoteExecutor`]. The
//! bundled [`HttpExecutor`] posts JSON over reqwest and bounds the number of
//! requests in flight.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::debug;

/// Default bound on concurrent HTTP requests.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_ERROR_BODY: usize = 2048;

/// A GraphQL request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub query: String,
    pub operation_name: String,
    pub variables: Map<String, Value>,
}

impl ExecuteRequest {
    pub fn new(query: impl Into<String>, operation_name: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: operation_name.into(),
            variables: Map::new(),
        }
    }

    #[must_use]
    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }
}

/// A GraphQL response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphqlError>,
}

impl ExecuteResponse {
    /// A response carrying only data.
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    /// A response carrying only errors.
    pub fn errors(errors: Vec<GraphqlError>) -> Self {
        Self { data: None, errors }
    }
}

/// Error location within the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlErrorLocation {
    pub line: u32,
    pub column: u32,
}

/// A GraphQL error as returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default)]
    pub locations: Vec<GraphqlErrorLocation>,
    #[serde(default)]
    pub path: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphqlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
            extensions: None,
        }
    }
}

/// Transport-level failure. GraphQL errors are not transport failures and
/// travel in [`ExecuteResponse::errors`].
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("HTTP error: {message}")]
    Http { message: String, is_timeout: bool },

    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("invalid JSON response: {0}")]
    Json(String),

    #[error("GraphQL protocol error: {0}")]
    Protocol(String),

    #[error("invalid header `{0}`")]
    InvalidHeader(String),
}

impl From<reqwest::Error> for ExecutorError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http {
            message: err.to_string(),
            is_timeout: err.is_timeout(),
        }
    }
}

impl From<serde_json::Error> for ExecutorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Executes GraphQL requests against the remote API.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteResponse, ExecutorError>;
}

/// Builder for [`HttpExecutor`].
#[derive(Debug, Clone)]
pub struct HttpExecutorBuilder {
    endpoint: String,
    headers: HeaderMap,
    timeout: Duration,
    max_in_flight: usize,
    invalid_header: Option<String>,
}

impl HttpExecutorBuilder {
    fn new(endpoint: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            endpoint: endpoint.into(),
            headers,
            timeout: DEFAULT_TIMEOUT,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            invalid_header: None,
        }
    }

    /// Adds a header. Invalid names or values fail at [`build`](Self::build).
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => {
                self.invalid_header.get_or_insert_with(|| name.to_string());
            }
        }
        self
    }

    /// Adds every header of an iterator.
    #[must_use]
    pub fn headers<'h>(mut self, headers: impl IntoIterator<Item = (&'h String, &'h String)>) -> Self {
        for (name, value) in headers {
            self = self.header(name, value);
        }
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bounds the requests in flight. Zero is treated as one.
    #[must_use]
    pub fn max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max.max(1);
        self
    }

    pub fn build(self) -> Result<HttpExecutor, ExecutorError> {
        if let Some(name) = self.invalid_header {
            return Err(ExecutorError::InvalidHeader(name));
        }
        let http = reqwest::Client::builder()
            .default_headers(self.headers)
            .timeout(self.timeout)
            .build()?;
        Ok(HttpExecutor {
            endpoint: self.endpoint,
            http,
            permits: Arc::new(Semaphore::new(self.max_in_flight)),
        })
    }
}

/// reqwest-backed executor.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    endpoint: String,
    http: reqwest::Client,
    permits: Arc<Semaphore>,
}

impl HttpExecutor {
    pub fn builder(endpoint: impl Into<String>) -> HttpExecutorBuilder {
        HttpExecutorBuilder::new(endpoint)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteExecutor for HttpExecutor {
    async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteResponse, ExecutorError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ExecutorError::Protocol("executor is shut down".to_string()))?;

        debug!(operation = %request.operation_name, "POST {}", self.endpoint);
        let response = self.http.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(ExecutorError::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(&bytes),
            });
        }

        let body: ExecuteResponse = serde_json::from_slice(&bytes)?;
        if body.data.is_none() && body.errors.is_empty() {
            return Err(ExecutorError::Protocol(
                "response has neither `data` nor `errors`".to_string(),
            ));
        }
        Ok(body)
    }
}

fn truncate_body(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.into_owned(),
    }
}
