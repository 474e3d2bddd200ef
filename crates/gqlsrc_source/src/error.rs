//! Error types for a sourcing run.

use crate::executor::{ExecutorError, GraphqlError};
use thiserror::Error;

/// Errors raised while preparing or running a sourcing pass.
///
/// Run-level errors (`is_fatal`) abort before anything reaches the node sink.
/// The others are scoped to a single entity type and end up in the report.
#[derive(Debug, Error)]
pub enum SourcingError {
    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The remote schema could not be loaded or decoded.
    #[error("failed to load remote schema: {0}")]
    SchemaLoad(String),

    /// The pagination adapter does not drive the listing query variables.
    #[error(
        "pagination adapter `{adapter}` expects variables {found:?}, listing queries declare {expected:?}"
    )]
    PaginationVariableMismatch {
        adapter: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// A compiled document references a fragment that does not exist.
    #[error("fragment `{fragment}` required by `{type_name}` is not defined")]
    UnresolvedFragment { type_name: String, fragment: String },

    /// No data fragment could be read or generated for a type.
    #[error("no data fragment for `{type_name}`: {message}")]
    FragmentGeneration { type_name: String, message: String },

    /// A page fetch failed.
    #[error("fetching `{type_name}` in {language} failed: {source}")]
    Fetch {
        type_name: String,
        language: String,
        #[source]
        source: FetchError,
    },

    /// The node sink rejected a definition or a record.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// The run was cancelled.
    #[error("sourcing was cancelled")]
    Cancelled,
}

impl SourcingError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::SchemaLoad(_) => "SCHEMA_LOAD_ERROR",
            Self::PaginationVariableMismatch { .. } => "PAGINATION_VARIABLE_MISMATCH",
            Self::UnresolvedFragment { .. } => "UNRESOLVED_FRAGMENT",
            Self::FragmentGeneration { .. } => "FRAGMENT_GENERATION_ERROR",
            Self::Fetch { .. } => "FETCH_ERROR",
            Self::Sink(_) => "SINK_ERROR",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Returns true for errors that abort the whole run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::SchemaLoad(_)
                | Self::PaginationVariableMismatch { .. }
                | Self::UnresolvedFragment { .. }
                | Self::Cancelled
        )
    }

    pub(crate) fn fragment(type_name: &str, message: impl Into<String>) -> Self {
        Self::FragmentGeneration {
            type_name: type_name.to_string(),
            message: message.into(),
        }
    }
}

/// Why a single page could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport or decoding failure.
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// The remote API answered with GraphQL errors.
    #[error("remote returned errors: {}", join_messages(.0))]
    Graphql(Vec<GraphqlError>),

    /// The response did not have the expected `data.<field>` shape.
    #[error("unexpected response shape: {0}")]
    Shape(String),

    /// The compiled document has no operation for the requested language.
    #[error("no listing operation for language `{0}`")]
    MissingOperation(String),
}

/// Error returned by a node sink.
#[derive(Debug, Error)]
#[error("node sink failed: {0}")]
pub struct SinkError(pub String);

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        Self(err.to_string())
    }
}

fn join_messages(errors: &[GraphqlError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
