//! Sourcing configuration.

use crate::error::SourcingError;
use gqlsrc_syntax::{is_valid_name, parse_value, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default page size for the limit/offset adapter.
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Default prefix of local node type names.
pub const DEFAULT_TYPE_PREFIX: &str = "Drupal";

/// Configuration of a sourcing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SourcingConfig {
    /// Remote GraphQL endpoint.
    #[serde(default)]
    pub url: Option<String>,

    /// Language codes, in sourcing order.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Prefix for local node type names (`Drupal` + `Article`).
    #[serde(default = "default_type_prefix")]
    pub type_prefix: String,

    /// Directory holding `<Type>.graphql` fragment files.
    #[serde(default)]
    pub fragments_dir: Option<PathBuf>,

    /// Directory receiving compiled queries for inspection.
    #[serde(default)]
    pub debug_dir: Option<PathBuf>,

    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Number of entity types sourced at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Nesting depth of generated fragments.
    #[serde(default = "default_max_fragment_depth")]
    pub max_fragment_depth: usize,

    /// Extra HTTP headers sent with every request.
    #[serde(default)]
    pub headers: IndexMap<String, String>,

    /// Per-type `filter` argument, as a GraphQL input value literal.
    #[serde(default)]
    pub filters: IndexMap<String, String>,
}

fn default_languages() -> Vec<String> {
    vec!["EN".to_string()]
}

fn default_type_prefix() -> String {
    DEFAULT_TYPE_PREFIX.to_string()
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

fn default_concurrency() -> usize {
    1
}

fn default_max_fragment_depth() -> usize {
    2
}

impl Default for SourcingConfig {
    fn default() -> Self {
        Self {
            url: None,
            languages: default_languages(),
            type_prefix: default_type_prefix(),
            fragments_dir: None,
            debug_dir: None,
            page_size: DEFAULT_PAGE_SIZE,
            concurrency: default_concurrency(),
            max_fragment_depth: default_max_fragment_depth(),
            headers: IndexMap::new(),
            filters: IndexMap::new(),
        }
    }
}

impl SourcingConfig {
    /// Creates a configuration for an endpoint with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Parses a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, SourcingError> {
        serde_json::from_str(json)
            .map_err(|e| SourcingError::Configuration(format!("invalid configuration: {e}")))
    }

    /// Sets the languages.
    #[must_use]
    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the fragment directory.
    #[must_use]
    pub fn with_fragments_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fragments_dir = Some(dir.into());
        self
    }

    /// Sets the compiled query dump directory.
    #[must_use]
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Adds a `filter` argument for one type.
    #[must_use]
    pub fn with_filter(mut self, type_name: impl Into<String>, literal: impl Into<String>) -> Self {
        self.filters.insert(type_name.into(), literal.into());
        self
    }

    /// Returns the endpoint, failing if it is missing or blank.
    pub fn endpoint(&self) -> Result<&str, SourcingError> {
        match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(SourcingError::Configuration(
                "missing `url` option".to_string(),
            )),
        }
    }

    /// Checks the configuration without touching the network.
    pub fn validate(&self) -> Result<(), SourcingError> {
        self.endpoint()?;

        if self.languages.is_empty() {
            return Err(SourcingError::Configuration(
                "`languages` must list at least one language".to_string(),
            ));
        }
        for (i, language) in self.languages.iter().enumerate() {
            if !is_valid_name(language) {
                return Err(SourcingError::Configuration(format!(
                    "language `{language}` is not a valid GraphQL enum value"
                )));
            }
            if self.languages[..i].contains(language) {
                return Err(SourcingError::Configuration(format!(
                    "language `{language}` is listed more than once"
                )));
            }
        }

        if self.page_size == 0 {
            return Err(SourcingError::Configuration(
                "`pageSize` must be greater than zero".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(SourcingError::Configuration(
                "`concurrency` must be greater than zero".to_string(),
            ));
        }

        self.parsed_filters().map(|_| ())
    }

    /// Parses every filter literal.
    pub fn parsed_filters(&self) -> Result<IndexMap<String, Value>, SourcingError> {
        self.filters
            .iter()
            .map(|(type_name, literal)| {
                let value = parse_value(literal).map_err(|diagnostics| {
                    SourcingError::Configuration(format!(
                        "filter for `{type_name}` is not a valid input value: {}",
                        diagnostics.summary(literal)
                    ))
                })?;
                // Listing operations declare only the pagination variables.
                if let Some(variable) = value.find_variable() {
                    return Err(SourcingError::Configuration(format!(
                        "filter for `{type_name}` must be constant, found `${}`",
                        variable.value
                    )));
                }
                Ok((type_name.clone(), value))
            })
            .collect()
    }
}
