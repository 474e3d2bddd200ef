//! Pagination engine.
//!
//! A [`PaginationAdapter`] decides the variables of each page and when to
//! stop; the [`Paginator`] drives a compiled document through the remote
//! executor with it. Pages of one (type, language) pair are fetched strictly
//! in order because each page's variables depend on the previous one.

use crate::cancel::CancellationToken;
use crate::compiler::CompiledDocument;
use crate::config::DEFAULT_PAGE_SIZE;
use crate::error::{FetchError, SourcingError};
use crate::executor::{ExecuteRequest, RemoteExecutor};
use crate::listing::{ENTITIES_FIELD, LIMIT_VARIABLE, OFFSET_VARIABLE};
use futures_util::Stream;
use serde_json::{Map, Value};
use tracing::debug;

/// Variables of the next request and whether there is one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaginationState {
    pub variables: Map<String, Value>,
    pub has_next_page: bool,
}

/// Strategy for paging through one listing operation.
///
/// `page` is the value of the query root field, e.g. `{"entities": [...]}`.
pub trait PaginationAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Variables this adapter sets on every request.
    fn expected_variable_names(&self) -> Vec<String>;

    fn start(&self) -> PaginationState;

    fn next(&self, state: &PaginationState, page: &Value) -> PaginationState;

    /// Merges a page into the accumulated result.
    fn concat(&self, result: Value, page: Value) -> Value;

    fn get_items(&self, page: &Value) -> Vec<Value>;
}

/// Limit/offset pagination over `entities` lists.
#[derive(Debug, Clone, Copy)]
pub struct LimitOffset {
    page_size: u64,
}

impl LimitOffset {
    /// Creates the adapter. A zero page size falls back to the default.
    pub fn new(page_size: u64) -> Self {
        Self {
            page_size: if page_size == 0 {
                DEFAULT_PAGE_SIZE
            } else {
                page_size
            },
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }
}

impl Default for LimitOffset {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// Reads a non-negative integer from a number or a numeric string.
fn coerce_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn entities(page: &Value) -> &[Value] {
    page.get(ENTITIES_FIELD)
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

impl PaginationAdapter for LimitOffset {
    fn name(&self) -> &str {
        "LimitOffset"
    }

    fn expected_variable_names(&self) -> Vec<String> {
        vec![LIMIT_VARIABLE.to_string(), OFFSET_VARIABLE.to_string()]
    }

    fn start(&self) -> PaginationState {
        let mut variables = Map::new();
        variables.insert(LIMIT_VARIABLE.into(), Value::from(self.page_size));
        variables.insert(OFFSET_VARIABLE.into(), Value::from(0u64));
        PaginationState {
            variables,
            has_next_page: true,
        }
    }

    fn next(&self, state: &PaginationState, page: &Value) -> PaginationState {
        let limit = coerce_u64(state.variables.get(LIMIT_VARIABLE))
            .filter(|&l| l > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = coerce_u64(state.variables.get(OFFSET_VARIABLE)).unwrap_or(0);
        let fetched = entities(page).len() as u64;

        let mut variables = state.variables.clone();
        variables.insert(LIMIT_VARIABLE.into(), Value::from(limit));
        variables.insert(OFFSET_VARIABLE.into(), Value::from(offset + limit));
        PaginationState {
            variables,
            // An exactly full last page costs one extra, empty request.
            has_next_page: fetched >= limit,
        }
    }

    fn concat(&self, result: Value, page: Value) -> Value {
        let mut merged: Vec<Value> = entities(&result).to_vec();
        merged.extend_from_slice(entities(&page));
        let mut out = Map::new();
        out.insert(ENTITIES_FIELD.into(), Value::Array(merged));
        Value::Object(out)
    }

    fn get_items(&self, page: &Value) -> Vec<Value> {
        entities(page).to_vec()
    }
}

/// Drives compiled documents through the remote executor.
pub struct Paginator<'a> {
    executor: &'a dyn RemoteExecutor,
    adapter: &'a dyn PaginationAdapter,
    cancel: CancellationToken,
}

impl<'a> Paginator<'a> {
    pub fn new(executor: &'a dyn RemoteExecutor, adapter: &'a dyn PaginationAdapter) -> Self {
        Self {
            executor,
            adapter,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Lazily yields every entity of one language, page after page.
    ///
    /// The stream ends after the first error. Items already yielded stay
    /// yielded.
    pub fn paginate(
        &self,
        document: &'a CompiledDocument,
        language: &'a str,
    ) -> impl Stream<Item = Result<Value, SourcingError>> + 'a {
        let executor = self.executor;
        let adapter = self.adapter;
        let cancel = self.cancel.clone();

        async_stream::stream! {
            let mut state = adapter.start();
            let mut page_number = 0usize;

            while state.has_next_page {
                if cancel.is_cancelled() {
                    yield Err(SourcingError::Cancelled);
                    return;
                }

                page_number += 1;
                let page = match fetch_page(executor, document, language, &state).await {
                    Ok(page) => page,
                    Err(source) => {
                        yield Err(fetch_error(document, language, source));
                        return;
                    }
                };

                let items = adapter.get_items(&page);
                debug!(
                    entity_type = %document.remote_type_name,
                    language,
                    page = page_number,
                    items = items.len(),
                    "fetched page"
                );
                state = adapter.next(&state, &page);

                for item in items {
                    yield Ok(item);
                }
            }
        }
    }

    /// Fetches every page of one language and returns all entities at once.
    pub async fn collect_all(
        &self,
        document: &CompiledDocument,
        language: &str,
    ) -> Result<Vec<Value>, SourcingError> {
        let mut state = self.adapter.start();
        let mut result: Option<Value> = None;

        while state.has_next_page {
            if self.cancel.is_cancelled() {
                return Err(SourcingError::Cancelled);
            }
            let page = fetch_page(self.executor, document, language, &state)
                .await
                .map_err(|source| fetch_error(document, language, source))?;
            state = self.adapter.next(&state, &page);
            result = Some(match result {
                Some(acc) => self.adapter.concat(acc, page),
                None => page,
            });
        }

        Ok(result
            .map(|acc| self.adapter.get_items(&acc))
            .unwrap_or_default())
    }
}

fn fetch_error(document: &CompiledDocument, language: &str, source: FetchError) -> SourcingError {
    SourcingError::Fetch {
        type_name: document.remote_type_name.clone(),
        language: language.to_string(),
        source,
    }
}

/// Executes one page and returns `data.<query field>`.
async fn fetch_page(
    executor: &dyn RemoteExecutor,
    document: &CompiledDocument,
    language: &str,
    state: &PaginationState,
) -> Result<Value, FetchError> {
    let operation = document
        .operation_for(language)
        .ok_or_else(|| FetchError::MissingOperation(language.to_string()))?;

    let request = ExecuteRequest::new(document.query.as_str(), operation.name.as_str())
        .with_variables(state.variables.clone());
    let response = executor.execute(request).await?;

    if !response.errors.is_empty() {
        return Err(FetchError::Graphql(response.errors));
    }

    let mut data = response
        .data
        .ok_or_else(|| FetchError::Shape("response has no `data`".to_string()))?;
    match data.get_mut(&operation.query_field_name).map(Value::take) {
        Some(page @ Value::Object(_)) => Ok(page),
        Some(Value::Null) | None => Err(FetchError::Shape(format!(
            "`data.{}` is missing",
            operation.query_field_name
        ))),
        Some(other) => Err(FetchError::Shape(format!(
            "`data.{}` is not an object: {other}",
            operation.query_field_name
        ))),
    }
}
