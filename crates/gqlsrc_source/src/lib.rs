//! Incremental GraphQL sourcing for Drupal-style entity APIs.
//!
//! This crate provides the sourcing engine:
//! - `config`: Run configuration and validation
//! - `executor`: Remote executor seam and the reqwest-based HTTP executor
//! - `schema`: Introspection into a typed `RemoteSchema`
//! - `entity_types`: Discovery of `<type>Query` fields returning `EntityQueryResult`
//! - `listing`: Identity-only listing queries and identity fragments
//! - `fragments`: Data fragment store, generator and provider
//! - `compiler`: Merging listing queries and data fragments into documents
//! - `pagination`: Pluggable pagination adapters and the paginator
//! - `sink`: Node sink seam and node identities
//! - `orchestrator`: The `Sourcer` tying everything together
//! - `debug_dump`: Write-only dump of compiled queries
//! - `cancel`: Cooperative cancellation

pub mod cancel;
pub mod compiler;
pub mod config;
pub mod debug_dump;
pub mod entity_types;
pub mod error;
pub mod executor;
pub mod fragments;
pub mod listing;
pub mod orchestrator;
pub mod pagination;
pub mod schema;
pub mod sink;

pub use cancel::CancellationToken;
pub use compiler::{compile, CompiledDocument, CompiledOperation};
pub use config::{SourcingConfig, DEFAULT_PAGE_SIZE, DEFAULT_TYPE_PREFIX};
pub use debug_dump::write_compiled_queries;
pub use entity_types::{find_entity_types, EntityTypeDescriptor, ENTITY_QUERY_RESULT};
pub use error::{FetchError, SinkError, SourcingError};
pub use executor::{
    ExecuteRequest, ExecuteResponse, ExecutorError, GraphqlError, HttpExecutor,
    HttpExecutorBuilder, RemoteExecutor,
};
pub use fragments::{
    DataFragment, DefaultFragmentGenerator, FragmentGenerator, FragmentOrigin, FragmentProvider,
    FragmentResolution, FragmentStore, FsFragmentStore, MemoryFragmentStore,
};
pub use listing::{
    check_pagination_variables, identity_fragment, identity_fragment_name, listing_operation_name,
    ListingQuery, ListingSynthesizer, IDENTITY_FIELDS,
};
pub use orchestrator::{Prepared, Sourcer, SourcingReport, TypeOutcome};
pub use pagination::{LimitOffset, PaginationAdapter, PaginationState, Paginator};
pub use schema::{RemoteSchema, SchemaBuilder, TypeDef, TypeRef};
pub use sink::{EntityRecord, MemorySink, NodeDefinition, NodeIdentity, NodeSink};
