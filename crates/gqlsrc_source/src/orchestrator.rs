//! Sourcing orchestrator.
//!
//! A run has two phases. [`Sourcer::prepare`] introspects the schema, finds
//! entity types, synthesizes listing queries, resolves data fragments and
//! compiles one document per type; any error there aborts the run before
//! the sink sees anything. [`Sourcer::source`] then paginates every
//! compiled type into the sink, isolating failures per type.

use crate::cancel::CancellationToken;
use crate::compiler::{compile, CompiledDocument};
use crate::config::SourcingConfig;
use crate::debug_dump::write_compiled_queries;
use crate::entity_types::{find_entity_types, EntityTypeDescriptor};
use crate::error::SourcingError;
use crate::executor::RemoteExecutor;
use crate::fragments::{
    DefaultFragmentGenerator, FragmentGenerator, FragmentProvider, FragmentStore, FsFragmentStore,
};
use crate::listing::{check_pagination_variables, identity_fragment, ListingSynthesizer};
use crate::pagination::{LimitOffset, PaginationAdapter, Paginator};
use crate::schema::RemoteSchema;
use crate::sink::{EntityRecord, NodeDefinition, NodeIdentity, NodeSink};
use futures_util::{stream, StreamExt};
use gqlsrc_syntax::Value;
use indexmap::IndexMap;
use std::pin::pin;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// How sourcing ended for one entity type.
#[derive(Debug)]
pub enum TypeOutcome {
    /// Every language was paginated to the end.
    Complete { emitted: usize },
    /// A fetch or sink failure stopped the type. Records emitted before
    /// the failure stay emitted.
    Partial {
        emitted: usize,
        language: String,
        error: SourcingError,
    },
    /// No data fragment; nothing was fetched.
    Skipped { error: SourcingError },
    Cancelled { emitted: usize },
}

impl TypeOutcome {
    pub fn emitted(&self) -> usize {
        match self {
            Self::Complete { emitted } | Self::Partial { emitted, .. } | Self::Cancelled { emitted } => {
                *emitted
            }
            Self::Skipped { .. } => 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Complete { .. } => "complete",
            Self::Partial { .. } => "partial",
            Self::Skipped { .. } => "skipped",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    pub fn error(&self) -> Option<&SourcingError> {
        match self {
            Self::Partial { error, .. } | Self::Skipped { error } => Some(error),
            Self::Complete { .. } | Self::Cancelled { .. } => None,
        }
    }
}

/// Per-type outcomes of a run, in entity type order.
#[derive(Debug, Default)]
pub struct SourcingReport {
    pub outcomes: IndexMap<String, TypeOutcome>,
}

impl SourcingReport {
    pub fn get(&self, type_name: &str) -> Option<&TypeOutcome> {
        self.outcomes.get(type_name)
    }

    /// True when every type was sourced to the end.
    pub fn is_complete(&self) -> bool {
        self.outcomes.values().all(TypeOutcome::is_complete)
    }

    pub fn emitted_total(&self) -> usize {
        self.outcomes.values().map(TypeOutcome::emitted).sum()
    }

    /// Types whose outcome has the given label.
    pub fn types_with(&self, label: &str) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.label() == label)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Result of the preparation phase.
#[derive(Debug)]
pub struct Prepared {
    pub schema: RemoteSchema,
    pub descriptors: Vec<EntityTypeDescriptor>,
    /// Compiled documents of the types that have a data fragment.
    pub documents: IndexMap<String, CompiledDocument>,
    /// Types without a data fragment.
    pub skipped: IndexMap<String, SourcingError>,
}

/// Runs sourcing passes against one remote API.
pub struct Sourcer {
    config: SourcingConfig,
    filters: IndexMap<String, Value>,
    executor: Arc<dyn RemoteExecutor>,
    adapter: Arc<dyn PaginationAdapter>,
    generator: Arc<dyn FragmentGenerator>,
    store: Option<Arc<dyn FragmentStore>>,
    supplied: IndexMap<String, String>,
    cancel: CancellationToken,
}

impl Sourcer {
    /// Validates `config` and wires the default collaborators.
    ///
    /// Nothing is sent to `executor` until [`prepare`](Self::prepare).
    pub fn new(config: SourcingConfig, executor: Arc<dyn RemoteExecutor>) -> Result<Self, SourcingError> {
        config.validate()?;
        let filters = config.parsed_filters()?;
        let store = config
            .fragments_dir
            .clone()
            .map(|dir| Arc::new(FsFragmentStore::new(dir)) as Arc<dyn FragmentStore>);

        Ok(Self {
            adapter: Arc::new(LimitOffset::new(config.page_size)),
            generator: Arc::new(DefaultFragmentGenerator::new(config.max_fragment_depth)),
            store,
            filters,
            executor,
            supplied: IndexMap::new(),
            cancel: CancellationToken::new(),
            config,
        })
    }

    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn PaginationAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    #[must_use]
    pub fn with_fragment_store(mut self, store: Arc<dyn FragmentStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_fragment_generator(mut self, generator: Arc<dyn FragmentGenerator>) -> Self {
        self.generator = generator;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Pre-supplies the data fragment document of a type.
    #[must_use]
    pub fn supply_fragment(mut self, type_name: impl Into<String>, source: impl Into<String>) -> Self {
        self.supplied.insert(type_name.into(), source.into());
        self
    }

    pub fn config(&self) -> &SourcingConfig {
        &self.config
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Prepares and sources in one go.
    pub async fn run(&self, sink: &dyn NodeSink) -> Result<SourcingReport, SourcingError> {
        let prepared = self.prepare().await?;
        self.source(prepared, sink).await
    }

    /// Everything up to compiled documents.
    pub async fn prepare(&self) -> Result<Prepared, SourcingError> {
        check_pagination_variables(self.adapter.as_ref())?;

        let schema = RemoteSchema::load(self.executor.as_ref()).await?;
        let descriptors = find_entity_types(&schema, &self.config.languages);
        info!(types = descriptors.len(), "found entity types");

        let synthesizer = ListingSynthesizer::new(&schema).with_filters(&self.filters);
        let listing_queries: IndexMap<_, _> = descriptors
            .iter()
            .map(|d| {
                (
                    d.remote_type_name.clone(),
                    synthesizer.build_listing_queries(d, &d.supported_languages),
                )
            })
            .collect();
        let identity_fragments: IndexMap<_, _> = descriptors
            .iter()
            .map(|d| (d.remote_type_name.clone(), identity_fragment(&d.remote_type_name)))
            .collect();

        let mut provider = FragmentProvider::new(self.generator.clone());
        if let Some(store) = &self.store {
            provider = provider.with_store(store.clone());
        }
        for (type_name, source) in &self.supplied {
            provider = provider.supply(type_name.as_str(), source.as_str());
        }
        let resolution = provider.resolve(&schema, &descriptors).await;

        let compilable: Vec<EntityTypeDescriptor> = descriptors
            .iter()
            .filter(|d| resolution.fragments.contains_key(&d.remote_type_name))
            .cloned()
            .collect();
        let documents = compile(
            &compilable,
            &listing_queries,
            &identity_fragments,
            &resolution.fragments,
        )?;
        info!(
            compiled = documents.len(),
            skipped = resolution.failures.len(),
            "compiled queries"
        );

        if let Some(dir) = &self.config.debug_dir {
            write_compiled_queries(dir, &documents).await;
        }

        Ok(Prepared {
            schema,
            descriptors,
            documents,
            skipped: resolution.failures,
        })
    }

    /// Paginates every compiled type into `sink`.
    ///
    /// Fails only if the sink rejects a node definition, which happens
    /// before any record is emitted.
    pub async fn source(&self, prepared: Prepared, sink: &dyn NodeSink) -> Result<SourcingReport, SourcingError> {
        let Prepared {
            descriptors,
            documents,
            mut skipped,
            ..
        } = prepared;

        let definitions: Vec<NodeDefinition> = documents
            .values()
            .map(|doc| NodeDefinition::new(doc, &self.config.type_prefix))
            .collect();
        for definition in &definitions {
            sink.declare(definition).await?;
        }

        let results: Vec<(String, TypeOutcome)> = stream::iter(documents.values().zip(&definitions))
            .map(|(document, definition)| {
                let span = info_span!("source_type", entity_type = %document.remote_type_name);
                async move {
                    let outcome = self.source_type(document, definition, sink).await;
                    (document.remote_type_name.clone(), outcome)
                }
                .instrument(span)
            })
            .buffered(self.config.concurrency)
            .collect()
            .await;
        let mut results: IndexMap<String, TypeOutcome> = results.into_iter().collect();

        let mut report = SourcingReport::default();
        for descriptor in &descriptors {
            let name = &descriptor.remote_type_name;
            let outcome = match (results.shift_remove(name), skipped.shift_remove(name)) {
                (Some(outcome), _) => outcome,
                (None, Some(error)) => TypeOutcome::Skipped { error },
                (None, None) => continue,
            };
            report.outcomes.insert(name.clone(), outcome);
        }

        info!(
            emitted = report.emitted_total(),
            complete = report.types_with("complete").len(),
            partial = report.types_with("partial").len(),
            skipped = report.types_with("skipped").len(),
            "sourcing finished"
        );
        Ok(report)
    }

    async fn source_type(
        &self,
        document: &CompiledDocument,
        definition: &NodeDefinition,
        sink: &dyn NodeSink,
    ) -> TypeOutcome {
        let paginator = Paginator::new(self.executor.as_ref(), self.adapter.as_ref())
            .with_cancellation(self.cancel.clone());
        let mut emitted = 0;

        for language in &self.config.languages {
            let mut entities = pin!(paginator.paginate(document, language.as_str()));

            while let Some(item) = entities.next().await {
                let entity = match item {
                    Ok(entity) => entity,
                    Err(SourcingError::Cancelled) => {
                        info!(emitted, "cancelled");
                        return TypeOutcome::Cancelled { emitted };
                    }
                    Err(error) => {
                        warn!(%language, emitted, %error, "pagination failed");
                        return TypeOutcome::Partial {
                            emitted,
                            language: language.clone(),
                            error,
                        };
                    }
                };

                // Interface query fields also list sibling types. Their rows
                // match no type condition and select nothing.
                if document.is_interface && is_empty_object(&entity) {
                    debug!("skipping sibling entity");
                    continue;
                }
                let Some(identity) = NodeIdentity::from_record(&entity) else {
                    warn!(%language, "entity without identity fields");
                    continue;
                };
                if identity.type_name != document.remote_type_name {
                    debug!(sibling = %identity.type_name, "skipping sibling entity");
                    continue;
                }

                let record = EntityRecord {
                    identity,
                    data: entity,
                };
                if let Err(error) = sink.accept(definition, record).await {
                    warn!(%language, emitted, %error, "sink rejected entity");
                    return TypeOutcome::Partial {
                        emitted,
                        language: language.clone(),
                        error: error.into(),
                    };
                }
                emitted += 1;
            }
        }

        info!(emitted, "sourced");
        TypeOutcome::Complete { emitted }
    }
}

fn is_empty_object(entity: &serde_json::Value) -> bool {
    entity.as_object().is_some_and(serde_json::Map::is_empty)
}
