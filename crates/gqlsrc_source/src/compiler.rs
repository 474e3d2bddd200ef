//! Query compilation.
//!
//! Each listing operation gets the data fragment spread next to the identity
//! fragment, so one round trip returns identity and data. The compiled
//! document then carries every fragment reachable from its operations.

use crate::entity_types::EntityTypeDescriptor;
use crate::error::SourcingError;
use crate::fragments::DataFragment;
use crate::listing::{identity_fragment_name, ListingQuery, ENTITIES_FIELD};
use gqlsrc_syntax::{format, Definition, Document, FragmentDefinition, Selection, SelectionSet};
use indexmap::IndexMap;
use std::collections::VecDeque;

/// One executable operation of a compiled document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledOperation {
    pub name: String,
    pub language: String,
    pub query_field_name: String,
}

/// The final query document of one entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDocument {
    pub remote_type_name: String,
    pub document: Document,
    pub operations: Vec<CompiledOperation>,
    /// Listing rows of an interface type include siblings that match no
    /// fragment type condition; those come back as empty objects.
    pub is_interface: bool,
    /// Printed form of `document`, sent with every request.
    pub query: String,
}

impl CompiledDocument {
    pub fn operation_for(&self, language: &str) -> Option<&CompiledOperation> {
        self.operations.iter().find(|op| op.language == language)
    }

    pub fn identity_fragment(&self) -> Option<&FragmentDefinition> {
        self.document
            .fragment(&identity_fragment_name(&self.remote_type_name))
    }

    pub fn data_fragment(&self) -> Option<&FragmentDefinition> {
        self.document.fragment(&self.remote_type_name)
    }
}

/// Compiles one document per descriptor.
///
/// `listing_queries` and `data_fragments` are keyed by remote type name.
/// `identity_fragments` must hold the identity fragment of every sourced
/// type, since data fragments may reference other types' nodes.
pub fn compile(
    descriptors: &[EntityTypeDescriptor],
    listing_queries: &IndexMap<String, Vec<ListingQuery>>,
    identity_fragments: &IndexMap<String, FragmentDefinition>,
    data_fragments: &IndexMap<String, DataFragment>,
) -> Result<IndexMap<String, CompiledDocument>, SourcingError> {
    let pool = FragmentPool::new(identity_fragments, data_fragments);
    let mut compiled = IndexMap::with_capacity(descriptors.len());

    for descriptor in descriptors {
        let type_name = &descriptor.remote_type_name;
        let unresolved = |fragment: &str| SourcingError::UnresolvedFragment {
            type_name: type_name.clone(),
            fragment: fragment.to_string(),
        };

        let data = data_fragments
            .get(type_name)
            .ok_or_else(|| unresolved(type_name))?;
        let data_name = data
            .primary()
            .map(|f| f.name.value.clone())
            .ok_or_else(|| unresolved(type_name))?;

        let mut definitions = Vec::new();
        let mut operations = Vec::new();

        for listing in listing_queries.get(type_name).into_iter().flatten() {
            let mut operation = listing.operation.clone();
            let entities = operation
                .selection_set
                .find_field_mut(ENTITIES_FIELD)
                .ok_or_else(|| unresolved(ENTITIES_FIELD))?;
            entities
                .selection_set
                .get_or_insert_with(SelectionSet::default)
                .push(Selection::spread(data_name.as_str()));

            operations.push(CompiledOperation {
                name: listing.operation_name().to_string(),
                language: listing.language.clone(),
                query_field_name: listing.query_field_name.clone(),
            });
            definitions.push(Definition::Operation(operation));
        }

        let roots: Vec<&SelectionSet> = definitions
            .iter()
            .filter_map(|d| match d {
                Definition::Operation(op) => Some(&op.selection_set),
                Definition::Fragment(_) => None,
            })
            .collect();
        let fragments = pool
            .collect(data, &roots)
            .map_err(|name| unresolved(&name))?;
        definitions.extend(fragments.into_iter().map(Definition::Fragment));

        let document = Document::new(definitions);
        let query = format(&document);
        compiled.insert(
            type_name.clone(),
            CompiledDocument {
                remote_type_name: type_name.clone(),
                document,
                operations,
                is_interface: descriptor.is_interface,
                query,
            },
        );
    }

    Ok(compiled)
}

/// Fragment lookup for spreads. The compiling type's own data fragment
/// document shadows everything else.
struct FragmentPool<'a> {
    identity: &'a IndexMap<String, FragmentDefinition>,
    data: &'a IndexMap<String, DataFragment>,
}

impl<'a> FragmentPool<'a> {
    fn new(
        identity: &'a IndexMap<String, FragmentDefinition>,
        data: &'a IndexMap<String, DataFragment>,
    ) -> Self {
        Self { identity, data }
    }

    fn lookup(&self, own: &'a DataFragment, name: &str) -> Option<&'a FragmentDefinition> {
        own.document
            .fragment(name)
            .or_else(|| self.identity.values().find(|f| f.name.value == name))
            .or_else(|| self.data.values().find_map(|d| d.document.fragment(name)))
    }

    /// Collects fragments reachable from `roots`, breadth first, each once.
    /// Returns the name of the first spread that resolves to nothing.
    fn collect(
        &self,
        own: &'a DataFragment,
        roots: &[&SelectionSet],
    ) -> Result<Vec<FragmentDefinition>, String> {
        let mut queue: VecDeque<String> = roots
            .iter()
            .flat_map(|set| set.fragment_spreads())
            .map(ToString::to_string)
            .collect();
        let mut seen: Vec<String> = Vec::new();
        let mut out = Vec::new();

        while let Some(name) = queue.pop_front() {
            if seen.contains(&name) {
                continue;
            }
            let fragment = self.lookup(own, &name).ok_or_else(|| name.clone())?;
            queue.extend(
                fragment
                    .selection_set
                    .fragment_spreads()
                    .into_iter()
                    .map(ToString::to_string),
            );
            seen.push(name);
            out.push(fragment.clone());
        }

        Ok(out)
    }
}
