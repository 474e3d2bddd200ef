//! Data fragments.
//!
//! Every sourced type needs one `fragment <Type> on <Type>` selecting its
//! data. A fragment comes from, in order: a fragment supplied by the caller,
//! the fragment store, or the generator (whose output is written back to the
//! store).

use crate::entity_types::EntityTypeDescriptor;
use crate::error::SourcingError;
use crate::listing::identity_fragment_name;
use crate::schema::{RemoteSchema, TypeDef};
use async_trait::async_trait;
use gqlsrc_syntax::{format, parse, Definition, Document, FragmentDefinition, Selection, SelectionSet};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Extension of fragment files.
pub const FRAGMENT_FILE_EXTENSION: &str = "graphql";

/// Where a data fragment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentOrigin {
    Supplied,
    Cached,
    Generated,
}

/// The data fragment document of one type.
///
/// The document may define helper fragments next to the primary one.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFragment {
    pub type_name: String,
    pub document: Document,
    pub origin: FragmentOrigin,
}

impl DataFragment {
    /// The `fragment <Type> on ...` definition.
    pub fn primary(&self) -> Option<&FragmentDefinition> {
        self.document.fragment(&self.type_name)
    }
}

/// Text storage for fragment documents, addressed by type name.
#[async_trait]
pub trait FragmentStore: Send + Sync {
    /// Returns `None` when nothing is stored for the type.
    async fn read(&self, type_name: &str) -> io::Result<Option<String>>;

    async fn write(&self, type_name: &str, text: &str) -> io::Result<()>;
}

/// Stores fragments as `<dir>/<Type>.graphql`.
#[derive(Debug, Clone)]
pub struct FsFragmentStore {
    dir: PathBuf,
}

impl FsFragmentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, type_name: &str) -> PathBuf {
        self.dir.join(format!("{type_name}.{FRAGMENT_FILE_EXTENSION}"))
    }
}

#[async_trait]
impl FragmentStore for FsFragmentStore {
    async fn read(&self, type_name: &str) -> io::Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(type_name)).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write(&self, type_name: &str, text: &str) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path_for(type_name), text).await
    }
}

/// In-memory fragment store.
#[derive(Debug, Default)]
pub struct MemoryFragmentStore {
    entries: Mutex<IndexMap<String, String>>,
}

impl MemoryFragmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_entry(mut self, type_name: impl Into<String>, text: impl Into<String>) -> Self {
        self.entries.get_mut().insert(type_name.into(), text.into());
        self
    }

    pub async fn get(&self, type_name: &str) -> Option<String> {
        self.entries.lock().await.get(type_name).cloned()
    }
}

#[async_trait]
impl FragmentStore for MemoryFragmentStore {
    async fn read(&self, type_name: &str) -> io::Result<Option<String>> {
        Ok(self.get(type_name).await)
    }

    async fn write(&self, type_name: &str, text: &str) -> io::Result<()> {
        self.entries
            .lock()
            .await
            .insert(type_name.to_string(), text.to_string());
        Ok(())
    }
}

/// Produces a data fragment document for a type without one.
#[async_trait]
pub trait FragmentGenerator: Send + Sync {
    /// `sourced` lists every type of the run, so that references to other
    /// entities can select identities instead of nesting their data.
    async fn generate(
        &self,
        schema: &RemoteSchema,
        descriptor: &EntityTypeDescriptor,
        sourced: &[EntityTypeDescriptor],
    ) -> Result<Document, SourcingError>;
}

/// Selects every argument-free leaf field, nesting objects up to a depth.
#[derive(Debug, Clone, Copy)]
pub struct DefaultFragmentGenerator {
    max_depth: usize,
}

impl DefaultFragmentGenerator {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    fn selections(
        &self,
        schema: &RemoteSchema,
        type_name: &str,
        depth: usize,
        sourced: &FxHashSet<&str>,
    ) -> Vec<Selection> {
        let Some(fields) = schema.type_by_name(type_name).and_then(TypeDef::fields) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for field in fields.values() {
            if field.name.starts_with("__") || field.has_required_arguments() {
                continue;
            }
            let target = field.ty.named_type();
            match schema.type_by_name(target) {
                Some(def) if def.is_leaf() => out.push(Selection::field(field.name.as_str())),
                Some(TypeDef::Object(_)) => {
                    let inner = self.object_selections(schema, target, depth, sourced);
                    if !inner.is_empty() {
                        out.push(Selection::object(field.name.as_str(), inner));
                    }
                }
                Some(def) if def.is_abstract() => {
                    let mut inner = vec![Selection::field("__typename")];
                    for member in schema.implementors_of(target) {
                        let sub = self.object_selections(schema, member, depth, sourced);
                        if !sub.is_empty() {
                            inner.push(Selection::inline(member, sub));
                        }
                    }
                    out.push(Selection::object(field.name.as_str(), inner));
                }
                // Input objects cannot be selected; unknown types are ignored.
                Some(_) | None => {}
            }
        }
        out
    }

    /// Selections of a nested object: the identity of a sourced entity, or
    /// its own fields while the depth allows.
    fn object_selections(
        &self,
        schema: &RemoteSchema,
        type_name: &str,
        depth: usize,
        sourced: &FxHashSet<&str>,
    ) -> Vec<Selection> {
        if sourced.contains(type_name) {
            vec![Selection::spread(identity_fragment_name(type_name))]
        } else if depth < self.max_depth {
            self.selections(schema, type_name, depth + 1, sourced)
        } else {
            Vec::new()
        }
    }
}

impl Default for DefaultFragmentGenerator {
    fn default() -> Self {
        Self::new(2)
    }
}

#[async_trait]
impl FragmentGenerator for DefaultFragmentGenerator {
    async fn generate(
        &self,
        schema: &RemoteSchema,
        descriptor: &EntityTypeDescriptor,
        sourced: &[EntityTypeDescriptor],
    ) -> Result<Document, SourcingError> {
        let type_name = descriptor.remote_type_name.as_str();
        let sourced: FxHashSet<&str> = sourced
            .iter()
            .map(|d| d.remote_type_name.as_str())
            .collect();

        let selections = self.selections(schema, type_name, 0, &sourced);
        if selections.is_empty() {
            return Err(SourcingError::fragment(type_name, "type has no selectable fields"));
        }

        Ok(Document::new(vec![Definition::Fragment(FragmentDefinition::new(
            type_name,
            type_name,
            SelectionSet::new(selections),
        ))]))
    }
}

/// Outcome of fragment resolution. Every descriptor appears in exactly one
/// of the two maps.
#[derive(Debug, Default)]
pub struct FragmentResolution {
    pub fragments: IndexMap<String, DataFragment>,
    pub failures: IndexMap<String, SourcingError>,
}

/// Resolves one data fragment per descriptor.
pub struct FragmentProvider {
    generator: Arc<dyn FragmentGenerator>,
    store: Option<Arc<dyn FragmentStore>>,
    supplied: IndexMap<String, String>,
}

impl FragmentProvider {
    pub fn new(generator: Arc<dyn FragmentGenerator>) -> Self {
        Self {
            generator,
            store: None,
            supplied: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn FragmentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses `source` for `type_name` instead of the store or the generator.
    #[must_use]
    pub fn supply(mut self, type_name: impl Into<String>, source: impl Into<String>) -> Self {
        self.supplied.insert(type_name.into(), source.into());
        self
    }

    /// Resolves fragments in descriptor order. A failing type never affects
    /// the others.
    pub async fn resolve(
        &self,
        schema: &RemoteSchema,
        descriptors: &[EntityTypeDescriptor],
    ) -> FragmentResolution {
        let mut resolution = FragmentResolution::default();

        for descriptor in descriptors {
            let type_name = descriptor.remote_type_name.clone();
            match self.resolve_one(schema, descriptor, descriptors).await {
                Ok(fragment) => {
                    debug!(entity_type = %type_name, origin = ?fragment.origin, "resolved data fragment");
                    resolution.fragments.insert(type_name, fragment);
                }
                Err(error) => {
                    warn!(entity_type = %type_name, %error, "skipping type without data fragment");
                    resolution.failures.insert(type_name, error);
                }
            }
        }

        resolution
    }

    async fn resolve_one(
        &self,
        schema: &RemoteSchema,
        descriptor: &EntityTypeDescriptor,
        sourced: &[EntityTypeDescriptor],
    ) -> Result<DataFragment, SourcingError> {
        let type_name = descriptor.remote_type_name.as_str();

        if let Some(source) = self.supplied.get(type_name) {
            return load(type_name, source, FragmentOrigin::Supplied);
        }

        if let Some(store) = &self.store {
            let cached = store.read(type_name).await.map_err(|e| {
                SourcingError::fragment(type_name, format!("cannot read cached fragment: {e}"))
            })?;
            if let Some(text) = cached {
                return load(type_name, &text, FragmentOrigin::Cached);
            }
        }

        let document = self.generator.generate(schema, descriptor, sourced).await?;
        let fragment = DataFragment {
            type_name: type_name.to_string(),
            document,
            origin: FragmentOrigin::Generated,
        };
        if fragment.primary().is_none() {
            return Err(SourcingError::fragment(
                type_name,
                format!("generator did not define fragment `{type_name}`"),
            ));
        }

        if let Some(store) = &self.store {
            if let Err(error) = store.write(type_name, &format(&fragment.document)).await {
                warn!(entity_type = %type_name, %error, "failed to cache generated fragment");
            }
        }
        Ok(fragment)
    }
}

fn load(type_name: &str, source: &str, origin: FragmentOrigin) -> Result<DataFragment, SourcingError> {
    let document = parse(source).into_result().map_err(|diagnostics| {
        SourcingError::fragment(
            type_name,
            format!("fragment does not parse: {}", diagnostics.summary(source)),
        )
    })?;
    let fragment = DataFragment {
        type_name: type_name.to_string(),
        document,
        origin,
    };
    if fragment.primary().is_none() {
        return Err(SourcingError::fragment(
            type_name,
            format!("document does not define fragment `{type_name}`"),
        ));
    }
    Ok(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, InterfaceDef, ObjectDef, SchemaBuilder, TypeRef};

    fn descriptor(name: &str) -> EntityTypeDescriptor {
        EntityTypeDescriptor {
            remote_type_name: name.into(),
            query_field_name: "nodeQuery".into(),
            supported_languages: vec!["EN".into()],
            is_interface: false,
        }
    }

    fn schema() -> RemoteSchema {
        let string = || TypeRef::named("String");
        SchemaBuilder::new()
            .object(
                ObjectDef::new("Article")
                    .field(FieldDef::new("title", TypeRef::non_null(string())))
                    .field(FieldDef::new("status", TypeRef::named("Status")))
                    .field(FieldDef::new("body", TypeRef::named("TextFormatted")))
                    .field(FieldDef::new("author", TypeRef::named("User")))
                    .field(FieldDef::new("tags", TypeRef::list(TypeRef::named("Tag"))))
                    .field(FieldDef::new("owner", TypeRef::named("Owner")))
                    .field(
                        FieldDef::new("summary", string())
                            .argument("length", TypeRef::non_null(TypeRef::named("Int"))),
                    )
                    .field(FieldDef::new("__internal", string())),
            )
            .object(
                ObjectDef::new("TextFormatted")
                    .field(FieldDef::new("value", string()))
                    .field(FieldDef::new("format", TypeRef::named("Format"))),
            )
            .object(
                ObjectDef::new("Format")
                    .field(FieldDef::new("name", string()))
                    .field(FieldDef::new("label", TypeRef::named("Meta"))),
            )
            .object(ObjectDef::new("Meta").field(FieldDef::new("text", string())))
            .object(ObjectDef::new("User").field(FieldDef::new("name", string())))
            .object(ObjectDef::new("Tag").field(FieldDef::new("name", string())))
            .object(ObjectDef::new("Empty"))
            .interface(InterfaceDef::new("Owner").possible_type("User").possible_type("Tag"))
            .enumeration("Status", ["DRAFT", "PUBLISHED"])
            .build()
    }

    #[tokio::test]
    async fn test_default_generation() {
        let sourced = vec![descriptor("Article"), descriptor("Tag")];
        let doc = DefaultFragmentGenerator::new(2)
            .generate(&schema(), &sourced[0], &sourced)
            .await
            .unwrap();

        assert_eq!(
            format(&doc),
            "fragment Article on Article {
  title
  status
  body {
    value
    format {
      name
    }
  }
  author {
    name
  }
  tags {
    ..._TagId_
  }
  owner {
    __typename
    ... on User {
      name
    }
    ... on Tag {
      ..._TagId_
    }
  }
}"
        );
    }

    #[tokio::test]
    async fn test_generation_depth_and_empty_type() {
        let sourced = vec![descriptor("Article")];
        let doc = DefaultFragmentGenerator::new(0)
            .generate(&schema(), &sourced[0], &sourced)
            .await
            .unwrap();
        let paths = doc.fragment("Article").unwrap().selection_set.leaf_paths();
        assert_eq!(paths, vec!["title", "status", "owner.__typename"]);

        let err = DefaultFragmentGenerator::default()
            .generate(&schema(), &descriptor("Empty"), &sourced)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FRAGMENT_GENERATION_ERROR");
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_provider_precedence_and_caching() {
        let store = Arc::new(
            MemoryFragmentStore::new()
                .with_entry("Tag", "fragment Tag on Tag { name ...TagExtra } fragment TagExtra on Tag { id }"),
        );
        let provider = FragmentProvider::new(Arc::new(DefaultFragmentGenerator::default()))
            .with_store(store.clone())
            .supply("User", "fragment User on User { name }");

        let descriptors = vec![descriptor("Article"), descriptor("Tag"), descriptor("User")];
        let resolution = provider.resolve(&schema(), &descriptors).await;

        assert!(resolution.failures.is_empty());
        let origins: Vec<_> = resolution.fragments.values().map(|f| f.origin).collect();
        assert_eq!(
            origins,
            vec![FragmentOrigin::Generated, FragmentOrigin::Cached, FragmentOrigin::Supplied]
        );
        assert!(resolution.fragments["Tag"].document.fragment("TagExtra").is_some());

        let cached = store.get("Article").await.unwrap();
        assert!(cached.starts_with("fragment Article on Article {"));
        assert!(store.get("User").await.is_none());
    }

    #[tokio::test]
    async fn test_cached_entry_is_not_regenerated() {
        let store = Arc::new(MemoryFragmentStore::new().with_entry("Article", "fragment Article on Article { title }"));
        let provider = FragmentProvider::new(Arc::new(DefaultFragmentGenerator::default()))
            .with_store(store.clone());
        let resolution = provider.resolve(&schema(), &[descriptor("Article")]).await;

        let leaves = resolution.fragments["Article"].primary().unwrap().selection_set.leaf_paths();
        assert_eq!(leaves, vec!["title"]);
        assert_eq!(store.get("Article").await.unwrap(), "fragment Article on Article { title }");
    }

    #[tokio::test]
    async fn test_failures_are_scoped_to_their_type() {
        let store = Arc::new(
            MemoryFragmentStore::new()
                .with_entry("Article", "fragment Article on Article {")
                .with_entry("User", "fragment Author on User { name }"),
        );
        let provider = FragmentProvider::new(Arc::new(DefaultFragmentGenerator::default()))
            .with_store(store);
        let descriptors = vec![
            descriptor("Article"),
            descriptor("User"),
            descriptor("Empty"),
            descriptor("Tag"),
        ];
        let resolution = provider.resolve(&schema(), &descriptors).await;

        assert_eq!(
            resolution.failures.keys().collect::<Vec<_>>(),
            vec!["Article", "User", "Empty"]
        );
        assert!(resolution.failures["Article"].to_string().contains("does not parse"));
        assert!(resolution.failures["User"].to_string().contains("does not define fragment `User`"));
        assert_eq!(resolution.fragments.keys().collect::<Vec<_>>(), vec!["Tag"]);
    }

    #[tokio::test]
    async fn test_fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsFragmentStore::new(dir.path().join("fragments"));

        assert!(store.read("Article").await.unwrap().is_none());
        store.write("Article", "fragment Article on Article { title }").await.unwrap();
        assert!(store.path_for("Article").ends_with("fragments/Article.graphql"));
        assert_eq!(
            store.read("Article").await.unwrap().as_deref(),
            Some("fragment Article on Article { title }")
        );
    }
}
