//! Identity-only listing queries.
//!
//! For every entity type and language the synthesizer builds
//!
//! ```graphql
//! query LIST_Article_EN($limit: Int, $offset: Int) {
//!   articleQuery(limit: $limit, offset: $offset) {
//!     entities(language: EN) {
//!       ..._ArticleId_
//!     }
//!   }
//! }
//! ```
//!
//! plus one `_ArticleId_` fragment shared by all languages.

use crate::entity_types::EntityTypeDescriptor;
use crate::error::SourcingError;
use crate::pagination::PaginationAdapter;
use crate::schema::RemoteSchema;
use gqlsrc_syntax::{
    FieldSelection, FragmentDefinition, OperationDefinition, Selection, SelectionSet, Type, Value,
};
use indexmap::IndexMap;

pub const LIMIT_VARIABLE: &str = "limit";
pub const OFFSET_VARIABLE: &str = "offset";

/// Variables every listing operation declares.
pub const LISTING_VARIABLES: [&str; 2] = [LIMIT_VARIABLE, OFFSET_VARIABLE];

/// Leaf paths selected by identity fragments.
pub const IDENTITY_FIELDS: [&str; 3] = ["__typename", "entityId", "entityLanguage.id"];

/// The list field below each entity query field.
pub const ENTITIES_FIELD: &str = "entities";

const FILTER_ARGUMENT: &str = "filter";
const LANGUAGE_ARGUMENT: &str = "language";

/// `_<Type>Id_`
pub fn identity_fragment_name(type_name: &str) -> String {
    format!("_{type_name}Id_")
}

/// `LIST_<Type>_<LANG>`
pub fn listing_operation_name(type_name: &str, language: &str) -> String {
    format!("LIST_{type_name}_{language}")
}

/// Builds the identity fragment of a type.
pub fn identity_fragment(type_name: &str) -> FragmentDefinition {
    FragmentDefinition::new(
        identity_fragment_name(type_name),
        type_name,
        SelectionSet::new(vec![
            Selection::field("__typename"),
            Selection::field("entityId"),
            Selection::object("entityLanguage", vec![Selection::field("id")]),
        ]),
    )
}

/// An identity-only listing operation for one (type, language) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub entity_type_name: String,
    pub language: String,
    pub query_field_name: String,
    pub variable_names: Vec<String>,
    pub operation: OperationDefinition,
}

impl ListingQuery {
    pub fn operation_name(&self) -> &str {
        self.operation.name_str()
    }
}

/// Builds listing operations against a schema.
pub struct ListingSynthesizer<'a> {
    schema: &'a RemoteSchema,
    filters: Option<&'a IndexMap<String, Value>>,
}

impl<'a> ListingSynthesizer<'a> {
    pub fn new(schema: &'a RemoteSchema) -> Self {
        Self {
            schema,
            filters: None,
        }
    }

    /// Injects a `filter` argument for the types present in `filters`.
    #[must_use]
    pub fn with_filters(mut self, filters: &'a IndexMap<String, Value>) -> Self {
        self.filters = Some(filters);
        self
    }

    /// One listing query per language, in language order.
    pub fn build_listing_queries(
        &self,
        descriptor: &EntityTypeDescriptor,
        languages: &[String],
    ) -> Vec<ListingQuery> {
        languages
            .iter()
            .map(|language| self.build_one(descriptor, language))
            .collect()
    }

    fn build_one(&self, descriptor: &EntityTypeDescriptor, language: &str) -> ListingQuery {
        let type_name = &descriptor.remote_type_name;

        let entities = FieldSelection::new(ENTITIES_FIELD)
            .with_argument(LANGUAGE_ARGUMENT, Value::enum_value(language))
            .with_selection_set(SelectionSet::new(vec![Selection::spread(
                identity_fragment_name(type_name),
            )]));

        let mut root = FieldSelection::new(&descriptor.query_field_name)
            .with_argument(LIMIT_VARIABLE, Value::variable(LIMIT_VARIABLE))
            .with_argument(OFFSET_VARIABLE, Value::variable(OFFSET_VARIABLE));
        if let Some(filter) = self.filters.and_then(|f| f.get(type_name)) {
            root = root.with_argument(FILTER_ARGUMENT, filter.clone());
        }
        let root = root.with_selection_set(SelectionSet::new(vec![Selection::Field(entities)]));

        let mut operation = OperationDefinition::query(
            listing_operation_name(type_name, language),
            SelectionSet::new(vec![Selection::Field(root)]),
        );
        for variable in LISTING_VARIABLES {
            let ty = self.variable_type(&descriptor.query_field_name, variable);
            operation = operation.with_variable(variable, ty);
        }

        ListingQuery {
            entity_type_name: type_name.clone(),
            language: language.to_string(),
            query_field_name: descriptor.query_field_name.clone(),
            variable_names: LISTING_VARIABLES.iter().map(ToString::to_string).collect(),
            operation,
        }
    }

    /// Declared type of a query field argument, `Int` when undeclared.
    fn variable_type(&self, field_name: &str, argument: &str) -> Type {
        self.schema
            .query_field(field_name)
            .and_then(|field| field.arguments.get(argument))
            .map_or_else(|| Type::named("Int"), |arg| arg.ty.to_ast_type())
    }
}

/// Fails unless the adapter drives exactly the listing variables.
pub fn check_pagination_variables(adapter: &dyn PaginationAdapter) -> Result<(), SourcingError> {
    let mut found = adapter.expected_variable_names();
    found.sort();
    let mut expected: Vec<String> = LISTING_VARIABLES.iter().map(ToString::to_string).collect();
    expected.sort();

    if found == expected {
        Ok(())
    } else {
        Err(SourcingError::PaginationVariableMismatch {
            adapter: adapter.name().to_string(),
            expected,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::{LimitOffset, PaginationState};
    use crate::schema::{FieldDef, ObjectDef, SchemaBuilder, TypeRef};
    use gqlsrc_syntax::{format, parse_value, Document, Definition};

    fn schema() -> RemoteSchema {
        SchemaBuilder::new()
            .query_type("Query")
            .object(
                ObjectDef::new("Query").field(
                    FieldDef::new("articleQuery", TypeRef::named("EntityQueryResult"))
                        .argument("limit", TypeRef::non_null(TypeRef::named("Int")))
                        .argument("offset", TypeRef::named("Int")),
                ),
            )
            .build()
    }

    fn article() -> EntityTypeDescriptor {
        EntityTypeDescriptor {
            remote_type_name: "Article".into(),
            query_field_name: "articleQuery".into(),
            supported_languages: vec!["EN".into(), "ES".into()],
            is_interface: false,
        }
    }

    #[test]
    fn test_listing_query_shape() {
        let schema = schema();
        let languages = vec!["EN".to_string(), "ES".to_string()];
        let queries = ListingSynthesizer::new(&schema).build_listing_queries(&article(), &languages);

        assert_eq!(queries.len(), 2);
        assert_eq!(queries[1].operation_name(), "LIST_Article_ES");
        assert_eq!(queries[0].variable_names, vec!["limit", "offset"]);

        let doc = Document::new(vec![
            Definition::Operation(queries[0].operation.clone()),
            Definition::Fragment(identity_fragment("Article")),
        ]);
        assert_eq!(
            format(&doc),
            "query LIST_Article_EN($limit: Int!, $offset: Int) {
  articleQuery(limit: $limit, offset: $offset) {
    entities(language: EN) {
      ..._ArticleId_
    }
  }
}

fragment _ArticleId_ on Article {
  __typename
  entityId
  entityLanguage {
    id
  }
}"
        );
    }

    #[test]
    fn test_variable_type_defaults_to_int() {
        let schema = SchemaBuilder::new().build();
        let queries = ListingSynthesizer::new(&schema).build_listing_queries(&article(), &["EN".to_string()]);
        assert!(queries[0]
            .operation
            .variables
            .iter()
            .all(|v| v.ty == Type::named("Int")));
    }

    #[test]
    fn test_filter_injection() {
        let schema = schema();
        let mut filters = IndexMap::new();
        filters.insert(
            "Article".to_string(),
            parse_value(r#"{conditions: [{operator: EQUAL, field: "status", value: ["1"]}]}"#).unwrap(),
        );
        let queries = ListingSynthesizer::new(&schema)
            .with_filters(&filters)
            .build_listing_queries(&article(), &["EN".to_string()]);

        let Selection::Field(root) = &queries[0].operation.selection_set.selections[0] else {
            panic!("expected field");
        };
        assert!(root.argument("filter").is_some());
        // The identity contract is untouched.
        assert_eq!(
            queries[0].operation.selection_set.fragment_spreads(),
            vec!["_ArticleId_"]
        );
    }

    #[test]
    fn test_identity_fragment_fields() {
        let fragment = identity_fragment("NodePage");
        assert_eq!(fragment.name.value, "_NodePageId_");
        assert_eq!(fragment.selection_set.leaf_paths(), IDENTITY_FIELDS);
    }

    struct CursorAdapter;

    impl PaginationAdapter for CursorAdapter {
        fn name(&self) -> &str {
            "Cursor"
        }

        fn expected_variable_names(&self) -> Vec<String> {
            vec!["first".into(), "after".into()]
        }

        fn start(&self) -> PaginationState {
            PaginationState::default()
        }

        fn next(&self, state: &PaginationState, _page: &serde_json::Value) -> PaginationState {
            state.clone()
        }

        fn concat(&self, result: serde_json::Value, _page: serde_json::Value) -> serde_json::Value {
            result
        }

        fn get_items(&self, _page: &serde_json::Value) -> Vec<serde_json::Value> {
            Vec::new()
        }
    }

    #[test]
    fn test_pagination_variable_check() {
        assert!(check_pagination_variables(&LimitOffset::default()).is_ok());
        let err = check_pagination_variables(&CursorAdapter).unwrap_err();
        assert_eq!(err.code(), "PAGINATION_VARIABLE_MISMATCH");
        assert!(err.to_string().contains("Cursor"));
    }
}
