//! Discovery of remote entity types.
//!
//! A query root field `fooQuery` returning `EntityQueryResult` exposes the
//! paginated collection of type `Foo`. Abstract types are expanded to their
//! concrete implementors.

use crate::schema::{RemoteSchema, TypeDef, TypeRef};
use rustc_hash::FxHashSet;
use tracing::debug;

/// Return type name of paginated entity query fields.
pub const ENTITY_QUERY_RESULT: &str = "EntityQueryResult";

const QUERY_FIELD_SUFFIX: &str = "Query";

/// A concrete remote type to source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTypeDescriptor {
    pub remote_type_name: String,
    pub query_field_name: String,
    pub supported_languages: Vec<String>,
    /// True when the query field returns an abstract type, so that a page
    /// may carry entities of sibling types.
    pub is_interface: bool,
}

/// Finds every entity type exposed by the query root.
///
/// Descriptors follow query field order. A concrete type reachable through
/// several query fields keeps the first one.
pub fn find_entity_types(schema: &RemoteSchema, languages: &[String]) -> Vec<EntityTypeDescriptor> {
    let mut seen = FxHashSet::default();
    let mut descriptors = Vec::new();

    for field in schema.query_fields() {
        let Some(prefix) = field
            .name
            .strip_suffix(QUERY_FIELD_SUFFIX)
            .filter(|p| !p.is_empty())
        else {
            continue;
        };
        if !matches!(&field.ty, TypeRef::Named(name) if name == ENTITY_QUERY_RESULT) {
            continue;
        }

        let candidate = upper_first(prefix);
        let (type_names, is_interface) = match schema.type_by_name(&candidate) {
            Some(TypeDef::Object(obj)) => (vec![obj.name.as_str()], false),
            Some(def) if def.is_abstract() => (schema.implementors_of(&candidate), true),
            Some(_) | None => {
                debug!(field = %field.name, "no entity type named `{candidate}`");
                continue;
            }
        };

        for type_name in type_names {
            if !seen.insert(type_name) {
                debug!(field = %field.name, "`{type_name}` is already sourced");
                continue;
            }
            descriptors.push(EntityTypeDescriptor {
                remote_type_name: type_name.to_string(),
                query_field_name: field.name.clone(),
                supported_languages: languages.to_vec(),
                is_interface,
            });
        }
    }

    descriptors
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, InterfaceDef, ObjectDef, SchemaBuilder};

    fn query_field(name: &str, ty: &str) -> FieldDef {
        FieldDef::new(name, TypeRef::named(ty))
    }

    fn languages() -> Vec<String> {
        vec!["EN".to_string(), "ES".to_string()]
    }

    #[test]
    fn test_object_query_field() {
        let schema = SchemaBuilder::new()
            .query_type("Query")
            .object(ObjectDef::new("Query").field(query_field("userQuery", ENTITY_QUERY_RESULT)))
            .object(ObjectDef::new("User"))
            .build();

        let found = find_entity_types(&schema, &languages());
        assert_eq!(
            found,
            vec![EntityTypeDescriptor {
                remote_type_name: "User".into(),
                query_field_name: "userQuery".into(),
                supported_languages: languages(),
                is_interface: false,
            }]
        );
    }

    #[test]
    fn test_unrelated_fields_are_skipped() {
        let schema = SchemaBuilder::new()
            .query_type("Query")
            .object(
                ObjectDef::new("Query")
                    .field(query_field("Query", ENTITY_QUERY_RESULT))
                    .field(query_field("searchQuery", ENTITY_QUERY_RESULT))
                    .field(query_field("userQuery", "User"))
                    .field(query_field("route", "Route"))
                    .field(FieldDef::new(
                        "fileQuery",
                        TypeRef::non_null(TypeRef::named(ENTITY_QUERY_RESULT)),
                    )),
            )
            .object(ObjectDef::new("User"))
            .object(ObjectDef::new("File"))
            .build();

        assert!(find_entity_types(&schema, &languages()).is_empty());
    }

    #[test]
    fn test_interface_is_expanded() {
        let schema = SchemaBuilder::new()
            .query_type("Query")
            .object(ObjectDef::new("Query").field(query_field("nodeQuery", ENTITY_QUERY_RESULT)))
            .interface(
                InterfaceDef::new("Node")
                    .possible_type("NodeArticle")
                    .possible_type("NodePage"),
            )
            .object(ObjectDef::new("NodeArticle").implements("Node"))
            .object(ObjectDef::new("NodePage").implements("Node"))
            .build();

        let found = find_entity_types(&schema, &languages());
        let names: Vec<_> = found.iter().map(|d| d.remote_type_name.as_str()).collect();
        assert_eq!(names, vec!["NodeArticle", "NodePage"]);
        assert!(found.iter().all(|d| d.is_interface && d.query_field_name == "nodeQuery"));
    }

    #[test]
    fn test_duplicates_keep_first_field() {
        let schema = SchemaBuilder::new()
            .query_type("Query")
            .object(
                ObjectDef::new("Query")
                    .field(query_field("nodeQuery", ENTITY_QUERY_RESULT))
                    .field(query_field("nodeArticleQuery", ENTITY_QUERY_RESULT)),
            )
            .interface(InterfaceDef::new("Node").possible_type("NodeArticle"))
            .object(ObjectDef::new("NodeArticle"))
            .build();

        let found = find_entity_types(&schema, &languages());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].query_field_name, "nodeQuery");
    }

    #[test]
    fn test_upper_first() {
        assert_eq!(upper_first("taxonomyTerm"), "TaxonomyTerm");
        assert_eq!(upper_first("ébauche"), "Ébauche");
        assert_eq!(upper_first(""), "");
    }
}
