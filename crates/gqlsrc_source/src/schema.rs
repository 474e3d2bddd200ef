//! Remote schema model and introspection.

use crate::error::SourcingError;
use crate::executor::{ExecuteRequest, RemoteExecutor};
use gqlsrc_syntax::Type;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::info;

/// Operation name of [`INTROSPECTION_QUERY`].
pub const INTROSPECTION_OPERATION: &str = "IntrospectionQuery";

/// Introspection document sent once per run.
pub const INTROSPECTION_QUERY: &str = r"query IntrospectionQuery {
  __schema {
    queryType { name }
    types {
      kind
      name
      fields(includeDeprecated: true) {
        name
        args { name type { ...TypeRef } defaultValue }
        type { ...TypeRef }
      }
      inputFields { name type { ...TypeRef } defaultValue }
      interfaces { name }
      enumValues(includeDeprecated: true) { name }
      possibleTypes { name }
    }
  }
}

fragment TypeRef on __Type {
  kind
  name
  ofType {
    kind
    name
    ofType {
      kind
      name
      ofType {
        kind
        name
        ofType { kind name ofType { kind name ofType { kind name } } }
      }
    }
  }
}";

/// The introspected remote type system. Immutable once loaded.
#[derive(Debug, Clone, Default)]
pub struct RemoteSchema {
    pub query_type: Option<String>,
    pub types: IndexMap<String, TypeDef>,
}

impl RemoteSchema {
    /// Introspects the remote API.
    pub async fn load(executor: &dyn RemoteExecutor) -> Result<Self, SourcingError> {
        let request = ExecuteRequest::new(INTROSPECTION_QUERY, INTROSPECTION_OPERATION);
        let response = executor
            .execute(request)
            .await
            .map_err(|e| SourcingError::SchemaLoad(e.to_string()))?;

        let Some(schema) = response.data.as_ref().and_then(|data| data.get("__schema")) else {
            let reason = if response.errors.is_empty() {
                "response has no `__schema`".to_string()
            } else {
                response
                    .errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            return Err(SourcingError::SchemaLoad(reason));
        };

        let schema = Self::from_introspection(schema)?;
        info!(types = schema.types.len(), "loaded remote schema");
        Ok(schema)
    }

    /// Decodes the `__schema` object of an introspection result.
    pub fn from_introspection(value: &serde_json::Value) -> Result<Self, SourcingError> {
        let raw = IntrospectionSchema::deserialize(value)
            .map_err(|e| SourcingError::SchemaLoad(format!("invalid introspection result: {e}")))?;

        let mut types = IndexMap::with_capacity(raw.types.len());
        for ty in raw.types {
            let def = ty.into_type_def().map_err(SourcingError::SchemaLoad)?;
            types.insert(def.name().to_string(), def);
        }

        let query_type = raw
            .query_type
            .map(|t| t.name)
            .ok_or_else(|| SourcingError::SchemaLoad("introspection result has no `queryType`".to_string()))?;
        if !matches!(types.get(&query_type), Some(TypeDef::Object(_))) {
            return Err(SourcingError::SchemaLoad(format!(
                "query type `{query_type}` is not an object type of the schema"
            )));
        }

        Ok(Self {
            query_type: Some(query_type),
            types,
        })
    }

    /// Gets a type by name.
    pub fn type_by_name(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Fields of the query root, in schema order.
    pub fn query_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.query_type
            .as_deref()
            .and_then(|name| self.types.get(name))
            .and_then(TypeDef::fields)
            .into_iter()
            .flat_map(|fields| fields.values())
    }

    /// Finds a query root field by name.
    pub fn query_field(&self, name: &str) -> Option<&FieldDef> {
        self.query_fields().find(|f| f.name == name)
    }

    /// Concrete object types behind an interface or union, in schema order.
    ///
    /// Interfaces that were introspected without `possibleTypes` fall back
    /// to scanning object `interfaces`.
    pub fn implementors_of(&self, name: &str) -> Vec<&str> {
        match self.types.get(name) {
            Some(TypeDef::Interface(iface)) if !iface.possible_types.is_empty() => {
                iface.possible_types.iter().map(String::as_str).collect()
            }
            Some(TypeDef::Interface(_)) => self
                .types
                .values()
                .filter_map(|t| match t {
                    TypeDef::Object(obj) if obj.implements.iter().any(|i| i == name) => {
                        Some(obj.name.as_str())
                    }
                    _ => None,
                })
                .collect(),
            Some(TypeDef::Union(u)) => u.members.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

/// A type definition.
#[derive(Debug, Clone)]
pub enum TypeDef {
    Scalar(ScalarDef),
    Object(ObjectDef),
    Interface(InterfaceDef),
    Union(UnionDef),
    Enum(EnumDef),
    InputObject(InputObjectDef),
}

impl TypeDef {
    pub fn name(&self) -> &str {
        match self {
            Self::Scalar(s) => &s.name,
            Self::Object(o) => &o.name,
            Self::Interface(i) => &i.name,
            Self::Union(u) => &u.name,
            Self::Enum(e) => &e.name,
            Self::InputObject(i) => &i.name,
        }
    }

    /// Output fields of objects and interfaces.
    pub fn fields(&self) -> Option<&IndexMap<String, FieldDef>> {
        match self {
            Self::Object(o) => Some(&o.fields),
            Self::Interface(i) => Some(&i.fields),
            _ => None,
        }
    }

    /// Interfaces and unions.
    pub fn is_abstract(&self) -> bool {
        matches!(self, Self::Interface(_) | Self::Union(_))
    }

    /// Scalars and enums.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Enum(_))
    }
}

/// Scalar type definition.
#[derive(Debug, Clone)]
pub struct ScalarDef {
    pub name: String,
}

/// Object type definition.
#[derive(Debug, Clone)]
pub struct ObjectDef {
    pub name: String,
    pub fields: IndexMap<String, FieldDef>,
    pub implements: Vec<String>,
}

impl ObjectDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            implements: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    #[must_use]
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }
}

/// Interface type definition.
#[derive(Debug, Clone)]
pub struct InterfaceDef {
    pub name: String,
    pub fields: IndexMap<String, FieldDef>,
    pub possible_types: Vec<String>,
}

impl InterfaceDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            possible_types: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    #[must_use]
    pub fn possible_type(mut self, name: impl Into<String>) -> Self {
        self.possible_types.push(name.into());
        self
    }
}

/// Union type definition.
#[derive(Debug, Clone)]
pub struct UnionDef {
    pub name: String,
    pub members: Vec<String>,
}

/// Enum type definition.
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<String>,
}

/// Input object type definition.
#[derive(Debug, Clone)]
pub struct InputObjectDef {
    pub name: String,
    pub fields: IndexMap<String, InputFieldDef>,
}

/// Field definition.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
    pub arguments: IndexMap<String, InputFieldDef>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            arguments: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn argument(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        let name = name.into();
        self.arguments.insert(
            name.clone(),
            InputFieldDef {
                name,
                ty,
                default_value: None,
            },
        );
        self
    }

    /// True if some argument is non-null and has no default.
    pub fn has_required_arguments(&self) -> bool {
        self.arguments
            .values()
            .any(|arg| arg.ty.is_non_null() && arg.default_value.is_none())
    }
}

/// Input field or argument definition.
#[derive(Debug, Clone)]
pub struct InputFieldDef {
    pub name: String,
    pub ty: TypeRef,
    pub default_value: Option<String>,
}

/// Type reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(String),
    NonNull(Box<TypeRef>),
    List(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn non_null(inner: TypeRef) -> Self {
        Self::NonNull(Box::new(inner))
    }

    pub fn list(inner: TypeRef) -> Self {
        Self::List(Box::new(inner))
    }

    /// The innermost named type.
    pub fn named_type(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::NonNull(inner) | Self::List(inner) => inner.named_type(),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    /// Converts to a variable type usable in an operation.
    pub fn to_ast_type(&self) -> Type {
        match self {
            Self::Named(name) => Type::named(name.as_str()),
            Self::NonNull(inner) => Type::non_null(inner.to_ast_type()),
            Self::List(inner) => Type::list(inner.to_ast_type()),
        }
    }
}

/// Schema builder.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    schema: RemoteSchema,
}

impl SchemaBuilder {
    /// Creates a new schema builder with the built-in scalars.
    pub fn new() -> Self {
        let mut builder = Self::default();
        for name in ["Int", "Float", "String", "Boolean", "ID"] {
            builder.schema.types.insert(
                name.to_string(),
                TypeDef::Scalar(ScalarDef {
                    name: name.to_string(),
                }),
            );
        }
        builder
    }

    /// Sets the query type.
    #[must_use]
    pub fn query_type(mut self, name: impl Into<String>) -> Self {
        self.schema.query_type = Some(name.into());
        self
    }

    /// Adds a type.
    #[must_use]
    pub fn add_type(mut self, type_def: TypeDef) -> Self {
        self.schema
            .types
            .insert(type_def.name().to_string(), type_def);
        self
    }

    #[must_use]
    pub fn object(self, object: ObjectDef) -> Self {
        self.add_type(TypeDef::Object(object))
    }

    #[must_use]
    pub fn interface(self, interface: InterfaceDef) -> Self {
        self.add_type(TypeDef::Interface(interface))
    }

    #[must_use]
    pub fn scalar(self, name: impl Into<String>) -> Self {
        self.add_type(TypeDef::Scalar(ScalarDef { name: name.into() }))
    }

    #[must_use]
    pub fn enumeration<I, S>(self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_type(TypeDef::Enum(EnumDef {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }))
    }

    #[must_use]
    pub fn union<I, S>(self, name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_type(TypeDef::Union(UnionDef {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }))
    }

    /// Builds the schema.
    pub fn build(self) -> RemoteSchema {
        self.schema
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntrospectionSchema {
    query_type: Option<NamedRef>,
    types: Vec<IntrospectionType>,
}

#[derive(Deserialize)]
struct NamedRef {
    name: String,
}

#[derive(Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntrospectionType {
    kind: TypeKind,
    name: String,
    #[serde(default)]
    fields: Option<Vec<IntrospectionField>>,
    #[serde(default)]
    input_fields: Option<Vec<IntrospectionInputValue>>,
    #[serde(default)]
    interfaces: Option<Vec<NamedRef>>,
    #[serde(default)]
    enum_values: Option<Vec<NamedRef>>,
    #[serde(default)]
    possible_types: Option<Vec<NamedRef>>,
}

#[derive(Deserialize)]
struct IntrospectionField {
    name: String,
    #[serde(default)]
    args: Vec<IntrospectionInputValue>,
    #[serde(rename = "type")]
    ty: IntrospectionTypeRef,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntrospectionInputValue {
    name: String,
    #[serde(rename = "type")]
    ty: IntrospectionTypeRef,
    #[serde(default)]
    default_value: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntrospectionTypeRef {
    kind: TypeKind,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    of_type: Option<Box<IntrospectionTypeRef>>,
}

impl IntrospectionTypeRef {
    fn into_type_ref(self) -> Result<TypeRef, String> {
        match self.kind {
            TypeKind::NonNull | TypeKind::List => {
                let inner = self
                    .of_type
                    .ok_or_else(|| format!("{:?} type reference without `ofType`", self.kind))?
                    .into_type_ref()?;
                Ok(if self.kind == TypeKind::List {
                    TypeRef::list(inner)
                } else {
                    TypeRef::non_null(inner)
                })
            }
            _ => self
                .name
                .map(TypeRef::Named)
                .ok_or_else(|| "named type reference without `name`".to_string()),
        }
    }
}

fn convert_input_values(
    values: Vec<IntrospectionInputValue>,
) -> Result<IndexMap<String, InputFieldDef>, String> {
    values
        .into_iter()
        .map(|v| {
            Ok((
                v.name.clone(),
                InputFieldDef {
                    name: v.name,
                    ty: v.ty.into_type_ref()?,
                    default_value: v.default_value,
                },
            ))
        })
        .collect()
}

fn convert_fields(fields: Vec<IntrospectionField>) -> Result<IndexMap<String, FieldDef>, String> {
    fields
        .into_iter()
        .map(|f| {
            Ok((
                f.name.clone(),
                FieldDef {
                    name: f.name,
                    ty: f.ty.into_type_ref()?,
                    arguments: convert_input_values(f.args)?,
                },
            ))
        })
        .collect()
}

fn names(refs: Option<Vec<NamedRef>>) -> Vec<String> {
    refs.unwrap_or_default().into_iter().map(|r| r.name).collect()
}

impl IntrospectionType {
    fn into_type_def(self) -> Result<TypeDef, String> {
        let name = self.name;
        Ok(match self.kind {
            TypeKind::Scalar => TypeDef::Scalar(ScalarDef { name }),
            TypeKind::Object => TypeDef::Object(ObjectDef {
                fields: convert_fields(self.fields.unwrap_or_default())?,
                implements: names(self.interfaces),
                name,
            }),
            TypeKind::Interface => TypeDef::Interface(InterfaceDef {
                fields: convert_fields(self.fields.unwrap_or_default())?,
                possible_types: names(self.possible_types),
                name,
            }),
            TypeKind::Union => TypeDef::Union(UnionDef {
                members: names(self.possible_types),
                name,
            }),
            TypeKind::Enum => TypeDef::Enum(EnumDef {
                values: names(self.enum_values),
                name,
            }),
            TypeKind::InputObject => TypeDef::InputObject(InputObjectDef {
                fields: convert_input_values(self.input_fields.unwrap_or_default())?,
                name,
            }),
            TypeKind::List | TypeKind::NonNull => {
                return Err(format!("type `{name}` has wrapper kind {:?}", self.kind))
            }
        })
    }
}
