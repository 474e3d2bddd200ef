//! Abstract syntax tree for executable GraphQL documents.
//!
//! Nodes own their strings so that documents can be assembled from several
//! sources (synthesized operations, cached fragment files) and printed as one.

use gqlsrc_core::Span;

/// A complete document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub definitions: Vec<Definition>,
    pub span: Span,
}

impl Document {
    /// Creates a document from definitions.
    pub fn new(definitions: Vec<Definition>) -> Self {
        Self {
            definitions,
            span: Span::synthetic(),
        }
    }

    /// Returns all operation definitions.
    pub fn operations(&self) -> impl Iterator<Item = &OperationDefinition> {
        self.definitions.iter().filter_map(|d| match d {
            Definition::Operation(op) => Some(op),
            Definition::Fragment(_) => None,
        })
    }

    /// Returns all fragment definitions.
    pub fn fragments(&self) -> impl Iterator<Item = &FragmentDefinition> {
        self.definitions.iter().filter_map(|d| match d {
            Definition::Fragment(f) => Some(f),
            Definition::Operation(_) => None,
        })
    }

    /// Finds a fragment by name.
    pub fn fragment(&self, name: &str) -> Option<&FragmentDefinition> {
        self.fragments().find(|f| f.name.value == name)
    }

    /// Finds an operation by name.
    pub fn operation(&self, name: &str) -> Option<&OperationDefinition> {
        self.operations()
            .find(|op| op.name.as_ref().is_some_and(|n| n.value == name))
    }
}

/// A top-level definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Operation(OperationDefinition),
    Fragment(FragmentDefinition),
}

/// Type of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl OperationType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

/// Operation definition.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDefinition {
    pub operation: OperationType,
    pub name: Option<Name>,
    pub variables: Vec<VariableDefinition>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub span: Span,
}

impl OperationDefinition {
    /// Creates a named query.
    pub fn query(name: impl Into<String>, selection_set: SelectionSet) -> Self {
        Self {
            operation: OperationType::Query,
            name: Some(Name::new(name)),
            variables: Vec::new(),
            directives: Vec::new(),
            selection_set,
            span: Span::synthetic(),
        }
    }

    /// Adds a variable definition.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.variables.push(VariableDefinition {
            name: Name::new(name),
            ty,
            default_value: None,
            span: Span::synthetic(),
        });
        self
    }

    /// Returns the operation name, or an empty string when anonymous.
    pub fn name_str(&self) -> &str {
        self.name.as_ref().map_or("", |n| n.value.as_str())
    }
}

/// Variable definition.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: Name,
    pub ty: Type,
    pub default_value: Option<Value>,
    pub span: Span,
}

/// Fragment definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentDefinition {
    pub name: Name,
    pub type_condition: Name,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub span: Span,
}

impl FragmentDefinition {
    /// Creates a fragment on a type.
    pub fn new(
        name: impl Into<String>,
        type_condition: impl Into<String>,
        selection_set: SelectionSet,
    ) -> Self {
        Self {
            name: Name::new(name),
            type_condition: Name::new(type_condition),
            directives: Vec::new(),
            selection_set,
            span: Span::synthetic(),
        }
    }
}

/// Selection set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionSet {
    pub selections: Vec<Selection>,
    pub span: Span,
}

impl SelectionSet {
    /// Creates a selection set.
    pub fn new(selections: Vec<Selection>) -> Self {
        Self {
            selections,
            span: Span::synthetic(),
        }
    }

    /// Returns true if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// Appends a selection.
    pub fn push(&mut self, selection: Selection) {
        self.selections.push(selection);
    }

    /// Collects the names of all fragment spreads, depth first, without duplicates.
    pub fn fragment_spreads(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_spreads(&mut out);
        out
    }

    fn collect_spreads<'s>(&'s self, out: &mut Vec<&'s str>) {
        for selection in &self.selections {
            match selection {
                Selection::Field(field) => {
                    if let Some(set) = &field.selection_set {
                        set.collect_spreads(out);
                    }
                }
                Selection::FragmentSpread(spread) => {
                    if !out.contains(&spread.name.value.as_str()) {
                        out.push(&spread.name.value);
                    }
                }
                Selection::InlineFragment(inline) => inline.selection_set.collect_spreads(out),
            }
        }
    }

    /// Returns dotted paths of every leaf field, e.g. `entityLanguage.id`.
    ///
    /// Spreads and inline fragments are not followed.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_leaf_paths("", &mut out);
        out
    }

    fn collect_leaf_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for selection in &self.selections {
            if let Selection::Field(field) = selection {
                let path = if prefix.is_empty() {
                    field.response_key().to_string()
                } else {
                    format!("{prefix}.{}", field.response_key())
                };
                match &field.selection_set {
                    Some(set) => set.collect_leaf_paths(&path, out),
                    None => out.push(path),
                }
            }
        }
    }

    /// Finds the first field with the given response key, searching depth first.
    pub fn find_field_mut(&mut self, key: &str) -> Option<&mut FieldSelection> {
        for selection in &mut self.selections {
            if let Selection::Field(field) = selection {
                if field.response_key() == key {
                    return Some(field);
                }
                if let Some(set) = &mut field.selection_set {
                    if let Some(found) = set.find_field_mut(key) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }
}

/// Selection.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(FieldSelection),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

impl Selection {
    /// A leaf field selection.
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(FieldSelection::new(name))
    }

    /// A field selection with a nested selection set.
    pub fn object(name: impl Into<String>, selections: Vec<Selection>) -> Self {
        Self::Field(FieldSelection::new(name).with_selection_set(SelectionSet::new(selections)))
    }

    /// A fragment spread `...name`.
    pub fn spread(name: impl Into<String>) -> Self {
        Self::FragmentSpread(FragmentSpread {
            name: Name::new(name),
            directives: Vec::new(),
            span: Span::synthetic(),
        })
    }

    /// An inline fragment `... on Type { ... }`.
    pub fn inline(type_condition: impl Into<String>, selections: Vec<Selection>) -> Self {
        Self::InlineFragment(InlineFragment {
            type_condition: Some(Name::new(type_condition)),
            directives: Vec::new(),
            selection_set: SelectionSet::new(selections),
            span: Span::synthetic(),
        })
    }
}

/// Field selection.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSelection {
    pub alias: Option<Name>,
    pub name: Name,
    pub arguments: Vec<Argument>,
    pub directives: Vec<Directive>,
    pub selection_set: Option<SelectionSet>,
    pub span: Span,
}

impl FieldSelection {
    /// Creates a field selection without arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            alias: None,
            name: Name::new(name),
            arguments: Vec::new(),
            directives: Vec::new(),
            selection_set: None,
            span: Span::synthetic(),
        }
    }

    /// Adds an argument.
    #[must_use]
    pub fn with_argument(mut self, name: impl Into<String>, value: Value) -> Self {
        self.arguments.push(Argument::new(name, value));
        self
    }

    /// Sets the nested selection set.
    #[must_use]
    pub fn with_selection_set(mut self, selection_set: SelectionSet) -> Self {
        self.selection_set = Some(selection_set);
        self
    }

    /// The key this field occupies in the response (alias or name).
    pub fn response_key(&self) -> &str {
        self.alias.as_ref().map_or(&self.name.value, |a| &a.value)
    }

    /// Finds an argument by name.
    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.name.value == name)
    }
}

/// Fragment spread.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSpread {
    pub name: Name,
    pub directives: Vec<Directive>,
    pub span: Span,
}

/// Inline fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragment {
    pub type_condition: Option<Name>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub span: Span,
}

/// Directive usage.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: Name,
    pub arguments: Vec<Argument>,
    pub span: Span,
}

/// Argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Name,
    pub value: Value,
    pub span: Span,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: Name::new(name),
            value,
            span: Span::synthetic(),
        }
    }
}

/// Input value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Variable(Name),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Enum(Name),
    List(Vec<Value>),
    Object(Vec<(Name, Value)>),
}

impl Value {
    /// A `$name` variable reference.
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(Name::new(name))
    }

    /// A bare enum value such as `EN`.
    pub fn enum_value(name: impl Into<String>) -> Self {
        Self::Enum(Name::new(name))
    }

    /// First variable referenced anywhere in the value, if any.
    pub fn find_variable(&self) -> Option<&Name> {
        match self {
            Self::Variable(name) => Some(name),
            Self::List(items) => items.iter().find_map(Value::find_variable),
            Self::Object(fields) => fields.iter().find_map(|(_, v)| v.find_variable()),
            _ => None,
        }
    }
}

/// Type reference in a variable definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// Named type: `Int`
    Named(Name),
    /// List type: `[String]`
    List(Box<Type>),
    /// Non-null type: `Int!`
    NonNull(Box<Type>),
}

impl Type {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(Name::new(name))
    }

    pub fn list(inner: Type) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn non_null(inner: Type) -> Self {
        Self::NonNull(Box::new(inner))
    }
}

/// Name with span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub value: String,
    pub span: Span,
}

impl Name {
    /// Creates a name that was not parsed from source.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            span: Span::synthetic(),
        }
    }

    /// Creates a name with its source location.
    pub fn spanned(value: impl Into<String>, span: Span) -> Self {
        Self {
            value: value.into(),
            span,
        }
    }
}

/// Returns true if `s` is a valid GraphQL name (`/[_A-Za-z][_0-9A-Za-z]*/`).
pub fn is_valid_name(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(first) if first == b'_' || first.is_ascii_alphabetic() => {
            bytes.all(|b| b == b'_' || b.is_ascii_alphanumeric())
        }
        _ => false,
    }
}
