//! Printing of executable documents.
//!
//! The output follows the conventional GraphQL layout: one selection per
//! line, two-space indentation, definitions separated by a blank line.

use crate::ast::*;
use std::fmt::Write as _;

/// Formatting options.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// Number of spaces for indentation.
    pub indent_size: usize,
    /// Use tabs instead of spaces.
    pub use_tabs: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            indent_size: 2,
            use_tabs: false,
        }
    }
}

/// Document printer.
pub struct Formatter {
    options: FormatOptions,
    output: String,
    indent: usize,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(options: FormatOptions) -> Self {
        Self {
            options,
            output: String::new(),
            indent: 0,
        }
    }

    /// Formats a document.
    pub fn format(&mut self, document: &Document) -> String {
        self.output.clear();
        self.indent = 0;

        for (i, def) in document.definitions.iter().enumerate() {
            if i > 0 {
                self.output.push_str("\n\n");
            }
            match def {
                Definition::Operation(op) => self.format_operation(op),
                Definition::Fragment(frag) => self.format_fragment(frag),
            }
        }

        std::mem::take(&mut self.output)
    }

    fn format_operation(&mut self, op: &OperationDefinition) {
        let anonymous_query = op.operation == OperationType::Query
            && op.name.is_none()
            && op.variables.is_empty()
            && op.directives.is_empty();

        if !anonymous_query {
            self.output.push_str(op.operation.as_str());
            if let Some(name) = &op.name {
                self.output.push(' ');
                self.output.push_str(&name.value);
            }
            if !op.variables.is_empty() {
                self.output.push('(');
                for (i, var) in op.variables.iter().enumerate() {
                    if i > 0 {
                        self.output.push_str(", ");
                    }
                    self.output.push('$');
                    self.output.push_str(&var.name.value);
                    self.output.push_str(": ");
                    self.format_type(&var.ty);
                    if let Some(default) = &var.default_value {
                        self.output.push_str(" = ");
                        self.format_value(default);
                    }
                }
                self.output.push(')');
            }
            self.format_directives(&op.directives);
            self.output.push(' ');
        }

        self.format_selection_set(&op.selection_set);
    }

    fn format_fragment(&mut self, frag: &FragmentDefinition) {
        self.output.push_str("fragment ");
        self.output.push_str(&frag.name.value);
        self.output.push_str(" on ");
        self.output.push_str(&frag.type_condition.value);
        self.format_directives(&frag.directives);
        self.output.push(' ');
        self.format_selection_set(&frag.selection_set);
    }

    fn format_selection_set(&mut self, set: &SelectionSet) {
        self.output.push('{');
        self.indent += 1;

        for selection in &set.selections {
            self.output.push('\n');
            self.push_indent();
            self.format_selection(selection);
        }

        self.indent -= 1;
        self.output.push('\n');
        self.push_indent();
        self.output.push('}');
    }

    fn format_selection(&mut self, selection: &Selection) {
        match selection {
            Selection::Field(field) => {
                if let Some(alias) = &field.alias {
                    self.output.push_str(&alias.value);
                    self.output.push_str(": ");
                }
                self.output.push_str(&field.name.value);
                self.format_arguments(&field.arguments);
                self.format_directives(&field.directives);
                if let Some(set) = &field.selection_set {
                    self.output.push(' ');
                    self.format_selection_set(set);
                }
            }
            Selection::FragmentSpread(spread) => {
                self.output.push_str("...");
                self.output.push_str(&spread.name.value);
                self.format_directives(&spread.directives);
            }
            Selection::InlineFragment(inline) => {
                self.output.push_str("...");
                if let Some(tc) = &inline.type_condition {
                    self.output.push_str(" on ");
                    self.output.push_str(&tc.value);
                }
                self.format_directives(&inline.directives);
                self.output.push(' ');
                self.format_selection_set(&inline.selection_set);
            }
        }
    }

    fn format_arguments(&mut self, arguments: &[Argument]) {
        if arguments.is_empty() {
            return;
        }
        self.output.push('(');
        for (i, arg) in arguments.iter().enumerate() {
            if i > 0 {
                self.output.push_str(", ");
            }
            self.output.push_str(&arg.name.value);
            self.output.push_str(": ");
            self.format_value(&arg.value);
        }
        self.output.push(')');
    }

    fn format_directives(&mut self, directives: &[Directive]) {
        for directive in directives {
            self.output.push_str(" @");
            self.output.push_str(&directive.name.value);
            self.format_arguments(&directive.arguments);
        }
    }

    fn format_type(&mut self, ty: &Type) {
        match ty {
            Type::Named(name) => self.output.push_str(&name.value),
            Type::List(inner) => {
                self.output.push('[');
                self.format_type(inner);
                self.output.push(']');
            }
            Type::NonNull(inner) => {
                self.format_type(inner);
                self.output.push('!');
            }
        }
    }

    fn format_value(&mut self, value: &Value) {
        match value {
            Value::Variable(name) => {
                self.output.push('$');
                self.output.push_str(&name.value);
            }
            Value::Int(n) => {
                let _ = write!(self.output, "{n}");
            }
            Value::Float(f) => {
                // Debug output always keeps a fractional part or exponent.
                let _ = write!(self.output, "{f:?}");
            }
            Value::String(s) => self.format_string(s),
            Value::Boolean(b) => self.output.push_str(if *b { "true" } else { "false" }),
            Value::Null => self.output.push_str("null"),
            Value::Enum(name) => self.output.push_str(&name.value),
            Value::List(items) => {
                self.output.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.output.push_str(", ");
                    }
                    self.format_value(item);
                }
                self.output.push(']');
            }
            Value::Object(fields) => {
                self.output.push('{');
                for (i, (name, field_value)) in fields.iter().enumerate() {
                    if i > 0 {
                        self.output.push_str(", ");
                    }
                    self.output.push_str(&name.value);
                    self.output.push_str(": ");
                    self.format_value(field_value);
                }
                self.output.push('}');
            }
        }
    }

    fn format_string(&mut self, s: &str) {
        self.output.push('"');
        for c in s.chars() {
            match c {
                '"' => self.output.push_str("\\\""),
                '\\' => self.output.push_str("\\\\"),
                '\n' => self.output.push_str("\\n"),
                '\r' => self.output.push_str("\\r"),
                '\t' => self.output.push_str("\\t"),
                c if c.is_control() => {
                    let _ = write!(self.output, "\\u{:04X}", u32::from(c));
                }
                c => self.output.push(c),
            }
        }
        self.output.push('"');
    }

    fn push_indent(&mut self) {
        if self.options.use_tabs {
            for _ in 0..self.indent {
                self.output.push('\t');
            }
        } else {
            for _ in 0..(self.indent * self.options.indent_size) {
                self.output.push(' ');
            }
        }
    }
}

/// Formats a document with default options.
pub fn format(document: &Document) -> String {
    let mut formatter = Formatter::new(FormatOptions::default());
    formatter.format(document)
}

/// Formats a document with custom options.
pub fn format_with_options(document: &Document, options: FormatOptions) -> String {
    let mut formatter = Formatter::new(options);
    formatter.format(document)
}

/// Formats a single input value, e.g. for log output.
pub fn format_value(value: &Value) -> String {
    let mut formatter = Formatter::new(FormatOptions::default());
    formatter.format_value(value);
    formatter.output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, parse_value};

    #[test]
    fn test_format_listing_document() {
        let source = "query LIST_Article_EN($limit:Int $offset:Int){articleQuery(limit:$limit offset:$offset){entities(language:EN){..._ArticleId_}}} fragment _ArticleId_ on Article{__typename entityId entityLanguage{id}}";
        let doc = parse(source).into_result().unwrap();
        insta::assert_snapshot!(format(&doc), @r###"
        query LIST_Article_EN($limit: Int, $offset: Int) {
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
        }
        "###);
    }

    #[test]
    fn test_format_inline_fragment_and_directives() {
        let doc = parse("fragment N on Node { __typename ...on Article @skip(if: false) { t: title } }")
            .into_result()
            .unwrap();
        assert_eq!(
            format(&doc),
            "fragment N on Node {\n  __typename\n  ... on Article @skip(if: false) {\n    t: title\n  }\n}"
        );
    }

    #[test]
    fn test_anonymous_query() {
        let doc = parse("{ a }").into_result().unwrap();
        assert_eq!(format(&doc), "{\n  a\n}");
    }

    #[test]
    fn test_format_values() {
        let value = parse_value(r#"{s: "a\"b", l: [1, 2.0, null], o: {x: ENUM}, v: $var}"#).unwrap();
        assert_eq!(
            format_value(&value),
            r#"{s: "a\"b", l: [1, 2.0, null], o: {x: ENUM}, v: $var}"#
        );
    }

    #[test]
    fn test_formatted_output_reparses_identically() {
        let source = "query Q($ids: [ID!]! = [\"1\"]) { node(ids: $ids) { ... on A { x } ...B } } fragment B on B { y }";
        let first = format(&parse(source).into_result().unwrap());
        let second = format(&parse(&first).into_result().unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn test_tabs() {
        let doc = parse("fragment A on A { id }").into_result().unwrap();
        let options = FormatOptions {
            indent_size: 4,
            use_tabs: true,
        };
        assert_eq!(
            format_with_options(&doc, options),
            "fragment A on A {\n\tid\n}"
        );
    }
}
