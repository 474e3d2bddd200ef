//! Recursive descent parser for executable GraphQL documents.
//!
//! Only operations and fragments are accepted. Type system definitions are
//! reported and skipped so that a single stray `type` block does not hide
//! errors further down the file.

use crate::ast::*;
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};
use gqlsrc_core::{diagnostics::codes, DiagnosticBag, Span};

/// Parser for executable GraphQL.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    prev_end: u32,
    diagnostics: DiagnosticBag,
}

/// Result of parsing.
#[derive(Debug)]
pub struct ParseResult {
    pub document: Document,
    pub diagnostics: DiagnosticBag,
}

impl ParseResult {
    /// Returns true if parsing reported any error.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    /// Returns the document, or the diagnostics if there were errors.
    pub fn into_result(self) -> Result<Document, DiagnosticBag> {
        if self.diagnostics.has_errors() {
            Err(self.diagnostics)
        } else {
            Ok(self.document)
        }
    }
}

/// Parses a source string into a document.
pub fn parse(source: &str) -> ParseResult {
    let mut parser = Parser::new(source);
    let document = parser.parse_document();
    ParseResult {
        document,
        diagnostics: parser.diagnostics,
    }
}

/// Parses a single input value literal such as `{status: true}`.
pub fn parse_value(source: &str) -> Result<Value, DiagnosticBag> {
    let mut parser = Parser::new(source);
    let value = parser.parse_value();
    if !parser.at_kind(TokenKind::Eof) {
        parser.error_unexpected("end of input");
    }
    match value {
        Some(value) if !parser.diagnostics.has_errors() => Ok(value),
        _ => Err(parser.diagnostics),
    }
}

impl<'a> Parser<'a> {
    /// Creates a new parser.
    pub fn new(source: &'a str) -> Self {
        let mut parser = Self {
            lexer: Lexer::new(source),
            current: Token::new(TokenKind::Eof, Span::default()),
            prev_end: 0,
            diagnostics: DiagnosticBag::new(),
        };
        parser.bump_token();
        parser
    }

    #[inline]
    fn at(&self) -> TokenKind {
        self.current.kind
    }

    #[inline]
    fn at_kind(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    /// Advances to the next token.
    fn advance(&mut self) {
        self.prev_end = self.current.span.end;
        self.bump_token();
    }

    /// Reads the next non-error token, reporting lexical errors on the way.
    fn bump_token(&mut self) {
        loop {
            self.current = self.lexer.next_token();
            if self.current.kind != TokenKind::Error {
                return;
            }
            let text = self.current_text();
            let message = if text.starts_with('"') {
                "unterminated string".to_string()
            } else if text.starts_with('-') {
                "invalid number".to_string()
            } else {
                format!("unexpected character `{text}`")
            };
            self.diagnostics.error(
                codes::INVALID_SYNTAX,
                "invalid syntax",
                self.current.span,
                message,
            );
        }
    }

    /// Consumes the token if it matches.
    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at_kind(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expects a specific token kind.
    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.error_unexpected(&format!("`{kind}`"));
            false
        }
    }

    fn current_text(&self) -> &'a str {
        self.lexer.span_text(self.current.span)
    }

    fn error_unexpected(&mut self, expected: &str) {
        if self.at_kind(TokenKind::Eof) {
            self.diagnostics.error(
                codes::UNEXPECTED_EOF,
                "unexpected end of input",
                self.current.span,
                format!("expected {expected}"),
            );
        } else {
            let found = self.current_text();
            self.diagnostics.error(
                codes::UNEXPECTED_TOKEN,
                "unexpected token",
                self.current.span,
                format!("expected {expected}, found `{found}`"),
            );
        }
    }

    fn error_at(&mut self, span: Span, message: impl Into<String>) {
        self.diagnostics
            .error(codes::INVALID_SYNTAX, "invalid syntax", span, message);
    }

    /// Parses a document.
    pub fn parse_document(&mut self) -> Document {
        let start = self.current.span.start;
        let mut definitions = Vec::new();

        while !self.at_kind(TokenKind::Eof) {
            if let Some(def) = self.parse_definition() {
                definitions.push(def);
            }
        }

        let document = Document {
            definitions,
            span: Span::new(start, self.current.span.end),
        };
        self.check_duplicate_fragments(&document);
        document
    }

    fn check_duplicate_fragments(&mut self, document: &Document) {
        let mut seen: Vec<&str> = Vec::new();
        for fragment in document.fragments() {
            let name = fragment.name.value.as_str();
            if seen.contains(&name) {
                self.diagnostics.error(
                    codes::DUPLICATE_FRAGMENT,
                    "duplicate fragment",
                    fragment.name.span,
                    format!("fragment `{name}` is defined more than once"),
                );
            } else {
                seen.push(name);
            }
        }
    }

    fn parse_definition(&mut self) -> Option<Definition> {
        let parsed = match self.at() {
            TokenKind::LBrace => {
                let start = self.current.span.start;
                let selection_set = self.parse_selection_set();
                Some(Definition::Operation(OperationDefinition {
                    operation: OperationType::Query,
                    name: None,
                    variables: Vec::new(),
                    directives: Vec::new(),
                    selection_set,
                    span: Span::new(start, self.prev_end),
                }))
            }
            TokenKind::Query | TokenKind::Mutation | TokenKind::Subscription => {
                self.parse_operation().map(Definition::Operation)
            }
            TokenKind::Fragment => self.parse_fragment().map(Definition::Fragment),
            kind if kind.is_type_system_keyword() => {
                self.diagnostics.error(
                    codes::UNSUPPORTED_DEFINITION,
                    "unsupported definition",
                    self.current.span,
                    format!("`{kind}` definitions cannot appear in an executable document"),
                );
                self.advance();
                None
            }
            _ => {
                self.error_unexpected("a definition");
                self.advance();
                None
            }
        };

        if parsed.is_none() {
            self.skip_to_definition();
        }
        parsed
    }

    /// Skips tokens until the next top-level operation or fragment keyword.
    fn skip_to_definition(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.at() {
                TokenKind::Eof => return,
                TokenKind::Query
                | TokenKind::Mutation
                | TokenKind::Subscription
                | TokenKind::Fragment
                    if depth == 0 =>
                {
                    return
                }
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.advance();
        }
    }

    fn parse_operation(&mut self) -> Option<OperationDefinition> {
        let start = self.current.span.start;
        let operation = match self.at() {
            TokenKind::Mutation => OperationType::Mutation,
            TokenKind::Subscription => OperationType::Subscription,
            _ => OperationType::Query,
        };
        self.advance();

        let name = if self.at().is_name_like() {
            Some(self.parse_name()?)
        } else {
            None
        };

        let variables = if self.at_kind(TokenKind::LParen) {
            self.parse_variable_definitions()
        } else {
            Vec::new()
        };

        let directives = self.parse_directives();
        let selection_set = self.parse_selection_set();

        Some(OperationDefinition {
            operation,
            name,
            variables,
            directives,
            selection_set,
            span: Span::new(start, self.prev_end),
        })
    }

    fn parse_variable_definitions(&mut self) -> Vec<VariableDefinition> {
        let mut variables = Vec::new();
        self.advance();

        while !matches!(
            self.at(),
            TokenKind::RParen | TokenKind::LBrace | TokenKind::Eof
        ) {
            let before = self.current.span.start;
            if let Some(variable) = self.parse_variable_definition() {
                variables.push(variable);
            }
            if self.current.span.start == before {
                self.advance();
            }
        }

        self.expect(TokenKind::RParen);
        variables
    }

    fn parse_variable_definition(&mut self) -> Option<VariableDefinition> {
        let start = self.current.span.start;
        if !self.expect(TokenKind::Dollar) {
            return None;
        }
        let name = self.parse_name()?;
        if !self.expect(TokenKind::Colon) {
            return None;
        }
        let ty = self.parse_type()?;
        let default_value = if self.eat(TokenKind::Eq) {
            Some(self.parse_value()?)
        } else {
            None
        };
        // Variable directives are accepted but not kept.
        self.parse_directives();

        Some(VariableDefinition {
            name,
            ty,
            default_value,
            span: Span::new(start, self.prev_end),
        })
    }

    fn parse_type(&mut self) -> Option<Type> {
        let inner = if self.eat(TokenKind::LBracket) {
            let item = self.parse_type()?;
            if !self.expect(TokenKind::RBracket) {
                return None;
            }
            Type::list(item)
        } else {
            Type::Named(self.parse_name()?)
        };

        if self.eat(TokenKind::Bang) {
            Some(Type::non_null(inner))
        } else {
            Some(inner)
        }
    }

    fn parse_fragment(&mut self) -> Option<FragmentDefinition> {
        let start = self.current.span.start;
        self.advance();

        let name = self.parse_name()?;
        if name.value == "on" {
            self.error_at(name.span, "a fragment cannot be named `on`");
            return None;
        }
        if !self.expect(TokenKind::On) {
            return None;
        }
        let type_condition = self.parse_name()?;
        let directives = self.parse_directives();
        let selection_set = self.parse_selection_set();

        Some(FragmentDefinition {
            name,
            type_condition,
            directives,
            selection_set,
            span: Span::new(start, self.prev_end),
        })
    }

    fn parse_selection_set(&mut self) -> SelectionSet {
        let start = self.current.span.start;
        let mut selections = Vec::new();

        if !self.expect(TokenKind::LBrace) {
            return SelectionSet {
                selections,
                span: Span::new(start, start),
            };
        }

        while !matches!(self.at(), TokenKind::RBrace | TokenKind::Eof) {
            let before = self.current.span.start;
            if let Some(selection) = self.parse_selection() {
                selections.push(selection);
            }
            if self.current.span.start == before {
                self.advance();
            }
        }

        let close = self.current.span;
        self.expect(TokenKind::RBrace);
        if selections.is_empty() {
            self.error_at(Span::new(start, close.end), "selection set cannot be empty");
        }

        SelectionSet {
            selections,
            span: Span::new(start, self.prev_end),
        }
    }

    fn parse_selection(&mut self) -> Option<Selection> {
        if !self.at_kind(TokenKind::Spread) {
            return self.parse_field().map(Selection::Field);
        }

        let start = self.current.span.start;
        self.advance();

        if self.eat(TokenKind::On) {
            let type_condition = self.parse_name()?;
            let directives = self.parse_directives();
            let selection_set = self.parse_selection_set();
            return Some(Selection::InlineFragment(InlineFragment {
                type_condition: Some(type_condition),
                directives,
                selection_set,
                span: Span::new(start, self.prev_end),
            }));
        }

        if matches!(self.at(), TokenKind::LBrace | TokenKind::At) {
            let directives = self.parse_directives();
            let selection_set = self.parse_selection_set();
            return Some(Selection::InlineFragment(InlineFragment {
                type_condition: None,
                directives,
                selection_set,
                span: Span::new(start, self.prev_end),
            }));
        }

        let name = self.parse_name()?;
        let directives = self.parse_directives();
        Some(Selection::FragmentSpread(FragmentSpread {
            name,
            directives,
            span: Span::new(start, self.prev_end),
        }))
    }

    fn parse_field(&mut self) -> Option<FieldSelection> {
        let start = self.current.span.start;
        let first = self.parse_name()?;

        let (alias, name) = if self.eat(TokenKind::Colon) {
            (Some(first), self.parse_name()?)
        } else {
            (None, first)
        };

        let arguments = if self.at_kind(TokenKind::LParen) {
            self.parse_arguments()
        } else {
            Vec::new()
        };
        let directives = self.parse_directives();
        let selection_set = if self.at_kind(TokenKind::LBrace) {
            Some(self.parse_selection_set())
        } else {
            None
        };

        Some(FieldSelection {
            alias,
            name,
            arguments,
            directives,
            selection_set,
            span: Span::new(start, self.prev_end),
        })
    }

    fn parse_arguments(&mut self) -> Vec<Argument> {
        let mut arguments = Vec::new();
        self.advance();

        while !matches!(
            self.at(),
            TokenKind::RParen | TokenKind::LBrace | TokenKind::Eof
        ) {
            let before = self.current.span.start;
            if let Some(argument) = self.parse_argument() {
                arguments.push(argument);
            }
            if self.current.span.start == before {
                self.advance();
            }
        }

        self.expect(TokenKind::RParen);
        arguments
    }

    fn parse_argument(&mut self) -> Option<Argument> {
        let start = self.current.span.start;
        let name = self.parse_name()?;
        if !self.expect(TokenKind::Colon) {
            return None;
        }
        let value = self.parse_value()?;
        Some(Argument {
            name,
            value,
            span: Span::new(start, self.prev_end),
        })
    }

    fn parse_directives(&mut self) -> Vec<Directive> {
        let mut directives = Vec::new();
        while self.at_kind(TokenKind::At) {
            let start = self.current.span.start;
            self.advance();
            let Some(name) = self.parse_name() else {
                break;
            };
            let arguments = if self.at_kind(TokenKind::LParen) {
                self.parse_arguments()
            } else {
                Vec::new()
            };
            directives.push(Directive {
                name,
                arguments,
                span: Span::new(start, self.prev_end),
            });
        }
        directives
    }

    /// Parses an input value.
    pub fn parse_value(&mut self) -> Option<Value> {
        let span = self.current.span;
        let text = self.current_text();

        let value = match self.at() {
            TokenKind::Dollar => {
                self.advance();
                return self.parse_name().map(Value::Variable);
            }
            TokenKind::IntLiteral => match text.parse::<i64>() {
                Ok(n) => Value::Int(n),
                Err(_) => {
                    self.error_at(span, format!("integer `{text}` is out of range"));
                    Value::Int(0)
                }
            },
            TokenKind::FloatLiteral => match text.parse::<f64>() {
                Ok(f) if f.is_finite() => Value::Float(f),
                Ok(_) => {
                    self.error_at(span, format!("float `{text}` is out of range"));
                    Value::Float(0.0)
                }
                Err(_) => {
                    self.error_at(span, format!("invalid float `{text}`"));
                    Value::Float(0.0)
                }
            },
            TokenKind::StringLiteral => {
                let raw = &text[1..text.len() - 1];
                match unescape(raw) {
                    Ok(s) => Value::String(s),
                    Err(message) => {
                        self.error_at(span, message);
                        Value::String(raw.to_string())
                    }
                }
            }
            TokenKind::BlockStringLiteral => {
                Value::String(block_string_value(&text[3..text.len() - 3]))
            }
            TokenKind::True => Value::Boolean(true),
            TokenKind::False => Value::Boolean(false),
            TokenKind::Null => Value::Null,
            TokenKind::LBracket => return Some(self.parse_list_value()),
            TokenKind::LBrace => return Some(self.parse_object_value()),
            kind if kind.is_name_like() => Value::Enum(Name::spanned(text, span)),
            _ => {
                self.error_unexpected("a value");
                return None;
            }
        };

        self.advance();
        Some(value)
    }

    fn parse_list_value(&mut self) -> Value {
        self.advance();
        let mut items = Vec::new();
        while !matches!(self.at(), TokenKind::RBracket | TokenKind::Eof) {
            let before = self.current.span.start;
            if let Some(item) = self.parse_value() {
                items.push(item);
            }
            if self.current.span.start == before {
                self.advance();
            }
        }
        self.expect(TokenKind::RBracket);
        Value::List(items)
    }

    fn parse_object_value(&mut self) -> Value {
        self.advance();
        let mut fields = Vec::new();
        while !matches!(self.at(), TokenKind::RBrace | TokenKind::Eof) {
            let before = self.current.span.start;
            if let Some(name) = self.parse_name() {
                if self.expect(TokenKind::Colon) {
                    if let Some(value) = self.parse_value() {
                        fields.push((name, value));
                    }
                }
            }
            if self.current.span.start == before {
                self.advance();
            }
        }
        self.expect(TokenKind::RBrace);
        Value::Object(fields)
    }

    fn parse_name(&mut self) -> Option<Name> {
        if self.at().is_name_like() {
            let name = Name::spanned(self.current_text(), self.current.span);
            self.advance();
            Some(name)
        } else {
            self.error_unexpected("a name");
            None
        }
    }
}

/// Resolves escape sequences in a quoted string body.
fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32);
                match decoded {
                    Some(ch) => out.push(ch),
                    None => return Err(format!("invalid unicode escape `\\u{hex}`")),
                }
            }
            Some(other) => return Err(format!("invalid escape sequence `\\{other}`")),
            None => return Err("unterminated escape sequence".to_string()),
        }
    }

    Ok(out)
}

/// Dedents a block string body and strips blank leading and trailing lines.
fn block_string_value(raw: &str) -> String {
    let raw = raw.replace("\\\"\"\"", "\"\"\"");
    let lines: Vec<&str> = raw
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    let common_indent = lines
        .iter()
        .skip(1)
        .filter_map(|line| {
            let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
            (indent < line.len()).then_some(indent)
        })
        .min()
        .unwrap_or(0);

    let mut out: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                *line
            } else {
                line.get(common_indent..).unwrap_or("")
            }
        })
        .collect();

    let is_blank = |line: &&str| line.trim_matches([' ', '\t']).is_empty();
    while out.first().is_some_and(is_blank) {
        out.remove(0);
    }
    while out.last().is_some_and(is_blank) {
        out.pop();
    }

    out.join("\n")
}
