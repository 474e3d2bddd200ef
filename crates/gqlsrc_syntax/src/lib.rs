//! Syntax layer for gqlsrc.
//!
//! Queries sent to the remote API are never assembled by string interpolation:
//! they are built as AST nodes and printed once. Fragment files read from disk
//! go through the same AST via the parser.
//!
//! This crate provides:
//! - `token`: Token kinds and token structures
//! - `lexer`: Tokenization
//! - `ast`: Executable document types (operations, fragments, selections)
//! - `parser`: Recursive descent parser
//! - `formatter`: Printing documents back to GraphQL text

pub mod ast;
pub mod formatter;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::*;
pub use formatter::{format, format_value, format_with_options, FormatOptions, Formatter};
pub use lexer::Lexer;
pub use parser::{parse, parse_value, ParseResult};
pub use token::{Token, TokenKind};
