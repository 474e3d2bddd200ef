//! Core utilities for gqlsrc.
//!
//! This crate provides the foundational types shared by the syntax layer:
//! - `span`: Source location tracking
//! - `diagnostics`: Error collection and rendering

pub mod diagnostics;
pub mod span;

pub use diagnostics::{Diagnostic, DiagnosticBag, DiagnosticSeverity, Label, SyntaxError};
pub use span::Span;
