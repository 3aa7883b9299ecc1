//! Contracts for the collaborators the directive dispatcher drives but
//! does not own.
//!
//! Raw lexing, macro expansion, `#if` constant-expression evaluation
//! and include-path resolution are each a substantial subsystem in
//! their own right; this crate owns directive *dispatch* — deciding
//! which handler runs, maintaining the conditional-inclusion stack,
//! the macro and assertion tables, the pragma registry, and the input
//! buffer stack — and calls out to these contracts for everything that
//! requires reading characters, running macro substitution, or
//! touching a filesystem.

use std::rc::Rc;

use crate::error::PreprocessError;
use crate::token::Token;

/// Where an `#include` header name came from, for a resolver that
/// wants to distinguish `"local.h"` search order from `<system.h>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncludeKind {
    /// `#include "..."`: search the including file's directory first.
    Quote,
    /// `#include <...>`: search only the configured system path.
    Angled,
}

/// Context handed to an [`IncludeResolver`] so it can implement
/// `#include_next` (resume the search after the directory the current
/// file was found in) and cycle detection.
#[derive(Clone, Debug)]
pub struct IncludeSearchState {
    /// Files currently open, innermost last, for cycle detection.
    pub include_stack: Vec<String>,
    /// True if this is an `#include_next` rather than a plain
    /// `#include`/`#import`.
    pub resume_search: bool,
}

/// The result of a successful include resolution: the canonical path
/// used for cycle/`#pragma once` tracking, and the file's contents.
#[derive(Clone, Debug)]
pub struct ResolvedInclude {
    pub canonical_path: String,
    pub contents: String,
}

/// Resolves an `#include`/`#include_next`/`#import` operand to file
/// contents. `None` means "not found"; the dispatcher turns that into
/// a [`PreprocessError::include_not_found`].
pub type IncludeResolver =
    Rc<dyn Fn(&str, IncludeKind, &IncludeSearchState) -> Option<ResolvedInclude>>;

/// Produces tokens for the directive dispatcher to consume.
///
/// The dispatcher is line-oriented: by the time it asks the lexer for
/// tokens, backslash-newline splicing and `_Pragma` destringizing have
/// already turned the input into logical lines, and the dispatcher's
/// own `#` recognition has already stripped the directive's keyword.
/// What is left is handed to the lexer one logical line at a time.
pub trait Lexer {
    /// Tokenize the remainder of a directive line (everything after
    /// the directive name), for directives whose operand is an
    /// ordinary token sequence (`#define`'s body, `#if`'s expression,
    /// `#line`'s operands, `#assert`'s predicate and answer, ...).
    fn tokenize_directive_operand(&self, line: &str) -> Vec<Token>;

    /// Tokenize `operand` as an `#include`/`#include_next`/`#import`
    /// header-name operand specifically: only here does `<...>` lex as
    /// a single token rather than a run of punctuators. Returns `None`
    /// if `operand` is neither a valid `<...>` nor `"..."` form.
    fn tokenize_header_name(&self, operand: &str) -> Option<Token>;

    /// Tokenize an ordinary (non-directive) source line, for the
    /// dispatcher to hand to the macro expander when the current
    /// conditional-inclusion state says the line should be emitted.
    fn tokenize_text_line(&self, line: &str) -> Vec<Token>;

    /// The byte offset within `line` where `needle`'s first token
    /// begins, used to build a 1-based caret column for diagnostics.
    /// `None` if `needle` does not occur.
    fn locate(&self, line: &str, needle: &str) -> Option<usize>;
}

/// Expands macro invocations in a token stream.
///
/// The dispatcher owns the macro *table* (definitions, `#define`,
/// `#undef`) but never substitutes a macro body itself; that is left
/// to this contract so the actual rescanning/argument-substitution
/// algorithm can live outside the dispatch crate.
pub trait MacroExpander {
    /// Fully macro-expand `tokens`, consulting `lookup` for macro
    /// definitions by name.
    fn expand(
        &mut self,
        tokens: &[Token],
        lookup: &dyn Fn(&str) -> Option<Rc<crate::macro_def::MacroDef>>,
    ) -> Result<Vec<Token>, PreprocessError>;
}

/// Evaluates the constant-expression operand of `#if`/`#elif`.
///
/// Per the conditional-skip semantics, the dispatcher only calls this
/// when the directive is not itself being skipped; the evaluator is
/// additionally asked to report whether the expression was of the
/// shape `!defined(NAME)` or `defined(NAME) == 0`, since that shape
/// feeds the multiple-inclusion guard.
pub trait ExprEvaluator {
    fn eval(
        &mut self,
        tokens: &[Token],
        is_defined: &dyn Fn(&str) -> bool,
    ) -> Result<ExprOutcome, PreprocessError>;
}

/// Result of evaluating an `#if`/`#elif` operand.
#[derive(Clone, Debug)]
pub struct ExprOutcome {
    /// The C truth value of the expression (zero is false).
    pub value: i64,
    /// If the expression was exactly `!defined(NAME)`, the name —
    /// candidate for the multiple-inclusion guard.
    pub not_defined_candidate: Option<String>,
}

impl ExprOutcome {
    #[must_use]
    pub fn is_true(&self) -> bool {
        self.value != 0
    }
}
