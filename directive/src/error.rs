//! Error and diagnostic types for the directive processor.
//!
//! Every error carries the source location of the directive that
//! triggered it. Column and source-line are attached separately from
//! construction, since the dispatcher only knows the offending column
//! after re-scanning the directive line, while the payload is known at
//! the point of failure.

use std::fmt;

/// Severity of a diagnostic: an internal consistency failure, a hard
/// error, a pedantic warning, a plain warning, or a fatal condition
/// that aborts the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreprocessErrorKind {
    /// Registry or table corruption that should never happen given a
    /// correctly constructed directive table (duplicate pragma leaf).
    Ice,
    /// A directive could not be processed: bad syntax, an unterminated
    /// construct, `#else` without `#if`, and similar.
    Error,
    /// Would be an error under `-pedantic`: extension directive used,
    /// `#line` operand out of range, stray tokens at end of directive.
    Pedwarn,
    /// Advisory only: `#pragma once` is obsolete, a one-shot `#import`
    /// notice.
    Warning,
    /// Unrecoverable: include nesting overflow, I/O catastrophe.
    Fatal,
}

impl fmt::Display for PreprocessErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PreprocessErrorKind::Ice => "internal error",
            PreprocessErrorKind::Error => "error",
            PreprocessErrorKind::Pedwarn => "warning",
            PreprocessErrorKind::Warning => "warning",
            PreprocessErrorKind::Fatal => "fatal error",
        };
        f.write_str(s)
    }
}

/// The payload of a `PreprocessError`: what went wrong, independent of
/// where.
#[derive(Debug)]
pub enum PreprocessErrorPayload {
    /// `#include`/`#import`/`#include_next` target could not be
    /// resolved by the configured include resolver.
    IncludeNotFound(String),
    /// A directive's operand did not parse (missing identifier, bad
    /// `#line` number, unterminated header name, ...).
    MalformedDirective(String),
    /// Function-like macro argument list was malformed or the argument
    /// count did not match the parameter list.
    MacroArgMismatch(String),
    /// Macro expansion or directive dispatch recursed past the
    /// configured limit.
    RecursionLimitExceeded(String),
    /// `#else`/`#elif`/`#endif` without a matching `#if`, or an
    /// `#if`/`#ifdef`/`#ifndef` left open at end of buffer.
    ConditionalError(String),
    /// A poisoned identifier (`#pragma poison`) was referenced.
    PoisonedIdentifier(String),
    /// `#pragma` registry lookup or built-in handler failed.
    PragmaError(String),
    /// I/O failure reading an include target.
    Io(std::io::Error),
    /// Anything else (`#error`, expression evaluator failures, ...).
    Other(String),
}

impl fmt::Display for PreprocessErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreprocessErrorPayload::IncludeNotFound(s) => write!(f, "include not found: {s}"),
            PreprocessErrorPayload::MalformedDirective(s) => write!(f, "malformed directive: {s}"),
            PreprocessErrorPayload::MacroArgMismatch(s) => write!(f, "macro arg mismatch: {s}"),
            PreprocessErrorPayload::RecursionLimitExceeded(s) => write!(f, "recursion limit: {s}"),
            PreprocessErrorPayload::ConditionalError(s) => write!(f, "conditional error: {s}"),
            PreprocessErrorPayload::PoisonedIdentifier(s) => write!(f, "poisoned identifier: {s}"),
            PreprocessErrorPayload::PragmaError(s) => write!(f, "pragma error: {s}"),
            PreprocessErrorPayload::Io(err) => write!(f, "I/O error: {err}"),
            PreprocessErrorPayload::Other(s) => write!(f, "{s}"),
        }
    }
}

/// An error produced while dispatching or handling a directive.
#[derive(Debug)]
pub struct PreprocessError {
    kind: PreprocessErrorKind,
    payload: PreprocessErrorPayload,
    file: String,
    line: usize,
    column: Option<usize>,
    source_line: Option<String>,
}

impl PreprocessError {
    fn new(
        kind: PreprocessErrorKind,
        payload: PreprocessErrorPayload,
        file: String,
        line: usize,
    ) -> Self {
        PreprocessError {
            kind,
            payload,
            file,
            line,
            column: None,
            source_line: None,
        }
    }

    /// Build a "malformed directive" error at the given location.
    #[must_use]
    pub fn malformed_directive(file: String, line: usize, directive: String) -> Self {
        Self::new(
            PreprocessErrorKind::Error,
            PreprocessErrorPayload::MalformedDirective(directive),
            file,
            line,
        )
    }

    /// Build a conditional-stack error (`#else` without `#if`,
    /// unterminated `#if`, ...) at the given location.
    #[must_use]
    pub fn conditional_error(file: String, line: usize, details: String) -> Self {
        Self::new(
            PreprocessErrorKind::Error,
            PreprocessErrorPayload::ConditionalError(details),
            file,
            line,
        )
    }

    /// Build an "include not found" error at the given location.
    #[must_use]
    pub fn include_not_found(file: String, line: usize, path: String) -> Self {
        Self::new(
            PreprocessErrorKind::Error,
            PreprocessErrorPayload::IncludeNotFound(path),
            file,
            line,
        )
    }

    /// Build a macro-argument error at the given location.
    #[must_use]
    pub fn macro_arg_mismatch(file: String, line: usize, details: String) -> Self {
        Self::new(
            PreprocessErrorKind::Error,
            PreprocessErrorPayload::MacroArgMismatch(details),
            file,
            line,
        )
    }

    /// Build a recursion-limit error at the given location.
    #[must_use]
    pub fn recursion_limit_exceeded(file: String, line: usize, details: String) -> Self {
        Self::new(
            PreprocessErrorKind::Fatal,
            PreprocessErrorPayload::RecursionLimitExceeded(details),
            file,
            line,
        )
    }

    /// Build a poisoned-identifier error at the given location.
    #[must_use]
    pub fn poisoned_identifier(file: String, line: usize, name: String) -> Self {
        Self::new(
            PreprocessErrorKind::Error,
            PreprocessErrorPayload::PoisonedIdentifier(name),
            file,
            line,
        )
    }

    /// Build a pragma-registry error at the given location.
    #[must_use]
    pub fn pragma_error(file: String, line: usize, details: String) -> Self {
        Self::new(
            PreprocessErrorKind::Ice,
            PreprocessErrorPayload::PragmaError(details),
            file,
            line,
        )
    }

    /// Build a fatal error (buffer-stack overflow, runaway recursion
    /// past what even `RecursionLimitExceeded` models) at the given
    /// location.
    #[must_use]
    pub fn fatal(file: String, line: usize, details: String) -> Self {
        Self::new(
            PreprocessErrorKind::Fatal,
            PreprocessErrorPayload::Other(details),
            file,
            line,
        )
    }

    /// Build a catch-all error at the given location.
    #[must_use]
    pub fn other(file: String, line: usize, message: String) -> Self {
        Self::new(
            PreprocessErrorKind::Error,
            PreprocessErrorPayload::Other(message),
            file,
            line,
        )
    }

    /// Build a pedantic warning at the given location.
    #[must_use]
    pub fn pedwarn(file: String, line: usize, message: String) -> Self {
        Self::new(
            PreprocessErrorKind::Pedwarn,
            PreprocessErrorPayload::Other(message),
            file,
            line,
        )
    }

    /// Build a plain warning at the given location.
    #[must_use]
    pub fn warning(file: String, line: usize, message: String) -> Self {
        Self::new(
            PreprocessErrorKind::Warning,
            PreprocessErrorPayload::Other(message),
            file,
            line,
        )
    }

    /// Wrap an I/O error encountered while resolving an include.
    #[must_use]
    pub fn io_error(file: String, line: usize, err: std::io::Error) -> Self {
        Self::new(
            PreprocessErrorKind::Error,
            PreprocessErrorPayload::Io(err),
            file,
            line,
        )
    }

    /// Attach a 1-based column for caret rendering.
    #[must_use]
    pub fn with_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }

    /// Attach the full text of the offending source line.
    #[must_use]
    pub fn with_source_line(mut self, line: String) -> Self {
        self.source_line = Some(line);
        self
    }

    /// The severity of this diagnostic.
    #[must_use]
    pub fn kind(&self) -> PreprocessErrorKind {
        self.kind
    }

    /// The file this diagnostic was raised against.
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// The 1-based line this diagnostic was raised against.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    /// The 1-based column, if one was attached.
    #[must_use]
    pub fn column(&self) -> Option<usize> {
        self.column
    }
}

impl fmt::Display for PreprocessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(col) => write!(
                f,
                "{}:{}:{}: {}: {}",
                self.file, self.line, col, self.kind, self.payload
            )?,
            None => write!(f, "{}:{}: {}: {}", self.file, self.line, self.kind, self.payload)?,
        }
        if let Some(src) = &self.source_line {
            write!(f, "\n{src}")?;
            if let Some(col) = self.column {
                let padding = " ".repeat(col.saturating_sub(1));
                write!(f, "\n{padding}^")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for PreprocessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.payload {
            PreprocessErrorPayload::Io(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_column() {
        let err =
            PreprocessError::malformed_directive("test.c".to_string(), 42, "define".to_string());
        let display = format!("{err}");
        assert!(display.contains("test.c:42"));
        assert!(display.contains("malformed directive: define"));
    }

    #[test]
    fn display_with_column_and_caret() {
        let err = PreprocessError::malformed_directive("test.c".to_string(), 10, "define".to_string())
            .with_column(5)
            .with_source_line("#define".to_string());
        let display = format!("{err}");
        assert!(display.contains("test.c:10:5"));
        assert!(display.contains("#define"));
        assert!(display.contains("    ^"));
    }

    #[test]
    fn io_error_chains_source() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let wrapped = PreprocessError::io_error("test.c".to_string(), 10, io_error);
        assert!(std::error::Error::source(&wrapped).is_some());
    }

    #[test]
    fn kind_survives_builder_chain() {
        let err = PreprocessError::warning("test.c".to_string(), 1, "obsolete".to_string())
            .with_column(3);
        assert_eq!(err.kind(), PreprocessErrorKind::Warning);
        assert_eq!(err.column(), Some(3));
    }
}
