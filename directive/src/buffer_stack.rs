//! The stack of input buffers being processed: real files opened by
//! `#include`, synthetic snippets from `-D`/`-U`/`-A` command-line
//! injection, and `_Pragma`'s synthetic buffer.
//!
//! The dispatcher does not read files itself (that is the include
//! resolver's job) but does own the *stack* of what is currently open,
//! since conditional-inclusion balance and the multiple-inclusion
//! guard are both scoped per buffer, and `#include` recursion depth
//! must be bounded independent of whatever resolver is plugged in.

use crate::cond_stack::CondStack;
use crate::error::PreprocessError;
use crate::mi_guard::MiGuard;

/// How a buffer entered the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferOrigin {
    /// The primary source file given to the dispatcher.
    Primary,
    /// Opened by `#include`/`#include_next`/`#import`.
    Included,
    /// A one-line snippet synthesized from a `-D`/`-U`/`-A`
    /// command-line option, run through the same handlers as source
    /// text.
    CommandLine,
    /// The synthetic buffer `_Pragma("...")` builds from its
    /// destringized operand.
    PragmaOperator,
}

/// One entry in the buffer stack.
#[derive(Debug)]
pub struct Buffer {
    pub file: String,
    pub origin: BufferOrigin,
    pub cond_stack: CondStack,
    pub mi_guard: MiGuard,
    /// Line number already processed within this buffer, 0 before the
    /// first line.
    pub current_line: usize,
    /// Set by `#pragma GCC system_header` or a `#line` action operand
    /// of `3`; suppresses warnings the frontend reserves for
    /// user-controlled headers.
    pub system_header: bool,
}

impl Buffer {
    #[must_use]
    pub fn new(file: String, origin: BufferOrigin) -> Self {
        Buffer {
            file,
            origin,
            cond_stack: CondStack::new(),
            mi_guard: MiGuard::new(),
            current_line: 0,
            system_header: false,
        }
    }
}

/// Bounds how deeply buffers may nest (mirrors `#include` recursion
/// depth), independent of the expansion recursion limit.
const DEFAULT_MAX_DEPTH: usize = 200;

/// The stack of open buffers.
#[derive(Debug)]
pub struct BufferStack {
    buffers: Vec<Buffer>,
    max_depth: usize,
}

impl Default for BufferStack {
    fn default() -> Self {
        BufferStack {
            buffers: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl BufferStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_depth(max_depth: usize) -> Self {
        BufferStack {
            buffers: Vec::new(),
            max_depth,
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.buffers.len()
    }

    /// Push a new buffer, erroring if it would exceed `max_depth`.
    pub fn push(&mut self, buffer: Buffer) -> Result<(), PreprocessError> {
        if self.buffers.len() >= self.max_depth {
            let (file, line) = self
                .buffers
                .last()
                .map(|b| (b.file.clone(), b.current_line))
                .unwrap_or_default();
            return Err(PreprocessError::fatal(
                file,
                line,
                format!("buffer stack depth exceeded ({})", self.max_depth),
            ));
        }
        self.buffers.push(buffer);
        Ok(())
    }

    /// Pop the innermost buffer, diagnosing if it had an unterminated
    /// `#if`/`#ifdef`/`#ifndef`. Callers should surface this
    /// diagnostic (GCC treats it as a hard error, not silently
    /// unwound) before discarding the buffer.
    pub fn pop(&mut self) -> Option<(Buffer, Result<(), PreprocessError>)> {
        let buffer = self.buffers.pop()?;
        log::debug!("leaving buffer {}, depth {}", buffer.file, self.buffers.len());
        let balance = buffer.cond_stack.check_balanced();
        Some((buffer, balance))
    }

    #[must_use]
    pub fn top(&self) -> Option<&Buffer> {
        self.buffers.last()
    }

    #[must_use]
    pub fn top_mut(&mut self) -> Option<&mut Buffer> {
        self.buffers.last_mut()
    }

    /// True if `file` is already open somewhere on the stack
    /// (`#include` cycle detection).
    #[must_use]
    pub fn contains_file(&self, file: &str) -> bool {
        self.buffers.iter().any(|b| b.file == file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_pop_roundtrip() {
        let mut stack = BufferStack::new();
        stack.push(Buffer::new("a.c".into(), BufferOrigin::Primary)).unwrap();
        assert_eq!(stack.depth(), 1);
        let (buf, balance) = stack.pop().unwrap();
        assert_eq!(buf.file, "a.c");
        assert!(balance.is_ok());
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn pop_reports_unterminated_conditional() {
        use crate::cond_stack::{FrameOrigin, IfFrame};
        let mut stack = BufferStack::new();
        let mut buf = Buffer::new("a.h".into(), BufferOrigin::Included);
        buf.cond_stack
            .push(IfFrame::new(FrameOrigin::Ifndef, true, "a.h".into(), 1));
        stack.push(buf).unwrap();
        let (_, balance) = stack.pop().unwrap();
        assert!(balance.is_err());
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut stack = BufferStack::with_max_depth(2);
        stack.push(Buffer::new("a.c".into(), BufferOrigin::Primary)).unwrap();
        stack.push(Buffer::new("b.h".into(), BufferOrigin::Included)).unwrap();
        assert!(stack.push(Buffer::new("c.h".into(), BufferOrigin::Included)).is_err());
    }

    #[test]
    fn cycle_detection_via_contains_file() {
        let mut stack = BufferStack::new();
        stack.push(Buffer::new("a.h".into(), BufferOrigin::Primary)).unwrap();
        assert!(stack.contains_file("a.h"));
        assert!(!stack.contains_file("b.h"));
    }
}
