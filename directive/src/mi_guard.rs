//! The multiple-inclusion guard: detects the
//! `#ifndef X / #define X / ... / #endif` idiom so a repeat
//! `#include` of the same file can be short-circuited without
//! rescanning it.
//!
//! Recognition is a small state machine per buffer, not a text-level
//! pattern match: the buffer must open with `#ifndef X` (or the
//! `#if !defined(X)` spelling, which the expression evaluator reports
//! back via [`crate::collab::ExprOutcome::not_defined_candidate`]),
//! that frame's matching `#define X` must be the first thing the
//! buffer defines, and the `#endif` that closes it must be the very
//! last token before end of buffer. Anything else — an `#include`
//! before the guard, a second top-level `#if`, leading or trailing
//! text outside the guard — fails the automaton permanently for that
//! buffer.

/// State of the multiple-inclusion automaton for one input buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MiState {
    /// Nothing seen yet; still eligible to start the idiom.
    Outside,
    /// Inside the single top-level `#ifndef NAME` (or equivalent
    /// `#if !defined(NAME)`) that opened the buffer, name not yet
    /// confirmed by a matching `#define`.
    InsideOuterIfndef { guard_name: String, confirmed: bool },
    /// The outer frame closed at depth zero and nothing else was seen
    /// on the buffer yet; provisional until [`MiGuard::finalize`] is
    /// called at end of buffer, since text or a directive can still
    /// follow the `#endif` and disqualify it.
    PendingEof { guard_name: String },
    /// The idiom was matched: outer `#ifndef NAME`/`#define NAME`
    /// pair, buffer ended exactly at the matching `#endif`, nothing
    /// else before or after it.
    Complete { guard_name: String },
    /// Disqualified; this buffer can never be treated as guarded.
    Failed,
}

/// Tracks the automaton across the directives of one buffer.
#[derive(Clone, Debug)]
pub struct MiGuard {
    state: MiState,
    depth_at_outer_open: usize,
}

impl Default for MiGuard {
    fn default() -> Self {
        MiGuard {
            state: MiState::Outside,
            depth_at_outer_open: 0,
        }
    }
}

impl MiGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &MiState {
        &self.state
    }

    /// The buffer's very first directive was `#ifndef NAME` (depth
    /// was 0 going in, now 1).
    pub fn on_outer_ifndef(&mut self, depth_before: usize, name: &str) {
        if depth_before == 0 && self.state == MiState::Outside {
            self.state = MiState::InsideOuterIfndef {
                guard_name: name.to_string(),
                confirmed: false,
            };
            self.depth_at_outer_open = depth_before;
        } else {
            self.state = MiState::Failed;
        }
    }

    /// Any other directive that opens a conditional frame while we
    /// have not yet failed. Only the single outermost frame is
    /// allowed to be the guard; a second one at depth 0 disqualifies
    /// the buffer, but nested frames inside the guard are fine.
    pub fn on_other_conditional_open(&mut self, depth_before: usize) {
        if depth_before == 0 {
            self.state = MiState::Failed;
        }
    }

    /// `#define NAME ...` was processed. If we are waiting for the
    /// guard name to be defined and this is it, confirm the frame.
    pub fn on_define(&mut self, depth: usize, name: &str) {
        if let MiState::InsideOuterIfndef {
            guard_name,
            confirmed,
        } = &mut self.state
        {
            if depth == self.depth_at_outer_open + 1 && guard_name == name {
                *confirmed = true;
            }
        }
    }

    /// An `#include` was processed before the guard was confirmed:
    /// disqualifies the idiom (GCC's heuristic requires the guarded
    /// `#define` to be the first substantive thing in the file).
    pub fn on_include_before_confirmed(&mut self) {
        if matches!(
            self.state,
            MiState::InsideOuterIfndef {
                confirmed: false,
                ..
            }
        ) {
            self.state = MiState::Failed;
        }
    }

    /// A non-directive, non-blank top-level line (depth 0) was seen.
    /// Before the guard opens this disqualifies it outright (leading
    /// text); once the guard has provisionally closed this fails the
    /// otherwise-`PendingEof` state (trailing text).
    pub fn on_top_level_text(&mut self) {
        match &self.state {
            MiState::Outside => self.state = MiState::Failed,
            MiState::PendingEof { .. } => self.state = MiState::Failed,
            _ => {}
        }
    }

    /// The `#endif` that closed the outer frame was processed.
    /// `remaining_depth` is the conditional-stack depth after the pop.
    /// Lands in [`MiState::PendingEof`] rather than `Complete` — only
    /// [`MiGuard::finalize`], called once the buffer is fully drained,
    /// can confirm nothing followed.
    pub fn on_outer_endif(&mut self, remaining_depth: usize) {
        if let MiState::InsideOuterIfndef {
            guard_name,
            confirmed: true,
        } = &self.state
        {
            if remaining_depth == self.depth_at_outer_open {
                self.state = MiState::PendingEof {
                    guard_name: guard_name.clone(),
                };
                return;
            }
        }
        if remaining_depth == self.depth_at_outer_open {
            self.state = MiState::Failed;
        }
    }

    /// Promote a provisional `PendingEof` to `Complete` once the
    /// buffer is known to have ended with nothing left unread. Call
    /// exactly once, when the buffer is popped.
    pub fn finalize(&mut self) {
        if let MiState::PendingEof { guard_name } = &self.state {
            self.state = MiState::Complete {
                guard_name: guard_name.clone(),
            };
        }
    }

    /// If this buffer is a confirmed multiple-inclusion guard, the
    /// name of the guarding macro.
    #[must_use]
    pub fn completed_guard_name(&self) -> Option<&str> {
        match &self.state {
            MiState::Complete { guard_name } => Some(guard_name),
            _ => None,
        }
    }
}
