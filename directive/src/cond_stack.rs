//! The conditional-inclusion stack.
//!
//! Each open `#if`/`#ifdef`/`#ifndef` pushes a frame that tracks three
//! states rather than a single boolean: the active branch is being
//! emitted, a branch is being skipped but a later `#elif`/`#else`
//! could still be taken, or the whole rest of the construct is dead
//! because some earlier branch already ran. Collapsing the second and
//! third cases into one boolean (as a naive port would) makes
//! `#elif`/`#else` re-evaluate an expression that must not run once
//! any branch has already been taken, which is exactly the class of
//! "elif after the true branch still runs" bug this type sheds.

use crate::error::PreprocessError;

/// Whether lines under the current frame should be emitted, skipped
/// (with a later branch still eligible), or skipped permanently for
/// the rest of this `#if`/`#endif` construct.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Skipping {
    /// This branch is active; lines are emitted (subject to any
    /// enclosing frame also being `Emit`).
    Emit,
    /// This branch is not taken, but a later `#elif`/`#else` in the
    /// same construct could still become active.
    SkipBranch,
    /// Some branch of this construct already ran; every subsequent
    /// `#elif`/`#else` is dead regardless of its condition.
    SkipRest,
}

/// Which directive opened this frame, needed to validate that `#elif`
/// cannot follow `#else` and that `#else` can appear at most once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOrigin {
    If,
    Ifdef,
    Ifndef,
}

/// One open conditional-inclusion construct.
#[derive(Clone, Debug)]
pub struct IfFrame {
    pub origin: FrameOrigin,
    pub state: Skipping,
    /// True once any branch of this construct (including the current
    /// one, if active) has been taken; drives the `SkipRest`
    /// transition for subsequent `#elif`.
    pub any_branch_taken: bool,
    /// True once `#else` has been seen, so a second `#else` or an
    /// `#elif` after it is a hard error.
    pub seen_else: bool,
    pub file: String,
    pub line: usize,
    /// Multiple-inclusion guard candidate name, if this frame's
    /// controlling expression was `!defined(NAME)`; consumed by
    /// [`crate::mi_guard::MiGuard`].
    pub mi_candidate: Option<String>,
}

impl IfFrame {
    #[must_use]
    pub fn new(origin: FrameOrigin, taken: bool, file: String, line: usize) -> Self {
        IfFrame {
            origin,
            state: if taken { Skipping::Emit } else { Skipping::SkipBranch },
            any_branch_taken: taken,
            seen_else: false,
            file,
            line,
            mi_candidate: None,
        }
    }
}

/// The stack of open conditional frames for a single input buffer.
///
/// Kept as a plain owned `Vec` rather than a bump-allocated arena:
/// frames are small, pushed and popped in strict LIFO order scoped to
/// one buffer's lifetime, and a `Vec` needs no unsafe self-referential
/// lifetime management to get that for free.
#[derive(Clone, Debug, Default)]
pub struct CondStack {
    frames: Vec<IfFrame>,
}

impl CondStack {
    #[must_use]
    pub fn new() -> Self {
        CondStack { frames: Vec::new() }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether a line at the current nesting should be emitted: every
    /// enclosing frame, and the innermost one, must be `Emit`.
    #[must_use]
    pub fn should_emit(&self) -> bool {
        self.frames.iter().all(|f| f.state == Skipping::Emit)
    }

    /// Whether every frame *enclosing* the innermost one is `Emit`,
    /// i.e. whether entering the current frame happened while not
    /// already skipping. `#elif` uses this to decide whether its
    /// controlling expression is even worth evaluating: one inside a
    /// dead outer branch can never take effect no matter the result,
    /// so a malformed expression there must not be diagnosed.
    #[must_use]
    pub fn enclosing_emits(&self) -> bool {
        let without_innermost = self.frames.len().saturating_sub(1);
        self.frames[..without_innermost].iter().all(|f| f.state == Skipping::Emit)
    }

    pub fn push(&mut self, frame: IfFrame) {
        self.frames.push(frame);
    }

    #[must_use]
    pub fn top(&self) -> Option<&IfFrame> {
        self.frames.last()
    }

    #[must_use]
    pub fn top_mut(&mut self) -> Option<&mut IfFrame> {
        self.frames.last_mut()
    }

    /// Handle `#elif`: the new condition only matters if no branch of
    /// this construct has been taken yet.
    pub fn elif(
        &mut self,
        condition_true: bool,
        file: &str,
        line: usize,
    ) -> Result<(), PreprocessError> {
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| PreprocessError::conditional_error(file.to_string(), line, "#elif without #if".to_string()))?;
        if frame.seen_else {
            return Err(PreprocessError::conditional_error(
                file.to_string(),
                line,
                "#elif after #else".to_string(),
            ));
        }
        if frame.any_branch_taken {
            frame.state = Skipping::SkipRest;
        } else if condition_true {
            frame.state = Skipping::Emit;
            frame.any_branch_taken = true;
        } else {
            frame.state = Skipping::SkipBranch;
        }
        Ok(())
    }

    /// Handle `#else`.
    pub fn else_branch(&mut self, file: &str, line: usize) -> Result<(), PreprocessError> {
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| PreprocessError::conditional_error(file.to_string(), line, "#else without #if".to_string()))?;
        if frame.seen_else {
            return Err(PreprocessError::conditional_error(
                file.to_string(),
                line,
                "#else after #else".to_string(),
            ));
        }
        frame.seen_else = true;
        if frame.any_branch_taken {
            frame.state = Skipping::SkipRest;
        } else {
            frame.state = Skipping::Emit;
            frame.any_branch_taken = true;
        }
        Ok(())
    }

    /// Handle `#endif`, returning the popped frame (the multiple
    /// inclusion guard needs it to decide if the whole buffer was one
    /// big `#ifndef` wrapper).
    pub fn endif(&mut self, file: &str, line: usize) -> Result<IfFrame, PreprocessError> {
        self.frames.pop().ok_or_else(|| {
            PreprocessError::conditional_error(file.to_string(), line, "#endif without #if".to_string())
        })
    }

    /// Called at end of buffer: any frame left open is an error,
    /// reported at the site the frame was opened.
    pub fn check_balanced(&self) -> Result<(), PreprocessError> {
        if let Some(frame) = self.frames.last() {
            return Err(PreprocessError::conditional_error(
                frame.file.clone(),
                frame.line,
                "unterminated #if".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_frames_all_must_emit() {
        let mut stack = CondStack::new();
        stack.push(IfFrame::new(FrameOrigin::If, true, "f".into(), 1));
        assert!(stack.should_emit());
        stack.push(IfFrame::new(FrameOrigin::If, false, "f".into(), 2));
        assert!(!stack.should_emit());
    }

    #[test]
    fn elif_after_taken_branch_stays_skipped() {
        let mut stack = CondStack::new();
        stack.push(IfFrame::new(FrameOrigin::If, true, "f".into(), 1));
        stack.elif(true, "f", 2).unwrap();
        assert_eq!(stack.top().unwrap().state, Skipping::SkipRest);
    }

    #[test]
    fn elif_taken_when_no_prior_branch_matched() {
        let mut stack = CondStack::new();
        stack.push(IfFrame::new(FrameOrigin::If, false, "f".into(), 1));
        stack.elif(true, "f", 2).unwrap();
        assert_eq!(stack.top().unwrap().state, Skipping::Emit);
        stack.elif(true, "f", 3).unwrap();
        assert_eq!(stack.top().unwrap().state, Skipping::SkipRest);
    }

    #[test]
    fn else_without_if_is_error() {
        let mut stack = CondStack::new();
        assert!(stack.else_branch("f", 1).is_err());
    }

    #[test]
    fn elif_after_else_is_error() {
        let mut stack = CondStack::new();
        stack.push(IfFrame::new(FrameOrigin::If, false, "f".into(), 1));
        stack.else_branch("f", 2).unwrap();
        assert!(stack.elif(true, "f", 3).is_err());
    }

    #[test]
    fn unterminated_if_reported_at_open_site() {
        let mut stack = CondStack::new();
        stack.push(IfFrame::new(FrameOrigin::If, true, "f".into(), 7));
        let err = stack.check_balanced().unwrap_err();
        assert_eq!(err.line(), 7);
    }

    #[test]
    fn endif_pops_frame() {
        let mut stack = CondStack::new();
        stack.push(IfFrame::new(FrameOrigin::If, true, "f".into(), 1));
        let popped = stack.endif("f", 2).unwrap();
        assert_eq!(popped.line, 1);
        assert!(stack.is_empty());
    }

    #[test]
    fn endif_without_if_is_error() {
        let mut stack = CondStack::new();
        assert!(stack.endif("f", 1).is_err());
    }
}
