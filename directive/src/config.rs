//! Dispatcher configuration: diagnostic strictness, recursion/depth
//! limits, the include search path, and the command-line directive
//! injections (`-D`/`-U`/`-A`) that are folded into the macro and
//! assertion tables before the first line of source is processed.

use std::rc::Rc;

/// A warning/pedwarn sink. Kept as a cheap `Rc<dyn Fn>` rather than a
/// trait object since a caller typically just wants to forward the
/// message to a logger or collect it into a `Vec`.
pub type WarningHandler = Rc<dyn Fn(&str)>;

/// Fired for a `#pragma` the dispatcher has no root or namespaced
/// handler for, carrying the pragma text verbatim so the frontend can
/// do its own thing with it (emit it back out, hand it to a plugin,
/// ...).
pub type DefPragmaHandler = Rc<dyn Fn(&str)>;

/// Fired when `#line` (or `_Pragma`-driven buffer bookkeeping) marks
/// the current buffer as having entered a new file, by name.
pub type EnterFileHandler = Rc<dyn Fn(&str)>;

/// Fired when `#line`'s action operand marks the current buffer as
/// having returned to an including file, by name.
pub type LeaveFileHandler = Rc<dyn Fn(&str)>;

/// Fired when `#line` changes the buffer's reported file name,
/// with the old and new names.
pub type RenameFileHandler = Rc<dyn Fn(&str, &str)>;

/// A single `-D NAME`, `-D NAME=VALUE`, `-U NAME`, `-A PREDICATE(ANSWER)`
/// or `-A -PREDICATE(ANSWER)` given on the command line. Applied
/// through the exact same handlers as the corresponding source-text
/// directive, so a redefinition conflict between `-D` and an early
/// `#define` is diagnosed identically either way.
#[derive(Clone, Debug)]
pub enum CommandLineDirective {
    Define { name: String, value: Option<String> },
    Undef { name: String },
    Assert { predicate: String, answer: String },
    Unassert { predicate: String, answer: Option<String> },
}

/// C dialect, governing only the handful of places the dispatcher
/// itself cares (the `#line` operand range, whether `#assert` is
/// pedantically flagged). Anything else dialect-specific is the
/// macro expander's problem, not dispatch's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    /// K&R / pre-standard: no `#elif`, no `#pragma`, no `#error`.
    Traditional,
    C89,
    C99,
}

impl Dialect {
    /// The largest `#line` operand this dialect accepts before a
    /// pedantic warning (C89 caps at `32767`; C99 widens to
    /// `2147483647`).
    #[must_use]
    pub fn max_line_number(self) -> u32 {
        match self {
            Dialect::Traditional | Dialect::C89 => 32_767,
            Dialect::C99 => 2_147_483_647,
        }
    }
}

/// Dispatcher configuration.
pub struct DirectiveConfig {
    pub dialect: Dialect,
    /// Warn about every use of a directive from an origin stricter
    /// than the active dialect (a C89 build seeing `#elif`, a
    /// non-GNU build seeing `#include_next`).
    pub pedantic: bool,
    /// Warn on `#import`, a deprecated Objective-C-ism.
    pub warn_import: bool,
    pub recursion_limit: usize,
    pub max_buffer_depth: usize,
    /// Directories searched for `#include <...>`, in order.
    pub system_include_dirs: Vec<String>,
    /// Directives synthesized from `-D`/`-U`/`-A`, applied in order
    /// before the primary buffer is processed.
    pub command_line_directives: Vec<CommandLineDirective>,
    pub warning_handler: Option<WarningHandler>,
    /// Outbound callback for an unregistered `#pragma`.
    pub def_pragma_handler: Option<DefPragmaHandler>,
    /// Outbound callback for a `#line`-driven enter-file action.
    pub enter_file_handler: Option<EnterFileHandler>,
    /// Outbound callback for a `#line`-driven leave-file action.
    pub leave_file_handler: Option<LeaveFileHandler>,
    /// Outbound callback for a `#line`-driven file rename.
    pub rename_file_handler: Option<RenameFileHandler>,
}

impl Default for DirectiveConfig {
    fn default() -> Self {
        DirectiveConfig {
            dialect: Dialect::C99,
            pedantic: false,
            warn_import: true,
            recursion_limit: 200,
            max_buffer_depth: 200,
            system_include_dirs: Vec::new(),
            command_line_directives: Vec::new(),
            warning_handler: None,
            def_pragma_handler: None,
            enter_file_handler: None,
            leave_file_handler: None,
            rename_file_handler: None,
        }
    }
}

impl DirectiveConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub fn with_pedantic(mut self, pedantic: bool) -> Self {
        self.pedantic = pedantic;
        self
    }

    #[must_use]
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    #[must_use]
    pub fn with_system_include_dir(mut self, dir: impl Into<String>) -> Self {
        self.system_include_dirs.push(dir.into());
        self
    }

    #[must_use]
    pub fn with_define(mut self, name: impl Into<String>, value: Option<String>) -> Self {
        self.command_line_directives.push(CommandLineDirective::Define {
            name: name.into(),
            value,
        });
        self
    }

    #[must_use]
    pub fn with_undef(mut self, name: impl Into<String>) -> Self {
        self.command_line_directives
            .push(CommandLineDirective::Undef { name: name.into() });
        self
    }

    #[must_use]
    pub fn with_warning_handler(mut self, handler: WarningHandler) -> Self {
        self.warning_handler = Some(handler);
        self
    }

    #[must_use]
    pub fn with_def_pragma_handler(mut self, handler: DefPragmaHandler) -> Self {
        self.def_pragma_handler = Some(handler);
        self
    }

    #[must_use]
    pub fn with_enter_file_handler(mut self, handler: EnterFileHandler) -> Self {
        self.enter_file_handler = Some(handler);
        self
    }

    #[must_use]
    pub fn with_leave_file_handler(mut self, handler: LeaveFileHandler) -> Self {
        self.leave_file_handler = Some(handler);
        self
    }

    #[must_use]
    pub fn with_rename_file_handler(mut self, handler: RenameFileHandler) -> Self {
        self.rename_file_handler = Some(handler);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c89_caps_line_number_lower_than_c99() {
        assert!(Dialect::C89.max_line_number() < Dialect::C99.max_line_number());
    }

    #[test]
    fn builder_accumulates_command_line_directives() {
        let config = DirectiveConfig::new()
            .with_define("DEBUG", Some("1".to_string()))
            .with_undef("NDEBUG");
        assert_eq!(config.command_line_directives.len(), 2);
    }
}
