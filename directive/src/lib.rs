#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # Directive Engine
//!
//! This crate implements the directive-dispatch subsystem of a C
//! preprocessor: recognizing lines that begin with `#`, maintaining the
//! conditional-inclusion stack, the macro and assertion tables, the
//! pragma registry, and the input-buffer stack, and routing each
//! directive to its handler. Raw lexing, macro expansion and `#if`
//! constant-expression evaluation are deliberately left to collaborator
//! traits ([`collab::Lexer`], [`collab::MacroExpander`],
//! [`collab::ExprEvaluator`]) a caller plugs in; this crate owns
//! dispatch, not those subsystems.
//!
//! A bundled reference implementation of all three collaborators is
//! available in [`reference_impl`] for callers (and this crate's own
//! tests) that just need something working, rather than a
//! production-grade C front end's own lexer/expander.
//!
//! ## Example
//!
//! ```rust
//! use directive::{DirectiveConfig, DirectiveProcessor};
//! use directive::reference_impl::{ReferenceEvaluator, ReferenceExpander, ReferenceLexer};
//!
//! let src = "#define PI 3.14\nfloat x = PI;\n";
//! let mut proc = DirectiveProcessor::new(
//!     DirectiveConfig::new(),
//!     ReferenceLexer,
//!     ReferenceExpander::new(),
//!     ReferenceEvaluator,
//! );
//! let out = proc.process("t.c", src).unwrap();
//! assert!(out.contains("3.14"));
//! ```

mod assertions;
mod buffer_stack;
mod c_api;
mod collab;
mod cond_stack;
mod config;
mod context;
mod directive_table;
mod driver;
mod engine;
mod error;
mod ident;
mod macro_def;
mod mi_guard;
mod pragma;
pub mod reference_impl;
mod token;

pub use collab::{
    ExprEvaluator, ExprOutcome, IncludeKind, IncludeResolver, IncludeSearchState, Lexer,
    MacroExpander, ResolvedInclude,
};
pub use config::{
    CommandLineDirective, DefPragmaHandler, Dialect, DirectiveConfig, EnterFileHandler,
    LeaveFileHandler, RenameFileHandler, WarningHandler,
};
pub use context::DirectiveContext;
pub use driver::DirectiveProcessor;
pub use error::{PreprocessError, PreprocessErrorKind, PreprocessErrorPayload};
pub use macro_def::{DefinitionSite, MacroDef};
pub use token::Token;

use std::fs;
use std::path::Path;

use reference_impl::{ReferenceEvaluator, ReferenceExpander, ReferenceLexer};

/// Drive the bundled reference collaborators over `input`, returning the
/// emitted text. Convenience entry point for callers that do not need
/// their own lexer/expander/evaluator; anything else should build a
/// [`DirectiveProcessor`] directly.
///
/// # Errors
/// Returns `PreprocessError` if `input` contains a malformed or
/// unbalanced directive or a macro fails to expand. `#error` does not
/// abort on its own; see [`DirectiveProcessor::warnings`].
pub fn process(file: &str, input: &str, config: DirectiveConfig) -> Result<String, PreprocessError> {
    let mut proc = DirectiveProcessor::new(config, ReferenceLexer, ReferenceExpander::new(), ReferenceEvaluator);
    proc.process(file, input)
}

/// Read `input_path`, run it through [`process`], and write the result
/// to `output_path`.
///
/// # Errors
/// Returns `PreprocessError` if the input file cannot be read, the
/// output file cannot be written, or preprocessing fails.
pub fn process_file<P: AsRef<Path>>(
    input_path: P,
    output_path: P,
    config: DirectiveConfig,
) -> Result<(), PreprocessError> {
    let input_path = input_path.as_ref();
    let input = fs::read_to_string(input_path)
        .map_err(|e| PreprocessError::io_error(input_path.display().to_string(), 0, e))?;
    let file = input_path.display().to_string();
    let output = process(&file, &input, config)?;
    fs::write(output_path.as_ref(), output)
        .map_err(|e| PreprocessError::io_error(file, 0, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_like_macro_end_to_end() {
        let out = process("t.c", "#define PI 3.14\nfloat x = PI;\n", DirectiveConfig::new()).unwrap();
        assert!(out.contains("3.14"));
    }

    #[test]
    fn function_like_macro_end_to_end() {
        let src = "#define ADD(a,b) ((a)+(b))\nint z = ADD(1,2);\n";
        let out = process("t.c", src, DirectiveConfig::new()).unwrap();
        assert!(out.contains("((1)+(2))"));
    }

    #[test]
    fn conditional_compilation_picks_true_branch() {
        let src = "#define DEBUG 1\n#ifdef DEBUG\nint x = 1;\n#else\nint x = 0;\n#endif\n";
        let out = process("t.c", src, DirectiveConfig::new()).unwrap();
        assert!(out.contains("int x = 1;"));
        assert!(!out.contains("int x = 0;"));
    }

    #[test]
    fn pragma_once_elides_second_include() {
        let resolver: IncludeResolver = std::rc::Rc::new(|path, _kind, _state| {
            if path == "header.h" {
                Some(ResolvedInclude {
                    canonical_path: "header.h".to_string(),
                    contents: "#pragma once\nint x = 42;\n".to_string(),
                })
            } else {
                None
            }
        });
        let mut proc = DirectiveProcessor::new(
            DirectiveConfig::new(),
            ReferenceLexer,
            ReferenceExpander::new(),
            ReferenceEvaluator,
        )
        .with_include_resolver(resolver);
        let src = "#include \"header.h\"\n#include \"header.h\"\nint y = 1;\n";
        let out = proc.process("t.c", src).unwrap();
        assert_eq!(out.matches("int x = 42;").count(), 1);
    }

    #[test]
    fn multiple_inclusion_guard_elides_repeat_scan() {
        let resolver: IncludeResolver = std::rc::Rc::new(|path, _kind, _state| {
            if path == "guarded.h" {
                Some(ResolvedInclude {
                    canonical_path: "guarded.h".to_string(),
                    contents: "#ifndef GUARDED_H\n#define GUARDED_H\nint x = 1;\n#endif\n".to_string(),
                })
            } else {
                None
            }
        });
        let mut proc = DirectiveProcessor::new(
            DirectiveConfig::new(),
            ReferenceLexer,
            ReferenceExpander::new(),
            ReferenceEvaluator,
        )
        .with_include_resolver(resolver);
        let src = "#include \"guarded.h\"\n#include \"guarded.h\"\n";
        let out = proc.process("t.c", src).unwrap();
        assert_eq!(out.matches("int x = 1;").count(), 1);
    }

    #[test]
    fn error_directive_is_collected_not_fatal() {
        let mut proc = DirectiveProcessor::new(
            DirectiveConfig::new(),
            ReferenceLexer,
            ReferenceExpander::new(),
            ReferenceEvaluator,
        );
        let out = proc.process("t.c", "#error boom\nint x;\n").unwrap();
        assert!(out.contains("int x;"));
        assert!(proc.warnings().iter().any(|w| format!("{w}").contains("boom")));
    }

    #[test]
    fn elif_chain_picks_only_first_true_branch() {
        let src = "#if 0\na\n#elif 1\nb\n#elif 1\nc\n#endif\n";
        let out = process("t.c", src, DirectiveConfig::new()).unwrap();
        assert!(out.contains('b'));
        assert!(!out.contains('a'));
        assert!(!out.contains('c'));
    }

    #[test]
    fn poison_blocks_further_use() {
        let src = "#pragma GCC poison strcpy\nchar *s = strcpy(a, b);\n";
        let err = process("t.c", src, DirectiveConfig::new());
        // the bundled reference collaborators do not themselves enforce
        // poisoning on text lines (that is the expander's job); this
        // exercises that poisoning state is at least recorded without
        // aborting dispatch.
        assert!(err.is_ok());
    }

    #[test]
    fn command_line_define_is_visible_to_source() {
        let config = DirectiveConfig::new().with_define("DEBUG", Some("1".to_string()));
        let out = process("t.c", "#ifdef DEBUG\nint x = 1;\n#endif\n", config).unwrap();
        assert!(out.contains("int x = 1;"));
    }
}
