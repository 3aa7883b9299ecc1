//! Stateless helpers used by the dispatcher: `_Pragma` destringizing,
//! header-name text reconstruction, caret-column calculation, and the
//! registration of the built-in pragmas (`once`, `GCC poison`, `GCC
//! system_header`, `GCC dependency`).

use std::rc::Rc;

use crate::context::DirectiveContext;
use crate::error::PreprocessError;
use crate::pragma::PragmaRegistry;
use crate::token::Token;

/// Undo the one level of backslash-escaping `_Pragma`'s string-literal
/// operand carries: a literal `\"` becomes `"` and a literal `\\`
/// becomes `\`, nothing else is touched.
#[must_use]
pub fn destringize(spelling: &str) -> String {
    let mut out = String::with_capacity(spelling.len());
    let mut chars = spelling.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('"') | Some('\\') => {
                    out.push(chars.next().unwrap());
                }
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Re-spell a header-name token the way it appeared in source, for
/// diagnostics and for resolvers that want the raw text.
#[must_use]
pub fn header_name_text(spelling: &str, angled: bool) -> String {
    if angled {
        format!("<{spelling}>")
    } else {
        format!("\"{spelling}\"")
    }
}

/// Compute a 1-based caret column for the token at byte offset
/// `byte_offset` within `line`, accounting for the possibility that
/// earlier bytes are multi-byte UTF-8.
#[must_use]
pub fn caret_column(line: &str, byte_offset: usize) -> usize {
    line.get(..byte_offset.min(line.len()))
        .map(|prefix| prefix.chars().count() + 1)
        .unwrap_or(1)
}

/// Convert a run of tokens back to a single string with single spaces
/// between tokens that need separation, used to render `#pragma`
/// lookahead text and `#line` filename operands in diagnostics.
#[must_use]
pub fn tokens_to_text(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::spelling)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splice backslash-newline continuations, producing logical lines
/// paired with how many physical lines each one swallowed (always at
/// least 1), so the dispatcher can keep `current_line` accurate for
/// diagnostics and `__LINE__` without re-scanning the original text.
#[must_use]
pub fn splice_lines(input: &str) -> Vec<(String, usize)> {
    let physical: Vec<&str> = input.lines().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < physical.len() {
        let mut logical = physical[i].to_string();
        let mut consumed = 1;
        while logical.ends_with('\\') {
            logical.pop();
            i += 1;
            consumed += 1;
            if i >= physical.len() {
                break;
            }
            logical.push_str(physical[i]);
        }
        out.push((logical, consumed));
        i += 1;
    }
    out
}

/// Register the directive-table-independent built-in pragmas every
/// dispatcher instance carries regardless of configuration: `once` and
/// `poison` at the root (`#pragma poison` is accepted as a plain
/// synonym for `#pragma GCC poison`), and `poison`/`system_header`/
/// `dependency` under `GCC`.
///
/// The handlers here only validate that the pragma resolves; the
/// dispatcher's own `#pragma` handler is what actually mutates
/// context state (poisoning names, marking a file as once-only),
/// since that state lives on [`DirectiveContext`], not the registry.
pub fn register_builtin_pragmas(registry: &mut PragmaRegistry) {
    let _ = registry.register_root("once", Rc::new(|_args| Ok(())));
    let _ = registry.register_root("poison", Rc::new(|_args| Ok(())));
    let _ = registry.register_namespaced("GCC", "poison", Rc::new(|_args| Ok(())));
    let _ = registry.register_namespaced("GCC", "system_header", Rc::new(|_args| Ok(())));
    let _ = registry.register_namespaced("GCC", "dependency", Rc::new(|_args| Ok(())));
}

/// Apply `#pragma GCC poison NAME...` to the context: every named
/// identifier is marked poisoned, and if it currently has a macro
/// definition that definition is removed (with a warning), matching
/// the rule that poisoning an already-defined macro is allowed but
/// noisy.
pub fn poison_names(ctx: &mut DirectiveContext, names: &[String]) -> Vec<PreprocessError> {
    let mut warnings = Vec::new();
    for name in names {
        if ctx.is_macro_defined(name) {
            warnings.push(PreprocessError::warning(
                ctx.current_file(),
                ctx.current_line(),
                format!("poisoning existing macro \"{name}\""),
            ));
            ctx.undef_macro(name);
        }
        ctx.poison(name);
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destringize_unescapes_quotes_and_backslashes() {
        assert_eq!(destringize(r#"\"hello\\world\""#), "\"hello\\world\"");
    }

    #[test]
    fn destringize_leaves_lone_backslash_alone() {
        assert_eq!(destringize(r"a\nb"), "a\\nb");
    }

    #[test]
    fn caret_column_counts_chars_not_bytes() {
        // "héllo" - é is 2 bytes but 1 char.
        let line = "héllo x";
        let byte_offset = line.find('x').unwrap();
        assert_eq!(caret_column(line, byte_offset), 7);
    }

    #[test]
    fn header_name_text_respects_angled_flag() {
        assert_eq!(header_name_text("a.h", true), "<a.h>");
        assert_eq!(header_name_text("a.h", false), "\"a.h\"");
    }

    #[test]
    fn splice_joins_backslash_continuations() {
        let spliced = splice_lines("#define FOO 1 + \\\n2\nint x;");
        assert_eq!(spliced[0].0, "#define FOO 1 + 2");
        assert_eq!(spliced[0].1, 2);
        assert_eq!(spliced[1].0, "int x;");
        assert_eq!(spliced[1].1, 1);
    }

    #[test]
    fn splice_handles_no_continuations() {
        let spliced = splice_lines("a\nb\nc");
        assert_eq!(spliced.len(), 3);
        assert!(spliced.iter().all(|(_, n)| *n == 1));
    }
}
