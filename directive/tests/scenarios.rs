//! End-to-end scenarios exercising the dispatcher through the bundled
//! reference collaborators, one test per numbered scenario plus the
//! boundary cases.

use std::rc::Rc;

use directive::reference_impl::{ReferenceEvaluator, ReferenceExpander, ReferenceLexer};
use directive::{Dialect, DirectiveConfig, DirectiveProcessor, IncludeResolver, ResolvedInclude};

fn new_processor() -> DirectiveProcessor<ReferenceLexer, ReferenceExpander, ReferenceEvaluator> {
    DirectiveProcessor::new(
        DirectiveConfig::new(),
        ReferenceLexer,
        ReferenceExpander::new(),
        ReferenceEvaluator,
    )
}

#[test]
fn scenario_1_mi_guard_elides_second_inclusion() {
    let resolver: IncludeResolver = Rc::new(|path, _kind, _state| {
        if path == "foo.h" {
            Some(ResolvedInclude {
                canonical_path: "foo.h".to_string(),
                contents: "#ifndef FOO\n#define FOO\nint x;\n#endif\n".to_string(),
            })
        } else {
            None
        }
    });
    let mut proc = new_processor().with_include_resolver(resolver);
    let src = "#include \"foo.h\"\n#include \"foo.h\"\n";
    let out = proc.process("t.c", src).unwrap();
    assert_eq!(out.matches("int x;").count(), 1);
}

#[test]
fn scenario_2_false_branch_is_not_parsed_as_define() {
    let src = "#if 0\n#define A 1\n#else\n#define A 2\n#endif\nint y = A;\n";
    let out = directive::process("t.c", src, DirectiveConfig::new()).unwrap();
    assert!(out.contains("int y = 2;"));
}

#[test]
fn scenario_3_elif_chain_emits_only_first_true_branch() {
    let src = "#if 1\nx\n#elif 1\ny\n#else\nz\n#endif\n";
    let out = directive::process("t.c", src, DirectiveConfig::new()).unwrap();
    assert!(out.contains('x'));
    assert!(!out.contains('y'));
    assert!(!out.contains('z'));
}

#[test]
fn scenario_4_macro_expanded_header_name_reaches_resolver() {
    let seen = Rc::new(std::cell::RefCell::new(None));
    let seen_clone = seen.clone();
    let resolver: IncludeResolver = Rc::new(move |path, kind, _state| {
        *seen_clone.borrow_mut() = Some((path.to_string(), kind));
        Some(ResolvedInclude {
            canonical_path: path.to_string(),
            contents: String::new(),
        })
    });
    let mut proc = new_processor().with_include_resolver(resolver);
    let src = "#define FOO <a.h>\n#include FOO\n";
    proc.process("t.c", src).unwrap();
    let (path, kind) = seen.borrow().clone().expect("resolver should have been called");
    assert_eq!(path, "a.h");
    assert_eq!(kind, directive::IncludeKind::Angled);
}

#[test]
fn scenario_5_poison_blocks_and_frees_existing_macro() {
    let src = "#define bad 1\n#pragma GCC poison bad\n";
    let mut proc = new_processor();
    proc.process("t.c", src).unwrap();
    assert!(proc
        .warnings()
        .iter()
        .any(|w| format!("{w}").contains("poisoning existing macro")));
}

#[test]
fn scenario_6_pragma_operator_matches_directive_form() {
    let via_directive = directive::process("t.c", "#pragma GCC poison q\n", DirectiveConfig::new());
    let via_operator = directive::process(
        "t.c",
        "_Pragma(\"GCC poison q\")\n",
        DirectiveConfig::new(),
    );
    assert_eq!(via_directive.is_ok(), via_operator.is_ok());
}

#[test]
fn boundary_line_zero_is_pedantically_flagged() {
    let config = DirectiveConfig::new().with_pedantic(true);
    let mut proc = DirectiveProcessor::new(
        config,
        ReferenceLexer,
        ReferenceExpander::new(),
        ReferenceEvaluator,
    );
    proc.process("t.c", "#line 0\n").unwrap();
    assert!(proc.warnings().iter().any(|w| format!("{w}").contains("line")));
}

#[test]
fn boundary_line_number_beyond_c99_cap_warns() {
    let config = DirectiveConfig::new().with_dialect(Dialect::C99).with_pedantic(true);
    let mut proc = DirectiveProcessor::new(
        config,
        ReferenceLexer,
        ReferenceExpander::new(),
        ReferenceEvaluator,
    );
    proc.process("t.c", "#line 2147483648\n").unwrap();
    assert!(!proc.warnings().is_empty());
}

#[test]
fn boundary_include_next_in_primary_file_warns() {
    let resolver: IncludeResolver = Rc::new(|path, _kind, _state| {
        Some(ResolvedInclude {
            canonical_path: path.to_string(),
            contents: String::new(),
        })
    });
    let mut proc = new_processor().with_include_resolver(resolver);
    proc.process("t.c", "#include_next \"a.h\"\n").unwrap();
    assert!(proc
        .warnings()
        .iter()
        .any(|w| format!("{w}").contains("include_next")));
}

#[test]
fn invariant_unbalanced_conditional_is_reported_at_opening_position() {
    let err = directive::process("t.c", "#if 1\nint x;\n", DirectiveConfig::new()).unwrap_err();
    assert_eq!(err.line(), 1);
}

#[test]
fn invariant_assertion_round_trips_through_assert_and_unassert() {
    let mut proc = new_processor();
    proc.process("t.c", "#assert p(a)\n").unwrap();
    assert!(proc.is_asserted("p"));
    proc.process("t.c", "#unassert p(a)\n").unwrap();
    assert!(!proc.is_asserted("p"));
}
