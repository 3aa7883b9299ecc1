//! The public dispatcher: drives the collaborator contracts over an
//! input buffer, maintaining the conditional-inclusion stack, macro
//! table, multiple-inclusion guard and pragma registry as it goes.

use std::collections::HashSet;
use std::rc::Rc;

use crate::buffer_stack::BufferOrigin;
use crate::cond_stack::{FrameOrigin, IfFrame, Skipping};
use crate::collab::{ExprEvaluator, IncludeKind, IncludeResolver, IncludeSearchState, Lexer, MacroExpander};
use crate::config::{CommandLineDirective, DirectiveConfig};
use crate::context::DirectiveContext;
use crate::directive_table::{self, DirectiveFlags};
use crate::engine;
use crate::error::PreprocessError;
use crate::macro_def::MacroDef;
use crate::token::Token;

/// The dispatcher's public API.
///
/// Generic over the three collaborator contracts so a caller pays no
/// vtable indirection when everything is known at compile time, while
/// still being free to box a collaborator behind `dyn Trait` if it
/// needs to swap implementations at runtime.
pub struct DirectiveProcessor<L, M, E>
where
    L: Lexer,
    M: MacroExpander,
    E: ExprEvaluator,
{
    pub context: DirectiveContext,
    lexer: L,
    expander: M,
    evaluator: E,
    include_resolver: Option<IncludeResolver>,
    /// Canonical paths of files that should be skipped on any further
    /// `#include`, either because they contained `#pragma once` or
    /// because their whole body matched the multiple-inclusion guard
    /// idiom.
    once_included: HashSet<String>,
    warnings: Vec<PreprocessError>,
}

impl<L, M, E> DirectiveProcessor<L, M, E>
where
    L: Lexer,
    M: MacroExpander,
    E: ExprEvaluator,
{
    #[must_use]
    pub fn new(config: DirectiveConfig, lexer: L, expander: M, evaluator: E) -> Self {
        DirectiveProcessor {
            context: DirectiveContext::new(config),
            lexer,
            expander,
            evaluator,
            include_resolver: None,
            once_included: HashSet::new(),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_include_resolver(mut self, resolver: IncludeResolver) -> Self {
        self.include_resolver = Some(resolver);
        self
    }

    /// Non-fatal diagnostics collected so far: `Warning`/`Pedwarn`
    /// severity, plus `#error` (which is `Error` severity but, unlike
    /// a malformed directive, never aborts the run on its own).
    #[must_use]
    pub fn warnings(&self) -> &[PreprocessError] {
        &self.warnings
    }

    fn record_warning(&mut self, warning: Option<PreprocessError>) {
        if let Some(w) = warning {
            self.warnings.push(w);
        }
    }

    /// Apply the configured `-D`/`-U`/`-A` command-line directives
    /// through the same handlers as source text, before any buffer is
    /// entered.
    fn apply_command_line(&mut self) -> Result<(), PreprocessError> {
        let directives = self.context.config.command_line_directives.clone();
        for directive in directives {
            match directive {
                CommandLineDirective::Define { name, value } => {
                    let spelling = format!("{name} {}", value.unwrap_or_else(|| "1".to_string()));
                    let tokens = self.lexer.tokenize_directive_operand(&spelling);
                    self.handle_define_tokens(&tokens)?;
                }
                CommandLineDirective::Undef { name } => {
                    let warning = self.context.undef_macro(&name);
                    self.record_warning(warning);
                }
                CommandLineDirective::Assert { predicate, answer } => {
                    let tokens = self.lexer.tokenize_directive_operand(&answer);
                    self.context.assertions.assert(&predicate, tokens);
                }
                CommandLineDirective::Unassert { predicate, answer } => {
                    let tokens = answer.map(|a| self.lexer.tokenize_directive_operand(&a));
                    self.context.assertions.unassert(&predicate, tokens.as_deref());
                }
            }
        }
        Ok(())
    }

    /// Process `input` as the named primary source file, returning
    /// the emitted text.
    pub fn process(&mut self, file: &str, input: &str) -> Result<String, PreprocessError> {
        self.apply_command_line()?;
        self.context.enter_buffer(file.to_string(), BufferOrigin::Primary)?;
        let result = self.process_current_buffer(input);
        let (_, balance) = self.context.buffers.pop().expect("buffer just pushed");
        let text = result?;
        balance?;
        Ok(text)
    }

    fn process_current_buffer(&mut self, input: &str) -> Result<String, PreprocessError> {
        let lines = engine::splice_lines(input);
        let mut output = String::new();

        for (logical_line, physical_count) in &lines {
            {
                let buf = self.context.buffers.top_mut().expect("buffer active");
                buf.current_line += physical_count;
            }
            let trimmed = logical_line.trim_start();
            if let Some(rest) = trimmed.strip_prefix('#') {
                if let Some(included_text) = self.handle_directive_line(rest.trim_start(), logical_line)? {
                    output.push_str(&included_text);
                }
            } else if !trimmed.is_empty() {
                let buf = self.context.buffers.top().expect("buffer active");
                let should_emit = buf.cond_stack.should_emit();
                if buf.cond_stack.depth() == 0 {
                    self.context
                        .buffers
                        .top_mut()
                        .expect("buffer active")
                        .mi_guard
                        .on_top_level_text();
                }
                if should_emit {
                    let tokens = self.lexer.tokenize_text_line(logical_line);
                    let macros = &self.context.macros;
                    let expanded = self
                        .expander
                        .expand(&tokens, &|name| macros.get(name).cloned())?;
                    let remaining = self.run_pragma_operators(&expanded, logical_line)?;
                    if !remaining.is_empty() {
                        output.push_str(&engine::tokens_to_text(&remaining));
                        output.push('\n');
                    }
                }
            }
        }
        Ok(output)
    }

    fn directive_error(&self, directive: &str, line: &str) -> PreprocessError {
        let column = self
            .lexer
            .locate(line, directive)
            .map(|off| engine::caret_column(line, off))
            .unwrap_or(1);
        PreprocessError::malformed_directive(
            self.context.current_file(),
            self.context.current_line(),
            directive.to_string(),
        )
        .with_column(column)
        .with_source_line(line.to_string())
    }

    /// Dispatch one directive line. Returns `Some(text)` when the
    /// directive itself produced emittable output (only `#include`
    /// does: the nested buffer's own emitted lines).
    fn handle_directive_line(
        &mut self,
        rest: &str,
        full_line: &str,
    ) -> Result<Option<String>, PreprocessError> {
        let (name, operand) = split_directive_name(rest);
        if name.is_empty() {
            // A lone `#` on a line is a null directive, valid and a no-op.
            return Ok(None);
        }
        log::trace!(
            "{}:{}: dispatching #{name}",
            self.context.current_file(),
            self.context.current_line()
        );
        let info = directive_table::lookup(name);
        let currently_emitting = self
            .context
            .buffers
            .top()
            .expect("buffer active")
            .cond_stack
            .should_emit();

        match info {
            None => {
                if currently_emitting {
                    return Err(self.directive_error(name, full_line));
                }
                Ok(None)
            }
            Some(info) => {
                let must_run = info.flags.contains(DirectiveFlags::COND);
                if !currently_emitting && !must_run {
                    return Ok(None);
                }
                self.dispatch(name, operand, full_line, currently_emitting)
            }
        }
    }

    fn dispatch(
        &mut self,
        name: &str,
        operand: &str,
        full_line: &str,
        currently_emitting: bool,
    ) -> Result<Option<String>, PreprocessError> {
        match name {
            "if" | "ifdef" | "ifndef" => {
                self.handle_if_family(name, operand, currently_emitting, full_line)?;
                Ok(None)
            }
            "elif" => {
                self.handle_elif(operand, full_line)?;
                Ok(None)
            }
            "else" => {
                self.handle_else(full_line)?;
                Ok(None)
            }
            "endif" => {
                self.handle_endif(full_line)?;
                Ok(None)
            }
            "define" if currently_emitting => {
                let tokens = self.lexer.tokenize_directive_operand(operand);
                self.handle_define_tokens(&tokens)?;
                Ok(None)
            }
            "undef" if currently_emitting => {
                let target = operand.trim();
                if target.is_empty() {
                    return Err(self.directive_error("undef", full_line));
                }
                let warning = self.context.undef_macro(target);
                self.record_warning(warning);
                Ok(None)
            }
            "include" | "include_next" | "import" if currently_emitting => {
                self.handle_include(name, operand, full_line).map(Some)
            }
            "error" => {
                self.warnings.push(PreprocessError::other(
                    self.context.current_file(),
                    self.context.current_line(),
                    format!("#error {}", operand.trim()),
                ));
                Ok(None)
            }
            "warning" => {
                self.warnings.push(PreprocessError::warning(
                    self.context.current_file(),
                    self.context.current_line(),
                    format!("#warning {}", operand.trim()),
                ));
                Ok(None)
            }
            "line" if currently_emitting => {
                self.handle_line(operand, full_line)?;
                Ok(None)
            }
            "pragma" if currently_emitting => {
                self.handle_pragma(operand, full_line)?;
                Ok(None)
            }
            "ident" | "sccs" => Ok(None),
            "assert" if currently_emitting => {
                self.handle_assert(operand, full_line)?;
                Ok(None)
            }
            "unassert" if currently_emitting => {
                self.handle_unassert(operand)?;
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn handle_if_family(
        &mut self,
        name: &str,
        operand: &str,
        currently_emitting: bool,
        full_line: &str,
    ) -> Result<(), PreprocessError> {
        let depth_before = self.context.buffers.top().unwrap().cond_stack.depth();
        let (taken, origin, mi_candidate) = if !currently_emitting {
            (false, frame_origin(name), None)
        } else {
            match name {
                "ifdef" | "ifndef" => {
                    let ident = operand.trim();
                    if ident.is_empty() {
                        return Err(self.directive_error(name, full_line));
                    }
                    let defined = self.context.is_macro_defined(ident);
                    let truth = if name == "ifdef" { defined } else { !defined };
                    let mi = if name == "ifndef" { Some(ident.to_string()) } else { None };
                    (truth, frame_origin(name), mi)
                }
                "if" => {
                    let tokens = self.lexer.tokenize_directive_operand(operand);
                    let macros = &self.context.macros;
                    let outcome = self.evaluator.eval(&tokens, &|n| macros.contains_key(n))?;
                    (outcome.is_true(), FrameOrigin::If, outcome.not_defined_candidate)
                }
                _ => unreachable!(),
            }
        };
        let file = self.context.current_file();
        let line = self.context.current_line();
        let mut frame = IfFrame::new(origin, taken, file, line);
        frame.mi_candidate = mi_candidate.clone();
        let buf = self.context.buffers.top_mut().unwrap();
        buf.cond_stack.push(frame);
        match &mi_candidate {
            Some(guard_name) => buf.mi_guard.on_outer_ifndef(depth_before, guard_name),
            None => buf.mi_guard.on_other_conditional_open(depth_before),
        }
        Ok(())
    }

    fn handle_elif(&mut self, operand: &str, full_line: &str) -> Result<(), PreprocessError> {
        let buf = self.context.buffers.top().unwrap();
        let frame_was_skip_branch = matches!(buf.cond_stack.top().map(|f| f.state), Some(Skipping::SkipBranch));
        // Only worth evaluating if entering this frame was not itself
        // already skipping; otherwise no result could ever take
        // effect, and evaluating it risks a spurious diagnostic from
        // a malformed expression in dead code.
        let enclosing_emits = buf.cond_stack.enclosing_emits();
        let truth = if frame_was_skip_branch && enclosing_emits {
            let tokens = self.lexer.tokenize_directive_operand(operand);
            let macros = &self.context.macros;
            self.evaluator.eval(&tokens, &|n| macros.contains_key(n))?.is_true()
        } else {
            false
        };
        let file = self.context.current_file();
        let line = self.context.current_line();
        let buf = self.context.buffers.top_mut().unwrap();
        buf.cond_stack
            .elif(truth, &file, line)
            .map_err(|_| self.directive_error("elif", full_line))
    }

    fn handle_else(&mut self, full_line: &str) -> Result<(), PreprocessError> {
        let file = self.context.current_file();
        let line = self.context.current_line();
        let buf = self.context.buffers.top_mut().unwrap();
        buf.cond_stack
            .else_branch(&file, line)
            .map_err(|_| self.directive_error("else", full_line))
    }

    fn handle_endif(&mut self, full_line: &str) -> Result<(), PreprocessError> {
        let file = self.context.current_file();
        let line = self.context.current_line();
        let buf = self.context.buffers.top_mut().unwrap();
        buf.cond_stack
            .endif(&file, line)
            .map_err(|_| self.directive_error("endif", full_line))?;
        let remaining = buf.cond_stack.depth();
        buf.mi_guard.on_outer_endif(remaining);
        Ok(())
    }

    fn handle_define_tokens(&mut self, tokens: &[Token]) -> Result<(), PreprocessError> {
        let tokens = strip_leading_whitespace(tokens);
        let mut iter = tokens.iter();
        let name = match iter.next() {
            Some(Token::Identifier(n)) => n.clone(),
            _ => {
                return Err(PreprocessError::malformed_directive(
                    self.context.current_file(),
                    self.context.current_line(),
                    "define".to_string(),
                ));
            }
        };
        let rest: Vec<Token> = iter.cloned().collect();
        let (params, is_variadic, body) = if rest.first().is_some_and(|t| t.is_punct("(")) {
            parse_param_list(&rest)
        } else {
            (None, false, strip_leading_whitespace(&rest))
        };
        let depth = self.context.buffers.top().unwrap().cond_stack.depth();
        self.context.buffers.top_mut().unwrap().mi_guard.on_define(depth, &name);
        let site = self.context.definition_site_here();
        let def = MacroDef {
            name: name.clone(),
            params,
            body: Rc::new(body),
            is_variadic,
            definition_site: site,
            is_builtin: false,
        };
        let warning = self.context.define_macro(def);
        self.record_warning(warning);
        Ok(())
    }

    fn handle_include(&mut self, name: &str, operand: &str, full_line: &str) -> Result<String, PreprocessError> {
        let operand = operand.trim();
        let in_primary_file = matches!(
            self.context.buffers.top().map(|b| b.origin),
            Some(BufferOrigin::Primary)
        );
        if name == "include_next" && in_primary_file {
            self.warnings.push(PreprocessError::warning(
                self.context.current_file(),
                self.context.current_line(),
                "#include_next in primary source file; falling back to the full search path"
                    .to_string(),
            ));
        }
        if name == "import" && self.context.config.warn_import {
            self.warnings.push(PreprocessError::warning(
                self.context.current_file(),
                self.context.current_line(),
                "#import is a deprecated Objective-C extension; use #include with #pragma once"
                    .to_string(),
            ));
        }
        self.context
            .buffers
            .top_mut()
            .unwrap()
            .mi_guard
            .on_include_before_confirmed();
        let header = match self.lexer.tokenize_header_name(operand) {
            Some(header) => header,
            None => {
                // The operand wasn't a literal `<...>`/`"..."` header
                // name; macro-expand it and retry, the way `#include
                // FOO` with `#define FOO <a.h>` is required to work.
                let tokens = self.lexer.tokenize_directive_operand(operand);
                let macros = &self.context.macros;
                let expanded = self.expander.expand(&tokens, &|n| macros.get(n).cloned())?;
                let rejoined: String = expanded.iter().map(Token::spelling).collect();
                self.lexer
                    .tokenize_header_name(rejoined.trim())
                    .ok_or_else(|| self.directive_error(name, full_line))?
            }
        };
        let (spelling, angled) = match header {
            Token::HeaderName { spelling, angled } => (spelling, angled),
            _ => return Err(self.directive_error(name, full_line)),
        };
        let kind = if angled { IncludeKind::Angled } else { IncludeKind::Quote };
        let resolver = self.include_resolver.clone().ok_or_else(|| {
            PreprocessError::include_not_found(self.context.current_file(), self.context.current_line(), spelling.clone())
        })?;
        let search_state = IncludeSearchState {
            include_stack: self
                .context
                .buffers
                .top()
                .map(|b| vec![b.file.clone()])
                .unwrap_or_default(),
            resume_search: name == "include_next" && !in_primary_file,
        };
        let resolved = resolver(&spelling, kind, &search_state).ok_or_else(|| {
            PreprocessError::include_not_found(self.context.current_file(), self.context.current_line(), spelling.clone())
        })?;
        if self.once_included.contains(&resolved.canonical_path) {
            return Ok(String::new());
        }
        if self.context.buffers.contains_file(&resolved.canonical_path) {
            return Err(PreprocessError::other(
                self.context.current_file(),
                self.context.current_line(),
                format!("circular include of \"{}\"", resolved.canonical_path),
            ));
        }
        self.context
            .enter_buffer(resolved.canonical_path.clone(), BufferOrigin::Included)?;
        let nested = self.process_current_buffer(&resolved.contents);
        let (mut popped, balance) = self.context.buffers.pop().expect("buffer just pushed");
        balance?;
        popped.mi_guard.finalize();
        if popped.mi_guard.completed_guard_name().is_some() {
            self.once_included.insert(popped.file.clone());
        }
        nested
    }

    /// `#line NUMBER ["FILENAME" [ACTION [ACTION]]]`. The action
    /// operands mark *enter file* (1), *leave file* (2), *system
    /// header* (3), and *system header with extern-C implied* (4).
    /// Actions 1 and 2 both clear the buffer's system-header flag
    /// despite their names — that quirk is inherited from the
    /// original `cpp_make_system_header(…, 0)` call both share — while
    /// 3 and 4 set it.
    fn handle_line(&mut self, operand: &str, full_line: &str) -> Result<(), PreprocessError> {
        let tokens: Vec<Token> = self
            .lexer
            .tokenize_directive_operand(operand)
            .into_iter()
            .filter(|t| !matches!(t, Token::Whitespace))
            .collect();
        let mut iter = tokens.iter();
        let number: u32 = match iter.next() {
            Some(Token::Number(n)) => n.parse().map_err(|_| self.directive_error("line", full_line))?,
            _ => return Err(self.directive_error("line", full_line)),
        };
        if number == 0 || number > self.context.config.dialect.max_line_number() {
            self.warnings.push(PreprocessError::pedwarn(
                self.context.current_file(),
                self.context.current_line(),
                format!("line number \"{number}\" out of range"),
            ));
        }
        let mut next = iter.next();
        if let Some(Token::StringLiteral(filename)) = next {
            let buf = self.context.buffers.top_mut().unwrap();
            if &buf.file != filename {
                let old_name = std::mem::replace(&mut buf.file, filename.clone());
                if let Some(handler) = self.context.config.rename_file_handler.clone() {
                    handler(&old_name, filename);
                }
            }
            next = iter.next();
        }
        while let Some(Token::Number(action)) = next {
            match action.as_str() {
                "1" => {
                    self.context.buffers.top_mut().unwrap().system_header = false;
                    if let Some(handler) = self.context.config.enter_file_handler.clone() {
                        handler(&self.context.current_file());
                    }
                }
                "2" => {
                    self.context.buffers.top_mut().unwrap().system_header = false;
                    if let Some(handler) = self.context.config.leave_file_handler.clone() {
                        handler(&self.context.current_file());
                    }
                }
                "3" | "4" => {
                    self.context.buffers.top_mut().unwrap().system_header = true;
                }
                _ => return Err(self.directive_error("line", full_line)),
            }
            next = iter.next();
        }
        self.context.buffers.top_mut().unwrap().current_line = number as usize;
        Ok(())
    }

    fn handle_pragma(&mut self, operand: &str, full_line: &str) -> Result<(), PreprocessError> {
        let tokens = self.lexer.tokenize_directive_operand(operand);
        let names: Vec<String> = tokens
            .iter()
            .filter_map(|t| t.as_identifier().map(str::to_string))
            .collect();
        let first = match names.first() {
            Some(first) => first,
            None => return Err(self.directive_error("pragma", full_line)),
        };

        if self.context.pragmas.has_namespace(first) && names.len() > 1 {
            let leaf = names[1].clone();
            if let Some(handler) = self.context.pragmas.lookup_namespaced(first, &leaf) {
                handler(&names[2..]).map_err(|_| self.directive_error("pragma", full_line))?;
                if first == "GCC" && leaf == "poison" {
                    let warnings = engine::poison_names(&mut self.context, &names[2..]);
                    self.warnings.extend(warnings);
                } else if first == "GCC" && leaf == "system_header" {
                    self.handle_system_header_pragma(full_line)?;
                }
                return Ok(());
            }
        }

        if let Some(handler) = self.context.pragmas.lookup_root(first) {
            handler(&names[1..]).map_err(|_| self.directive_error("pragma", full_line))?;
            if first == "once" {
                self.warnings.push(PreprocessError::warning(
                    self.context.current_file(),
                    self.context.current_line(),
                    "#pragma once is obsolete".to_string(),
                ));
                if let Some(file) = self.context.buffers.top().map(|b| b.file.clone()) {
                    self.once_included.insert(file);
                }
            } else if first == "poison" {
                let warnings = engine::poison_names(&mut self.context, &names[1..]);
                self.warnings.extend(warnings);
            }
            return Ok(());
        }

        // No registered handler at any level: abandon the lookahead
        // and hand the pragma to the frontend verbatim rather than
        // diagnosing it as malformed.
        if let Some(handler) = self.context.config.def_pragma_handler.clone() {
            handler(full_line.trim());
        }
        Ok(())
    }

    fn handle_system_header_pragma(&mut self, full_line: &str) -> Result<(), PreprocessError> {
        let origin = self.context.buffers.top().unwrap().origin;
        if origin == BufferOrigin::Primary {
            return Err(self.directive_error("pragma", full_line));
        }
        self.context.buffers.top_mut().unwrap().system_header = true;
        Ok(())
    }

    /// Find and run every `_Pragma("...")` invocation left in an
    /// already-macro-expanded text line, dispatching each one through
    /// the same handler `#pragma` uses. `_Pragma` is not itself a
    /// directive: it is recognized post-expansion so that a macro
    /// expanding to `_Pragma(...)` (the classic `#define DO_PRAGMA(x)
    /// _Pragma(#x)` idiom) is handled identically to one written
    /// literally. Emits no line marker: the construct is dropped from
    /// the returned tokens, whether or not anything else was on the
    /// line.
    fn run_pragma_operators(
        &mut self,
        tokens: &[Token],
        full_line: &str,
    ) -> Result<Vec<Token>, PreprocessError> {
        let mut remaining = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            if tokens[i].as_identifier() == Some("_Pragma") {
                if let Some((payload, consumed)) = parse_pragma_operator_call(&tokens[i + 1..]) {
                    let destringized = engine::destringize(&payload);
                    self.handle_pragma(&destringized, full_line)?;
                    i += 1 + consumed;
                    continue;
                }
            }
            remaining.push(tokens[i].clone());
            i += 1;
        }
        Ok(remaining)
    }

    fn handle_assert(&mut self, operand: &str, full_line: &str) -> Result<(), PreprocessError> {
        let (predicate, answer_text) =
            parse_predicate_answer(operand).ok_or_else(|| self.directive_error("assert", full_line))?;
        let tokens = self.lexer.tokenize_directive_operand(&answer_text);
        self.context.assertions.assert(&predicate, tokens);
        Ok(())
    }

    fn handle_unassert(&mut self, operand: &str) -> Result<(), PreprocessError> {
        match parse_predicate_answer(operand) {
            Some((predicate, answer_text)) => {
                let tokens = self.lexer.tokenize_directive_operand(&answer_text);
                self.context.assertions.unassert(&predicate, Some(&tokens));
            }
            None => {
                self.context.assertions.unassert(operand.trim(), None);
            }
        }
        Ok(())
    }

    /// True if `predicate` has any recorded `#assert` answer, for an
    /// `#if #predicate(...)` expression evaluator to query through.
    #[must_use]
    pub fn is_asserted(&self, predicate: &str) -> bool {
        self.context.assertions.is_asserted(predicate)
    }
}

fn frame_origin(name: &str) -> FrameOrigin {
    match name {
        "ifdef" => FrameOrigin::Ifdef,
        "ifndef" => FrameOrigin::Ifndef,
        _ => FrameOrigin::If,
    }
}

fn split_directive_name(rest: &str) -> (&str, &str) {
    let rest = rest.trim_start();
    match rest.find(|c: char| !crate::token::is_identifier_continue(c)) {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    }
}

fn strip_leading_whitespace(tokens: &[Token]) -> Vec<Token> {
    tokens
        .iter()
        .skip_while(|t| matches!(t, Token::Whitespace))
        .cloned()
        .collect()
}

fn parse_param_list(rest: &[Token]) -> (Option<Vec<String>>, bool, Vec<Token>) {
    let mut idx = 1; // skip '('
    let mut params = Vec::new();
    let mut is_variadic = false;
    while idx < rest.len() {
        match &rest[idx] {
            Token::Punct(p) if p == ")" => {
                idx += 1;
                break;
            }
            Token::Punct(p) if p == "," => idx += 1,
            Token::Punct(p) if p == "..." => {
                is_variadic = true;
                idx += 1;
            }
            Token::Identifier(name) => {
                params.push(name.clone());
                idx += 1;
            }
            Token::Whitespace => idx += 1,
            _ => idx += 1,
        }
    }
    let body = strip_leading_whitespace(&rest[idx..]);
    (Some(params), is_variadic, body)
}

/// Match `( "..." )` right after a `_Pragma` identifier token, tolerant
/// of whitespace tokens around the parens. Returns the string literal's
/// (already-unquoted) content and how many tokens the whole `(...)`
/// span consumed, so the caller can splice it out.
fn parse_pragma_operator_call(rest: &[Token]) -> Option<(String, usize)> {
    let mut idx = 0;
    while matches!(rest.get(idx), Some(Token::Whitespace)) {
        idx += 1;
    }
    if !matches!(rest.get(idx), Some(Token::Punct(p)) if p == "(") {
        return None;
    }
    idx += 1;
    while matches!(rest.get(idx), Some(Token::Whitespace)) {
        idx += 1;
    }
    let payload = match rest.get(idx) {
        Some(Token::StringLiteral(s)) => s.clone(),
        _ => return None,
    };
    idx += 1;
    while matches!(rest.get(idx), Some(Token::Whitespace)) {
        idx += 1;
    }
    if !matches!(rest.get(idx), Some(Token::Punct(p)) if p == ")") {
        return None;
    }
    idx += 1;
    Some((payload, idx))
}

fn parse_predicate_answer(operand: &str) -> Option<(String, String)> {
    let operand = operand.trim();
    let open = operand.find('(')?;
    let close = operand.rfind(')')?;
    if close < open {
        return None;
    }
    let predicate = operand[..open].trim().to_string();
    let answer = operand[open + 1..close].trim().to_string();
    if predicate.is_empty() {
        return None;
    }
    Some((predicate, answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference_impl::{ReferenceEvaluator, ReferenceExpander, ReferenceLexer};

    fn new_processor() -> DirectiveProcessor<ReferenceLexer, ReferenceExpander, ReferenceEvaluator> {
        DirectiveProcessor::new(
            DirectiveConfig::new(),
            ReferenceLexer,
            ReferenceExpander::new(),
            ReferenceEvaluator,
        )
    }

    #[test]
    fn object_like_define_then_text_line_expands() {
        let mut proc = new_processor();
        let out = proc.process("t.c", "#define FOO 42\nint x = FOO;\n").unwrap();
        assert!(out.contains("42"));
    }

    #[test]
    fn ifdef_skips_undefined_branch() {
        let mut proc = new_processor();
        let out = proc
            .process("t.c", "#ifdef NOPE\nshould_not_appear\n#else\nshould_appear\n#endif\n")
            .unwrap();
        assert!(out.contains("should_appear"));
        assert!(!out.contains("should_not_appear"));
    }

    #[test]
    fn elif_chain_only_emits_first_true_branch() {
        let mut proc = new_processor();
        let src = "#if 0\na\n#elif 1\nb\n#elif 1\nc\n#else\nd\n#endif\n";
        let out = proc.process("t.c", src).unwrap();
        assert!(out.contains('b'));
        assert!(!out.contains('a'));
        assert!(!out.contains('c'));
        assert!(!out.contains('d'));
    }

    #[test]
    fn else_without_if_is_an_error() {
        let mut proc = new_processor();
        assert!(proc.process("t.c", "#else\n").is_err());
    }

    #[test]
    fn unterminated_if_is_an_error() {
        let mut proc = new_processor();
        assert!(proc.process("t.c", "#if 1\n").is_err());
    }

    #[test]
    fn error_directive_is_collected_not_fatal() {
        let mut proc = new_processor();
        let out = proc.process("t.c", "#error boom\nint x;\n").unwrap();
        assert!(out.contains("int x;"));
        assert!(proc.warnings().iter().any(|w| format!("{w}").contains("boom")));
    }

    #[test]
    fn warning_directive_is_collected_not_fatal() {
        let mut proc = new_processor();
        proc.process("t.c", "#warning careful\n").unwrap();
        assert_eq!(proc.warnings().len(), 1);
    }

    #[test]
    fn assert_then_if_predicate_roundtrip() {
        let mut proc = new_processor();
        proc.process("t.c", "#assert machine(vax)\n").unwrap();
        assert!(proc.is_asserted("machine"));
    }

    #[test]
    fn include_resolver_missing_is_an_error() {
        let mut proc = new_processor();
        assert!(proc.process("t.c", "#include \"missing.h\"\n").is_err());
    }

    #[test]
    fn import_directive_warns_by_default() {
        let resolver: IncludeResolver = Rc::new(|path, _kind, _state| {
            Some(crate::collab::ResolvedInclude {
                canonical_path: path.to_string(),
                contents: String::new(),
            })
        });
        let mut proc = new_processor().with_include_resolver(resolver);
        proc.process("t.c", "#import \"legacy.h\"\n").unwrap();
        assert!(proc.warnings().iter().any(|w| format!("{w}").contains("#import")));
    }

    #[test]
    fn include_operand_is_macro_expanded_when_not_a_literal_header() {
        let seen = std::rc::Rc::new(std::cell::RefCell::new(None));
        let seen_clone = seen.clone();
        let resolver: IncludeResolver = Rc::new(move |path, kind, _state| {
            *seen_clone.borrow_mut() = Some((path.to_string(), kind));
            Some(crate::collab::ResolvedInclude {
                canonical_path: path.to_string(),
                contents: String::new(),
            })
        });
        let mut proc = new_processor().with_include_resolver(resolver);
        proc.process("t.c", "#define FOO <a.h>\n#include FOO\n").unwrap();
        let (path, kind) = seen.borrow().clone().expect("resolver should have been called");
        assert_eq!(path, "a.h");
        assert_eq!(kind, IncludeKind::Angled);
    }

    #[test]
    fn pragma_operator_matches_directive_form() {
        let mut via_operator = new_processor();
        via_operator.process("t.c", "_Pragma(\"GCC poison q\")\n").unwrap();
        let mut via_directive = new_processor();
        via_directive.process("t.c", "#pragma GCC poison q\n").unwrap();
        assert!(via_operator.context.is_poisoned("q"));
        assert!(via_directive.context.is_poisoned("q"));
    }

    #[test]
    fn pragma_operator_emits_no_line_marker() {
        let mut proc = new_processor();
        let out = proc.process("t.c", "_Pragma(\"GCC poison q\")\n").unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn include_splices_nested_output_in_place() {
        let resolver: IncludeResolver = Rc::new(|path, _kind, _state| {
            if path == "a.h" {
                Some(crate::collab::ResolvedInclude {
                    canonical_path: "a.h".to_string(),
                    contents: "#define A 1\nfrom_a\n".to_string(),
                })
            } else {
                None
            }
        });
        let mut proc = new_processor().with_include_resolver(resolver);
        let out = proc.process("t.c", "#include \"a.h\"\nafter\n").unwrap();
        assert!(out.contains("from_a"));
        assert!(out.contains("after"));
        assert!(proc.context.is_macro_defined("A"));
    }

    #[test]
    fn root_poison_is_equivalent_to_gcc_poison() {
        let mut proc = new_processor();
        proc.process("t.c", "#pragma poison bad\n").unwrap();
        assert!(proc.context.is_poisoned("bad"));
    }

    #[test]
    fn root_poison_frees_existing_macro_with_warning() {
        let mut proc = new_processor();
        proc.process("t.c", "#define bad 1\n#pragma poison bad\n").unwrap();
        assert!(proc.context.is_poisoned("bad"));
        assert!(!proc.context.is_macro_defined("bad"));
        assert!(proc
            .warnings()
            .iter()
            .any(|w| format!("{w}").contains("poisoning existing macro")));
    }

    #[test]
    fn gcc_system_header_accepted_in_included_file() {
        let resolver: IncludeResolver = Rc::new(|path, _kind, _state| {
            if path == "a.h" {
                Some(crate::collab::ResolvedInclude {
                    canonical_path: "a.h".to_string(),
                    contents: "#pragma GCC system_header\n".to_string(),
                })
            } else {
                None
            }
        });
        let mut proc = new_processor().with_include_resolver(resolver);
        proc.process("t.c", "#include \"a.h\"\n").unwrap();
    }

    #[test]
    fn gcc_system_header_rejected_in_primary_source() {
        let mut proc = new_processor();
        assert!(proc.process("t.c", "#pragma GCC system_header\n").is_err());
    }

    #[test]
    fn unregistered_pragma_passes_through_instead_of_erroring() {
        let seen = std::rc::Rc::new(std::cell::RefCell::new(None));
        let seen_clone = seen.clone();
        let config = DirectiveConfig::new().with_def_pragma_handler(Rc::new(move |text| {
            *seen_clone.borrow_mut() = Some(text.to_string());
        }));
        let mut proc = DirectiveProcessor::new(config, ReferenceLexer, ReferenceExpander::new(), ReferenceEvaluator);
        proc.process("t.c", "#pragma weird stuff\n").unwrap();
        assert!(seen.borrow().as_ref().is_some_and(|s| s.contains("weird")));
    }

    #[test]
    fn line_directive_sets_number_and_filename() {
        let mut proc = new_processor();
        let err = proc.process("t.c", "#line 100 \"renamed.c\"\n#bogus\n").unwrap_err();
        let rendered = format!("{err}");
        assert!(rendered.contains("renamed.c"));
        assert!(rendered.contains("101"));
    }

    #[test]
    fn line_directive_action_three_marks_system_header() {
        let mut proc = new_processor();
        proc.context
            .enter_buffer("t.c".to_string(), BufferOrigin::Included)
            .unwrap();
        proc.handle_line(" 5 \"sys.h\" 3", "#line 5 \"sys.h\" 3").unwrap();
        assert!(proc.context.buffers.top().unwrap().system_header);
    }

    #[test]
    fn line_directive_action_one_clears_system_header() {
        let mut proc = new_processor();
        proc.context
            .enter_buffer("t.c".to_string(), BufferOrigin::Included)
            .unwrap();
        proc.handle_line(" 5 \"sys.h\" 3", "#line 5 \"sys.h\" 3").unwrap();
        proc.handle_line(" 6 \"sys.h\" 1", "#line 6 \"sys.h\" 1").unwrap();
        assert!(!proc.context.buffers.top().unwrap().system_header);
    }

    #[test]
    fn elif_in_doubly_skipped_frame_does_not_evaluate() {
        let mut proc = new_processor();
        let out = proc
            .process("t.c", "#if 0\n#if 1\nx\n#elif BOGUS(((\n#endif\n#endif\n")
            .unwrap();
        assert!(!out.contains('x'));
    }

    #[test]
    fn trailing_text_after_guard_endif_defeats_once_only() {
        let resolver: IncludeResolver = Rc::new(|path, _kind, _state| {
            if path == "a.h" {
                Some(crate::collab::ResolvedInclude {
                    canonical_path: "a.h".to_string(),
                    contents: "#ifndef A_H\n#define A_H\nbody\n#endif\ntrailing\n".to_string(),
                })
            } else {
                None
            }
        });
        let mut proc = new_processor().with_include_resolver(resolver);
        let out = proc
            .process("t.c", "#include \"a.h\"\n#include \"a.h\"\n")
            .unwrap();
        assert_eq!(out.matches("body").count(), 2);
    }

    #[test]
    fn leading_text_before_guard_defeats_once_only() {
        let resolver: IncludeResolver = Rc::new(|path, _kind, _state| {
            if path == "a.h" {
                Some(crate::collab::ResolvedInclude {
                    canonical_path: "a.h".to_string(),
                    contents: "leading;\n#ifndef A_H\n#define A_H\nbody\n#endif\n".to_string(),
                })
            } else {
                None
            }
        });
        let mut proc = new_processor().with_include_resolver(resolver);
        let out = proc
            .process("t.c", "#include \"a.h\"\n#include \"a.h\"\n")
            .unwrap();
        assert_eq!(out.matches("body").count(), 2);
    }
}
