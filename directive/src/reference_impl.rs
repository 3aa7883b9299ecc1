//! Bundled default collaborators: a line-oriented lexer, a small
//! recursive macro expander, and a recursive-descent `#if` expression
//! evaluator.
//!
//! These exist so the crate's own tests and the CLI front end have
//! something to drive [`crate::driver::DirectiveProcessor`] with
//! without requiring every caller to supply a production-grade C
//! lexer. A caller embedding this in a real compiler front end is
//! expected to plug in its own collaborators instead.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::collab::{ExprOutcome, Lexer, MacroExpander};
use crate::error::PreprocessError;
use crate::macro_def::MacroDef;
use crate::token::{is_identifier_continue, is_identifier_start, Token};

/// Strip `//` and `/* */` comments, preserving anything inside string
/// or character literals, and collapsing each comment to a single
/// space so token columns downstream stay roughly aligned with the
/// original text.
fn strip_comments(input: &str) -> String {
    if !input.contains('/') {
        return input.to_string();
    }
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut quote_char = '\0';

    while let Some(ch) = chars.next() {
        if !in_string {
            if ch == '"' || ch == '\'' {
                in_string = true;
                quote_char = ch;
            } else if ch == '/' {
                if let Some(&'/') = chars.peek() {
                    result.push(' ');
                    return result; // rest of the logical line is a line comment
                } else if let Some(&'*') = chars.peek() {
                    chars.next();
                    result.push(' ');
                    let mut prev = '\0';
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        prev = c;
                    }
                    continue;
                }
            }
        } else if ch == quote_char {
            let mut backslash_count = 0;
            let mut pos = result.len();
            while pos > 0 && result.as_bytes()[pos - 1] == b'\\' {
                backslash_count += 1;
                pos -= 1;
            }
            if backslash_count % 2 == 0 {
                in_string = false;
            }
        }
        result.push(ch);
    }
    result
}

fn tokenize(line: &str) -> Vec<Token> {
    let stripped = strip_comments(line);
    let mut tokens = Vec::new();
    let mut it = stripped.chars().peekable();

    while let Some(&ch) = it.peek() {
        if is_identifier_start(ch) {
            let mut s = String::new();
            while let Some(&c2) = it.peek() {
                if is_identifier_continue(c2) {
                    s.push(c2);
                    it.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(s));
        } else if ch.is_ascii_digit() {
            let mut s = String::new();
            while let Some(&c2) = it.peek() {
                if c2.is_ascii_alphanumeric() || c2 == '.' {
                    s.push(c2);
                    it.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Number(s));
        } else if ch == '"' || ch == '\'' {
            let quote = ch;
            it.next();
            let mut s = String::new();
            while let Some(c2) = it.next() {
                if c2 == '\\' {
                    s.push(c2);
                    if let Some(c3) = it.next() {
                        s.push(c3);
                    }
                } else if c2 == quote {
                    break;
                } else {
                    s.push(c2);
                }
            }
            if quote == '"' {
                tokens.push(Token::StringLiteral(s));
            } else {
                tokens.push(Token::CharLiteral(s));
            }
        } else if ch.is_whitespace() {
            while it.peek().is_some_and(|c| c.is_whitespace()) {
                it.next();
            }
            tokens.push(Token::Whitespace);
        } else if ch == '#' {
            it.next();
            if it.peek() == Some(&'#') {
                it.next();
                tokens.push(Token::Punct("##".to_string()));
            } else {
                tokens.push(Token::Punct("#".to_string()));
            }
        } else if ch == '.' && matches!((it.clone().nth(1), it.clone().nth(2)), (Some('.'), Some('.'))) {
            it.next();
            it.next();
            it.next();
            tokens.push(Token::Punct("...".to_string()));
        } else {
            it.next();
            tokens.push(Token::Punct(ch.to_string()));
        }
    }
    tokens
}

/// The bundled [`Lexer`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceLexer;

impl Lexer for ReferenceLexer {
    fn tokenize_directive_operand(&self, line: &str) -> Vec<Token> {
        tokenize(line)
    }

    fn tokenize_header_name(&self, operand: &str) -> Option<Token> {
        let operand = operand.trim();
        if operand.len() >= 2 && operand.starts_with('<') && operand.ends_with('>') {
            Some(Token::HeaderName {
                spelling: operand[1..operand.len() - 1].to_string(),
                angled: true,
            })
        } else if operand.len() >= 2 && operand.starts_with('"') && operand.ends_with('"') {
            Some(Token::HeaderName {
                spelling: operand[1..operand.len() - 1].to_string(),
                angled: false,
            })
        } else {
            None
        }
    }

    fn tokenize_text_line(&self, line: &str) -> Vec<Token> {
        tokenize(line)
    }

    fn locate(&self, line: &str, needle: &str) -> Option<usize> {
        line.find(needle)
    }
}

fn token_text(token: &Token) -> String {
    match token {
        Token::Identifier(s) | Token::Number(s) | Token::Punct(s) => s.clone(),
        Token::StringLiteral(s) => format!("\"{s}\""),
        Token::CharLiteral(s) => format!("'{s}'"),
        Token::HeaderName { spelling, angled } => {
            if *angled {
                format!("<{spelling}>")
            } else {
                format!("\"{spelling}\"")
            }
        }
        Token::Whitespace => " ".to_string(),
        Token::Eof => String::new(),
    }
}

fn stringify(tokens: &[Token]) -> Token {
    let text: String = tokens
        .iter()
        .filter(|t| !matches!(t, Token::Whitespace))
        .map(token_text)
        .collect::<Vec<_>>()
        .join(" ");
    Token::StringLiteral(text.replace('"', "\\\""))
}

fn paste(left: &Token, right: &Token) -> Token {
    let combined = format!("{}{}", token_text(left), token_text(right));
    match (left, right) {
        (Token::Identifier(_), Token::Identifier(_) | Token::Number(_)) => Token::Identifier(combined),
        (Token::Number(_), Token::Number(_)) => Token::Number(combined),
        _ => Token::Punct(combined),
    }
}

/// The bundled [`MacroExpander`]: handles object-like and
/// function-like macro substitution, `#` stringification, `##`
/// pasting and `__VA_ARGS__`, guarded against self-recursion by a
/// per-call disabled-name set.
#[derive(Debug, Default)]
pub struct ReferenceExpander {
    recursion_limit: usize,
}

impl ReferenceExpander {
    #[must_use]
    pub fn new() -> Self {
        ReferenceExpander { recursion_limit: 200 }
    }

    #[must_use]
    pub fn with_recursion_limit(limit: usize) -> Self {
        ReferenceExpander { recursion_limit: limit }
    }

    fn expand_inner(
        &self,
        tokens: &[Token],
        lookup: &dyn Fn(&str) -> Option<Rc<MacroDef>>,
        disabled: &RefCell<HashSet<String>>,
        depth: usize,
    ) -> Result<Vec<Token>, PreprocessError> {
        if depth > self.recursion_limit {
            return Err(PreprocessError::recursion_limit_exceeded(
                String::new(),
                0,
                "macro expansion recursion limit exceeded".to_string(),
            ));
        }
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let tok = &tokens[i];
            let name = match tok {
                Token::Identifier(n) => n.clone(),
                _ => {
                    out.push(tok.clone());
                    i += 1;
                    continue;
                }
            };
            let def = match lookup(&name) {
                Some(d) if !disabled.borrow().contains(&name) => d,
                _ => {
                    out.push(tok.clone());
                    i += 1;
                    continue;
                }
            };
            if def.is_function_like() {
                let (args, consumed) = match parse_call_args(&tokens[i + 1..]) {
                    Some(x) => x,
                    None => {
                        out.push(tok.clone());
                        i += 1;
                        continue;
                    }
                };
                let substituted = substitute_function_like(&def, &args)?;
                disabled.borrow_mut().insert(name.clone());
                let expanded = self.expand_inner(&substituted, lookup, disabled, depth + 1)?;
                disabled.borrow_mut().remove(&name);
                out.extend(expanded);
                i += 1 + consumed;
            } else {
                disabled.borrow_mut().insert(name.clone());
                let expanded = self.expand_inner(&def.body, lookup, disabled, depth + 1)?;
                disabled.borrow_mut().remove(&name);
                out.extend(expanded);
                i += 1;
            }
        }
        Ok(apply_pasting(&out))
    }
}

fn apply_pasting(tokens: &[Token]) -> Vec<Token> {
    let mut result: Vec<Token> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].is_punct("##") {
            while matches!(result.last(), Some(Token::Whitespace)) {
                result.pop();
            }
            let mut next = i + 1;
            while tokens.get(next).is_some_and(|t| matches!(t, Token::Whitespace)) {
                next += 1;
            }
            if let (Some(left), Some(right)) = (result.pop(), tokens.get(next)) {
                result.push(paste(&left, right));
                i = next + 1;
                continue;
            }
        }
        result.push(tokens[i].clone());
        i += 1;
    }
    result
}

fn parse_call_args(rest: &[Token]) -> Option<(Vec<Vec<Token>>, usize)> {
    let mut idx = 0;
    while rest.get(idx).is_some_and(|t| matches!(t, Token::Whitespace)) {
        idx += 1;
    }
    if !rest.get(idx)?.is_punct("(") {
        return None;
    }
    idx += 1;
    let mut args = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0;
    loop {
        let tok = rest.get(idx)?;
        match tok {
            Token::Punct(p) if p == "(" => {
                depth += 1;
                current.push(tok.clone());
            }
            Token::Punct(p) if p == ")" => {
                if depth == 0 {
                    args.push(current.clone());
                    idx += 1;
                    break;
                }
                depth -= 1;
                current.push(tok.clone());
            }
            Token::Punct(p) if p == "," && depth == 0 => {
                args.push(current.clone());
                current = Vec::new();
            }
            _ => current.push(tok.clone()),
        }
        idx += 1;
    }
    Some((args, idx))
}

fn substitute_function_like(def: &MacroDef, args: &[Vec<Token>]) -> Result<Vec<Token>, PreprocessError> {
    let params = def.params.as_ref().expect("function-like macro has params");
    if !def.is_variadic && args.len() != params.len() {
        return Err(PreprocessError::macro_arg_mismatch(
            String::new(),
            0,
            format!("\"{}\" expects {} argument(s), got {}", def.name, params.len(), args.len()),
        ));
    }
    if def.is_variadic && args.len() < params.len() {
        return Err(PreprocessError::macro_arg_mismatch(
            String::new(),
            0,
            format!("\"{}\" expects at least {} argument(s), got {}", def.name, params.len(), args.len()),
        ));
    }
    let variadic_args: Vec<Token> = if def.is_variadic {
        args[params.len()..]
            .iter()
            .enumerate()
            .flat_map(|(idx, a)| {
                if idx == 0 {
                    a.clone()
                } else {
                    let mut v = vec![Token::Punct(",".to_string())];
                    v.extend(a.clone());
                    v
                }
            })
            .collect()
    } else {
        Vec::new()
    };

    let body = &def.body;
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        if body[i].is_punct("#") {
            if let Some(Token::Identifier(param)) = body.get(i + 1) {
                if let Some(pos) = params.iter().position(|p| p == param) {
                    out.push(stringify(&args[pos]));
                    i += 2;
                    continue;
                } else if param == "__VA_ARGS__" {
                    out.push(stringify(&variadic_args));
                    i += 2;
                    continue;
                }
            }
        }
        match &body[i] {
            Token::Identifier(name) if name == "__VA_ARGS__" => out.extend(variadic_args.clone()),
            Token::Identifier(name) => {
                if let Some(pos) = params.iter().position(|p| p == name) {
                    out.extend(args[pos].clone());
                } else {
                    out.push(body[i].clone());
                }
            }
            other => out.push(other.clone()),
        }
        i += 1;
    }
    Ok(out)
}

impl MacroExpander for ReferenceExpander {
    fn expand(
        &mut self,
        tokens: &[Token],
        lookup: &dyn Fn(&str) -> Option<Rc<MacroDef>>,
    ) -> Result<Vec<Token>, PreprocessError> {
        let disabled = RefCell::new(HashSet::new());
        self.expand_inner(tokens, lookup, &disabled, 0)
    }
}

#[derive(Clone, Debug, PartialEq)]
enum ExprTok {
    Number(i64),
    Identifier(String),
    LParen,
    RParen,
    Not,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

fn to_expr_tokens(tokens: &[Token]) -> Vec<ExprTok> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Whitespace => {}
            Token::Number(n) => out.push(ExprTok::Number(n.parse().unwrap_or(0))),
            Token::Identifier(id) => out.push(ExprTok::Identifier(id.clone())),
            Token::Punct(p) => match p.as_str() {
                "(" => out.push(ExprTok::LParen),
                ")" => out.push(ExprTok::RParen),
                "!" => out.push(ExprTok::Not),
                "+" => out.push(ExprTok::Plus),
                "-" => out.push(ExprTok::Minus),
                "*" => out.push(ExprTok::Multiply),
                "/" => out.push(ExprTok::Divide),
                "%" => out.push(ExprTok::Modulo),
                "==" => out.push(ExprTok::Equal),
                "!=" => out.push(ExprTok::NotEqual),
                "<" => out.push(ExprTok::Less),
                "<=" => out.push(ExprTok::LessEqual),
                ">" => out.push(ExprTok::Greater),
                ">=" => out.push(ExprTok::GreaterEqual),
                "&&" => out.push(ExprTok::And),
                "||" => out.push(ExprTok::Or),
                _ => {}
            },
            _ => {}
        }
        i += 1;
    }
    out
}

/// The bundled [`crate::collab::ExprEvaluator`]: a small recursive
/// descent parser over `+ - * / % ! == != < <= > >= && ||`,
/// `defined`/`defined(...)` and parentheses.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceEvaluator;

impl ReferenceEvaluator {
    fn parse_or(toks: &[ExprTok], pos: &mut usize, is_defined: &dyn Fn(&str) -> bool) -> Result<i64, String> {
        let mut left = Self::parse_and(toks, pos, is_defined)?;
        while matches!(toks.get(*pos), Some(ExprTok::Or)) {
            *pos += 1;
            let right = Self::parse_and(toks, pos, is_defined)?;
            left = i64::from(left != 0 || right != 0);
        }
        Ok(left)
    }

    fn parse_and(toks: &[ExprTok], pos: &mut usize, is_defined: &dyn Fn(&str) -> bool) -> Result<i64, String> {
        let mut left = Self::parse_cmp(toks, pos, is_defined)?;
        while matches!(toks.get(*pos), Some(ExprTok::And)) {
            *pos += 1;
            let right = Self::parse_cmp(toks, pos, is_defined)?;
            left = i64::from(left != 0 && right != 0);
        }
        Ok(left)
    }

    fn parse_cmp(toks: &[ExprTok], pos: &mut usize, is_defined: &dyn Fn(&str) -> bool) -> Result<i64, String> {
        let left = Self::parse_add(toks, pos, is_defined)?;
        let result = match toks.get(*pos) {
            Some(ExprTok::Equal) => {
                *pos += 1;
                i64::from(left == Self::parse_add(toks, pos, is_defined)?)
            }
            Some(ExprTok::NotEqual) => {
                *pos += 1;
                i64::from(left != Self::parse_add(toks, pos, is_defined)?)
            }
            Some(ExprTok::Less) => {
                *pos += 1;
                i64::from(left < Self::parse_add(toks, pos, is_defined)?)
            }
            Some(ExprTok::LessEqual) => {
                *pos += 1;
                i64::from(left <= Self::parse_add(toks, pos, is_defined)?)
            }
            Some(ExprTok::Greater) => {
                *pos += 1;
                i64::from(left > Self::parse_add(toks, pos, is_defined)?)
            }
            Some(ExprTok::GreaterEqual) => {
                *pos += 1;
                i64::from(left >= Self::parse_add(toks, pos, is_defined)?)
            }
            _ => left,
        };
        Ok(result)
    }

    fn parse_add(toks: &[ExprTok], pos: &mut usize, is_defined: &dyn Fn(&str) -> bool) -> Result<i64, String> {
        let mut left = Self::parse_mul(toks, pos, is_defined)?;
        loop {
            match toks.get(*pos) {
                Some(ExprTok::Plus) => {
                    *pos += 1;
                    left += Self::parse_mul(toks, pos, is_defined)?;
                }
                Some(ExprTok::Minus) => {
                    *pos += 1;
                    left -= Self::parse_mul(toks, pos, is_defined)?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_mul(toks: &[ExprTok], pos: &mut usize, is_defined: &dyn Fn(&str) -> bool) -> Result<i64, String> {
        let mut left = Self::parse_unary(toks, pos, is_defined)?;
        loop {
            match toks.get(*pos) {
                Some(ExprTok::Multiply) => {
                    *pos += 1;
                    left *= Self::parse_unary(toks, pos, is_defined)?;
                }
                Some(ExprTok::Divide) => {
                    *pos += 1;
                    let rhs = Self::parse_unary(toks, pos, is_defined)?;
                    if rhs == 0 {
                        return Err("division by zero".to_string());
                    }
                    left /= rhs;
                }
                Some(ExprTok::Modulo) => {
                    *pos += 1;
                    let rhs = Self::parse_unary(toks, pos, is_defined)?;
                    if rhs == 0 {
                        return Err("modulo by zero".to_string());
                    }
                    left %= rhs;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_unary(toks: &[ExprTok], pos: &mut usize, is_defined: &dyn Fn(&str) -> bool) -> Result<i64, String> {
        match toks.get(*pos) {
            Some(ExprTok::Not) => {
                *pos += 1;
                Ok(i64::from(Self::parse_unary(toks, pos, is_defined)? == 0))
            }
            Some(ExprTok::Minus) => {
                *pos += 1;
                Ok(-Self::parse_unary(toks, pos, is_defined)?)
            }
            _ => Self::parse_primary(toks, pos, is_defined),
        }
    }

    fn parse_primary(toks: &[ExprTok], pos: &mut usize, is_defined: &dyn Fn(&str) -> bool) -> Result<i64, String> {
        match toks.get(*pos) {
            Some(ExprTok::Number(n)) => {
                *pos += 1;
                Ok(*n)
            }
            Some(ExprTok::Identifier(id)) if id == "defined" => {
                *pos += 1;
                if matches!(toks.get(*pos), Some(ExprTok::LParen)) {
                    *pos += 1;
                    let name = match toks.get(*pos) {
                        Some(ExprTok::Identifier(n)) => n.clone(),
                        _ => return Err("expected identifier after defined(".to_string()),
                    };
                    *pos += 1;
                    if !matches!(toks.get(*pos), Some(ExprTok::RParen)) {
                        return Err("expected ) after defined(identifier".to_string());
                    }
                    *pos += 1;
                    Ok(i64::from(is_defined(&name)))
                } else if let Some(ExprTok::Identifier(name)) = toks.get(*pos) {
                    let v = is_defined(name);
                    *pos += 1;
                    Ok(i64::from(v))
                } else {
                    Err("defined must be followed by identifier or (identifier)".to_string())
                }
            }
            Some(ExprTok::Identifier(_)) => {
                *pos += 1;
                Ok(0) // undefined identifiers evaluate to 0
            }
            Some(ExprTok::LParen) => {
                *pos += 1;
                let v = Self::parse_or(toks, pos, is_defined)?;
                if !matches!(toks.get(*pos), Some(ExprTok::RParen)) {
                    return Err("expected )".to_string());
                }
                *pos += 1;
                Ok(v)
            }
            _ => Err("unexpected end of expression".to_string()),
        }
    }
}

/// Recognize the shape `! defined ( NAME )` or `! defined NAME`,
/// reported back to the dispatcher as the multiple-inclusion guard
/// candidate.
fn not_defined_candidate(toks: &[ExprTok]) -> Option<String> {
    match toks {
        [ExprTok::Not, ExprTok::Identifier(d), ExprTok::LParen, ExprTok::Identifier(name), ExprTok::RParen] if d == "defined" => {
            Some(name.clone())
        }
        [ExprTok::Not, ExprTok::Identifier(d), ExprTok::Identifier(name)] if d == "defined" => Some(name.clone()),
        _ => None,
    }
}

impl crate::collab::ExprEvaluator for ReferenceEvaluator {
    fn eval(
        &mut self,
        tokens: &[Token],
        is_defined: &dyn Fn(&str) -> bool,
    ) -> Result<ExprOutcome, PreprocessError> {
        let expr_toks = to_expr_tokens(tokens);
        let mut pos = 0;
        let value = Self::parse_or(&expr_toks, &mut pos, is_defined).map_err(|msg| {
            PreprocessError::other(String::new(), 0, format!("invalid #if expression: {msg}"))
        })?;
        if pos != expr_toks.len() {
            return Err(PreprocessError::other(
                String::new(),
                0,
                "unexpected tokens at end of #if expression".to_string(),
            ));
        }
        Ok(ExprOutcome {
            value,
            not_defined_candidate: not_defined_candidate(&expr_toks),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_identifiers_numbers_and_puncts() {
        let toks = tokenize("FOO(1,2)");
        assert_eq!(
            toks,
            vec![
                Token::Identifier("FOO".to_string()),
                Token::Punct("(".to_string()),
                Token::Number("1".to_string()),
                Token::Punct(",".to_string()),
                Token::Number("2".to_string()),
                Token::Punct(")".to_string()),
            ]
        );
    }

    #[test]
    fn object_like_macro_expands() {
        let def = Rc::new(MacroDef::object_like(
            "FOO".to_string(),
            vec![Token::Number("42".to_string())],
            None,
        ));
        let mut expander = ReferenceExpander::new();
        let input = vec![Token::Identifier("FOO".to_string())];
        let out = expander
            .expand(&input, &|n| if n == "FOO" { Some(def.clone()) } else { None })
            .unwrap();
        assert_eq!(out, vec![Token::Number("42".to_string())]);
    }

    #[test]
    fn function_like_macro_substitutes_args() {
        let def = Rc::new(MacroDef::function_like(
            "ADD".to_string(),
            vec!["a".to_string(), "b".to_string()],
            false,
            vec![
                Token::Identifier("a".to_string()),
                Token::Punct("+".to_string()),
                Token::Identifier("b".to_string()),
            ],
            None,
        ));
        let mut expander = ReferenceExpander::new();
        let input = tokenize("ADD(1,2)");
        let out = expander
            .expand(&input, &|n| if n == "ADD" { Some(def.clone()) } else { None })
            .unwrap();
        assert_eq!(
            out,
            vec![
                Token::Number("1".to_string()),
                Token::Punct("+".to_string()),
                Token::Number("2".to_string()),
            ]
        );
    }

    #[test]
    fn stringification_wraps_argument_text() {
        let def = Rc::new(MacroDef::function_like(
            "STR".to_string(),
            vec!["x".to_string()],
            false,
            vec![Token::Punct("#".to_string()), Token::Identifier("x".to_string())],
            None,
        ));
        let mut expander = ReferenceExpander::new();
        let input = tokenize("STR(hello)");
        let out = expander
            .expand(&input, &|n| if n == "STR" { Some(def.clone()) } else { None })
            .unwrap();
        assert_eq!(out, vec![Token::StringLiteral("hello".to_string())]);
    }

    #[test]
    fn token_pasting_joins_identifiers() {
        let def = Rc::new(MacroDef::function_like(
            "CAT".to_string(),
            vec!["a".to_string(), "b".to_string()],
            false,
            vec![
                Token::Identifier("a".to_string()),
                Token::Punct("##".to_string()),
                Token::Identifier("b".to_string()),
            ],
            None,
        ));
        let mut expander = ReferenceExpander::new();
        let input = tokenize("CAT(foo,bar)");
        let out = expander
            .expand(&input, &|n| if n == "CAT" { Some(def.clone()) } else { None })
            .unwrap();
        assert_eq!(out, vec![Token::Identifier("foobar".to_string())]);
    }

    #[test]
    fn self_referential_macro_does_not_infinitely_recurse() {
        let def = Rc::new(MacroDef::object_like(
            "FOO".to_string(),
            vec![Token::Identifier("FOO".to_string())],
            None,
        ));
        let mut expander = ReferenceExpander::new();
        let input = vec![Token::Identifier("FOO".to_string())];
        let out = expander
            .expand(&input, &|n| if n == "FOO" { Some(def.clone()) } else { None })
            .unwrap();
        assert_eq!(out, vec![Token::Identifier("FOO".to_string())]);
    }

    #[test]
    fn evaluator_handles_defined_and_arithmetic() {
        use crate::collab::ExprEvaluator;
        let mut evaluator = ReferenceEvaluator;
        let toks = tokenize("defined(FOO) && 1 + 1 == 2");
        let outcome = evaluator.eval(&toks, &|n| n == "FOO").unwrap();
        assert!(outcome.is_true());
    }

    #[test]
    fn evaluator_reports_mi_guard_candidate() {
        use crate::collab::ExprEvaluator;
        let mut evaluator = ReferenceEvaluator;
        let toks = tokenize("!defined(FOO_H)");
        let outcome = evaluator.eval(&toks, &|_| false).unwrap();
        assert_eq!(outcome.not_defined_candidate.as_deref(), Some("FOO_H"));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        use crate::collab::ExprEvaluator;
        let mut evaluator = ReferenceEvaluator;
        let toks = tokenize("1 / 0");
        assert!(evaluator.eval(&toks, &|_| false).is_err());
    }
}
