//! The assertion database behind `#assert`/`#unassert`/`#if
//! #predicate(answer)`.
//!
//! Assertions are a rarely-used GNU extension: `#assert predicate
//! (answer)` records that `predicate` has been answered with the
//! given token sequence, and `#if #predicate(answer)` tests whether
//! any previously recorded answer is token-for-token identical to the
//! queried one. Structural equality is delegated to the lexer
//! collaborator since the dispatcher does not itself know how two
//! tokens of a caller-defined type compare.

use std::collections::HashMap;

use crate::token::Token;

/// One recorded answer to a predicate.
#[derive(Clone, Debug)]
pub struct Answer {
    pub tokens: Vec<Token>,
}

/// Stores every predicate's recorded answers.
#[derive(Clone, Debug, Default)]
pub struct AssertionTable {
    predicates: HashMap<String, Vec<Answer>>,
}

impl AssertionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `predicate(answer)`. A duplicate (token-identical)
    /// answer for the same predicate is silently ignored, matching
    /// `#define`'s tolerance of benign redefinition.
    pub fn assert(&mut self, predicate: &str, answer: Vec<Token>) {
        let answers = self.predicates.entry(predicate.to_string()).or_default();
        if !answers.iter().any(|a| a.tokens == answer) {
            answers.push(Answer { tokens: answer });
        }
    }

    /// Remove an assertion. With `answer: None`, removes every answer
    /// for `predicate`; with `answer: Some(tokens)`, removes only the
    /// matching one.
    pub fn unassert(&mut self, predicate: &str, answer: Option<&[Token]>) {
        match answer {
            None => {
                self.predicates.remove(predicate);
            }
            Some(tokens) => {
                if let Some(answers) = self.predicates.get_mut(predicate) {
                    answers.retain(|a| a.tokens != tokens);
                    if answers.is_empty() {
                        self.predicates.remove(predicate);
                    }
                }
            }
        }
    }

    /// True if `predicate` has at least one recorded answer.
    #[must_use]
    pub fn is_asserted(&self, predicate: &str) -> bool {
        self.predicates.contains_key(predicate)
    }

    /// True if `predicate(answer)` was recorded, exactly, by a
    /// previous `#assert`.
    #[must_use]
    pub fn has_answer(&self, predicate: &str, answer: &[Token]) -> bool {
        self.predicates
            .get(predicate)
            .is_some_and(|answers| answers.iter().any(|a| a.tokens == answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(s: &str) -> Token {
        Token::Identifier(s.to_string())
    }

    #[test]
    fn assert_then_query_matches() {
        let mut table = AssertionTable::new();
        table.assert("machine", vec![tok("vax")]);
        assert!(table.has_answer("machine", &[tok("vax")]));
        assert!(!table.has_answer("machine", &[tok("i386")]));
    }

    #[test]
    fn duplicate_assert_is_idempotent() {
        let mut table = AssertionTable::new();
        table.assert("machine", vec![tok("vax")]);
        table.assert("machine", vec![tok("vax")]);
        assert!(table.is_asserted("machine"));
    }

    #[test]
    fn unassert_specific_answer_leaves_others() {
        let mut table = AssertionTable::new();
        table.assert("machine", vec![tok("vax")]);
        table.assert("machine", vec![tok("i386")]);
        table.unassert("machine", Some(&[tok("vax")]));
        assert!(!table.has_answer("machine", &[tok("vax")]));
        assert!(table.has_answer("machine", &[tok("i386")]));
    }

    #[test]
    fn unassert_all_removes_predicate() {
        let mut table = AssertionTable::new();
        table.assert("machine", vec![tok("vax")]);
        table.unassert("machine", None);
        assert!(!table.is_asserted("machine"));
    }
}
