//! The static table of directives the dispatcher recognizes.
//!
//! Each entry is looked up by name when a line begins with `#`; the
//! flags tell the dispatcher how to treat the directive while a
//! conditional block is being skipped, and whether it is an extension
//! the pedantic mode should complain about.

/// Where a directive comes from, standards-wise. Purely informational
/// for `-pedantic`/`-traditional` diagnostics; it has no effect on
/// dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectiveOrigin {
    /// Recognized since K&R C.
    Traditional,
    /// Added by C89/ISO C.
    Std89,
    /// A GNU/vendor extension not in any C standard.
    Extension,
}

bitflags::bitflags! {
    /// Flags describing how a directive behaves.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DirectiveFlags: u8 {
        /// This directive is itself one of the conditional-inclusion
        /// directives (`#if`, `#ifdef`, `#ifndef`, `#elif`, `#else`,
        /// `#endif`) and must run even while the surrounding block is
        /// being skipped, so the conditional stack stays balanced.
        const COND = 0b0000_0001;
        /// This directive opens a new conditional frame (`#if`,
        /// `#ifdef`, `#ifndef`) as opposed to continuing or closing
        /// one.
        const IF_COND = 0b0000_0010;
        /// This directive includes another file (`#include`,
        /// `#include_next`, `#import`).
        const INCL = 0b0000_0100;
        /// Valid to issue via command-line injection (`-D`, `-U`,
        /// `-A`) as well as in source text.
        const IN_I = 0b0000_1000;
    }
}

/// A directive's static properties, independent of any particular
/// invocation.
#[derive(Clone, Copy, Debug)]
pub struct DirectiveInfo {
    pub name: &'static str,
    pub origin: DirectiveOrigin,
    pub flags: DirectiveFlags,
}

macro_rules! directive_table {
    ($(($name:literal, $origin:ident, $flags:expr)),* $(,)?) => {
        /// All directives recognized by the dispatcher, in no
        /// particular order; use [`lookup`] to find one by name.
        pub const DIRECTIVES: &[DirectiveInfo] = &[
            $(
                DirectiveInfo {
                    name: $name,
                    origin: DirectiveOrigin::$origin,
                    flags: $flags,
                },
            )*
        ];
    };
}

directive_table! {
    ("define",       Traditional, DirectiveFlags::IN_I),
    ("include",      Traditional, DirectiveFlags::INCL),
    ("endif",        Traditional, DirectiveFlags::COND),
    ("ifdef",        Traditional, DirectiveFlags::COND.union(DirectiveFlags::IF_COND)),
    ("if",           Traditional, DirectiveFlags::COND.union(DirectiveFlags::IF_COND)),
    ("else",         Traditional, DirectiveFlags::COND),
    ("ifndef",       Traditional, DirectiveFlags::COND.union(DirectiveFlags::IF_COND)),
    ("undef",        Traditional, DirectiveFlags::IN_I),
    ("line",         Traditional, DirectiveFlags::IN_I),
    ("elif",         Std89,       DirectiveFlags::COND),
    ("error",        Std89,       DirectiveFlags::empty()),
    ("pragma",       Std89,       DirectiveFlags::IN_I),
    ("warning",      Extension,   DirectiveFlags::empty()),
    ("include_next", Extension,   DirectiveFlags::INCL),
    ("ident",        Extension,   DirectiveFlags::IN_I),
    ("sccs",         Extension,   DirectiveFlags::IN_I),
    ("import",       Extension,   DirectiveFlags::INCL),
    ("assert",       Extension,   DirectiveFlags::empty()),
    ("unassert",     Extension,   DirectiveFlags::empty()),
}

/// Look up a directive by its name (without the leading `#` or
/// surrounding whitespace).
#[must_use]
pub fn lookup(name: &str) -> Option<&'static DirectiveInfo> {
    DIRECTIVES.iter().find(|d| d.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ifdef_is_cond_and_if_cond() {
        let info = lookup("ifdef").unwrap();
        assert!(info.flags.contains(DirectiveFlags::COND));
        assert!(info.flags.contains(DirectiveFlags::IF_COND));
    }

    #[test]
    fn define_runs_under_command_line_injection() {
        let info = lookup("define").unwrap();
        assert!(info.flags.contains(DirectiveFlags::IN_I));
    }

    #[test]
    fn error_has_no_flags() {
        let info = lookup("error").unwrap();
        assert!(info.flags.is_empty());
    }

    #[test]
    fn unknown_directive_is_none() {
        assert!(lookup("frobnicate").is_none());
    }

    #[test]
    fn every_name_is_unique() {
        let mut names: Vec<&str> = DIRECTIVES.iter().map(|d| d.name).collect();
        names.sort_unstable();
        let mut deduped = names.clone();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
    }
}
