//! Per-identifier directive-relevant flags and the table that stores
//! them.
//!
//! The real identifier hash table (interning, case folding, whatever
//! the host compiler already has lying around) is out of scope; this
//! module only tracks the handful of bits the dispatcher itself needs
//! to attach to a name, behind a trait so a caller can back it with
//! their own interner instead of the bundled `HashMap`.

use std::collections::HashMap;

bitflags::bitflags! {
    /// Directive-relevant state attached to an identifier.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct NodeFlags: u16 {
        /// Currently has a macro definition (object-like or
        /// function-like).
        const MACRO = 0b0000_0001;
        /// Currently has an assertion (`#assert`) definition.
        const ASSERTION = 0b0000_0010;
        /// Poisoned via `#pragma GCC poison`; referencing it is an
        /// error.
        const POISONED = 0b0000_0100;
        /// Installed by the dispatcher itself, not by source text
        /// (`__FILE__`, `__LINE__`, target/compiler macros).
        const BUILTIN = 0b0000_1000;
        /// Has a registered `#pragma` handler under this name (root
        /// namespace or a namespace leaf).
        const PRAGMA = 0b0001_0000;
        /// Referencing this identifier should emit a diagnostic even
        /// though it is not poisoned (used by `#pragma GCC
        /// system_header`-style soft deprecations).
        const DIAGNOSTIC = 0b0010_0000;
    }
}

/// Storage for per-identifier flags, keyed by spelling.
///
/// Implemented by default over a `HashMap`; a caller with its own
/// interned-identifier type can implement this directly over that
/// interner instead of paying for a second string-keyed table.
pub trait IdentTable {
    fn flags(&self, name: &str) -> NodeFlags;
    fn set_flags(&mut self, name: &str, flags: NodeFlags);
    fn insert_flags(&mut self, name: &str, flags: NodeFlags) {
        let combined = self.flags(name) | flags;
        self.set_flags(name, combined);
    }
    fn remove_flags(&mut self, name: &str, flags: NodeFlags) {
        let combined = self.flags(name) & !flags;
        self.set_flags(name, combined);
    }
}

/// A plain `HashMap<String, NodeFlags>`-backed [`IdentTable`], used
/// when the caller has no interner of its own to plug in.
#[derive(Debug, Default)]
pub struct HashIdentTable {
    flags: HashMap<String, NodeFlags>,
}

impl HashIdentTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentTable for HashIdentTable {
    fn flags(&self, name: &str) -> NodeFlags {
        self.flags.get(name).copied().unwrap_or(NodeFlags::empty())
    }

    fn set_flags(&mut self, name: &str, flags: NodeFlags) {
        if flags.is_empty() {
            self.flags.remove(name);
        } else {
            self.flags.insert(name.to_string(), flags);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove_flags() {
        let mut table = HashIdentTable::new();
        table.insert_flags("FOO", NodeFlags::MACRO);
        assert!(table.flags("FOO").contains(NodeFlags::MACRO));
        table.insert_flags("FOO", NodeFlags::POISONED);
        assert!(table.flags("FOO").contains(NodeFlags::MACRO));
        assert!(table.flags("FOO").contains(NodeFlags::POISONED));
        table.remove_flags("FOO", NodeFlags::MACRO);
        assert!(!table.flags("FOO").contains(NodeFlags::MACRO));
        assert!(table.flags("FOO").contains(NodeFlags::POISONED));
    }

    #[test]
    fn unknown_identifier_has_no_flags() {
        let table = HashIdentTable::new();
        assert!(table.flags("UNSEEN").is_empty());
    }

    #[test]
    fn clearing_all_flags_drops_entry() {
        let mut table = HashIdentTable::new();
        table.insert_flags("FOO", NodeFlags::MACRO);
        table.remove_flags("FOO", NodeFlags::MACRO);
        assert!(!table.flags.contains_key("FOO"));
    }
}
