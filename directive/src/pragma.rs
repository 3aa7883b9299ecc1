//! The `#pragma` registry: a two-level namespace (root leaves, plus
//! one level of namespaces such as `GCC poison`) mapping a name to a
//! handler the dispatcher invokes with the remaining tokens on the
//! line.
//!
//! Handlers are looked up with a lookahead: the token right after
//! `#pragma` is tried first as a namespace (does it have any
//! registered leaves?); if not, it is tried as a root-level leaf
//! directly. This mirrors how `GCC poison` and a plain `once` coexist
//! under the same directive.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::PreprocessError;

/// What a pragma handler is given: the tokens following the pragma
/// name (and namespace, if any), spelled as strings since most
/// built-in pragmas only care about bare identifiers.
pub type PragmaHandler = Rc<dyn Fn(&[String]) -> Result<(), PreprocessError>>;

#[derive(Default)]
struct Namespace {
    leaves: HashMap<String, PragmaHandler>,
}

/// Registered pragma namespaces and root-level leaves.
#[derive(Default)]
pub struct PragmaRegistry {
    root: Namespace,
    namespaces: HashMap<String, Namespace>,
}

impl PragmaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a root-level pragma (`#pragma NAME ...`).
    pub fn register_root(&mut self, name: &str, handler: PragmaHandler) -> Result<(), PreprocessError> {
        if self.root.leaves.contains_key(name) {
            return Err(PreprocessError::pragma_error(
                String::new(),
                0,
                format!("pragma `{name}` registered twice at root"),
            ));
        }
        self.root.leaves.insert(name.to_string(), handler);
        Ok(())
    }

    /// Register a namespaced pragma (`#pragma NAMESPACE NAME ...`),
    /// creating the namespace if it does not yet exist.
    pub fn register_namespaced(
        &mut self,
        namespace: &str,
        name: &str,
        handler: PragmaHandler,
    ) -> Result<(), PreprocessError> {
        let ns = self.namespaces.entry(namespace.to_string()).or_default();
        if ns.leaves.contains_key(name) {
            return Err(PreprocessError::pragma_error(
                String::new(),
                0,
                format!("pragma `{namespace} {name}` registered twice"),
            ));
        }
        ns.leaves.insert(name.to_string(), handler);
        Ok(())
    }

    #[must_use]
    pub fn has_namespace(&self, name: &str) -> bool {
        self.namespaces.contains_key(name)
    }

    /// Look up a namespaced pragma's handler.
    #[must_use]
    pub fn lookup_namespaced(&self, namespace: &str, name: &str) -> Option<PragmaHandler> {
        self.namespaces.get(namespace)?.leaves.get(name).cloned()
    }

    /// Look up a root-level pragma's handler.
    #[must_use]
    pub fn lookup_root(&self, name: &str) -> Option<PragmaHandler> {
        self.root.leaves.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn root_leaf_lookup() {
        let mut reg = PragmaRegistry::new();
        let called = Rc::new(RefCell::new(false));
        let called2 = called.clone();
        reg.register_root(
            "once",
            Rc::new(move |_| {
                *called2.borrow_mut() = true;
                Ok(())
            }),
        )
        .unwrap();
        assert!(reg.lookup_root("once").is_some());
        (reg.lookup_root("once").unwrap())(&[]).unwrap();
        assert!(*called.borrow());
    }

    #[test]
    fn namespaced_lookup_is_independent_from_root() {
        let mut reg = PragmaRegistry::new();
        reg.register_namespaced("GCC", "poison", Rc::new(|_| Ok(())))
            .unwrap();
        assert!(reg.has_namespace("GCC"));
        assert!(reg.lookup_namespaced("GCC", "poison").is_some());
        assert!(reg.lookup_root("poison").is_none());
    }

    #[test]
    fn duplicate_registration_errors() {
        let mut reg = PragmaRegistry::new();
        reg.register_root("once", Rc::new(|_| Ok(()))).unwrap();
        assert!(reg.register_root("once", Rc::new(|_| Ok(()))).is_err());
    }
}
