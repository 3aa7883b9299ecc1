//! Aggregates every piece of state the dispatcher owns: the macro
//! table, the assertion database, the pragma registry, the identifier
//! flag table, and the buffer stack. Everything here is storage and
//! bookkeeping; the algorithms that read it (lexing, expansion,
//! expression evaluation) live behind the [`crate::collab`] contracts.

use std::collections::HashMap;
use std::rc::Rc;

use crate::assertions::AssertionTable;
use crate::buffer_stack::{Buffer, BufferOrigin, BufferStack};
use crate::config::DirectiveConfig;
use crate::error::PreprocessError;
use crate::ident::{HashIdentTable, IdentTable, NodeFlags};
use crate::macro_def::{DefinitionSite, MacroDef};
use crate::pragma::PragmaRegistry;
use crate::token::Token;

/// All mutable state for one preprocessing run.
pub struct DirectiveContext {
    pub macros: HashMap<String, Rc<MacroDef>>,
    pub assertions: AssertionTable,
    pub pragmas: PragmaRegistry,
    pub idents: Box<dyn IdentTable>,
    pub buffers: BufferStack,
    pub config: DirectiveConfig,
}

impl DirectiveContext {
    #[must_use]
    pub fn new(config: DirectiveConfig) -> Self {
        let max_depth = config.max_buffer_depth;
        let mut ctx = DirectiveContext {
            macros: HashMap::new(),
            assertions: AssertionTable::new(),
            pragmas: PragmaRegistry::new(),
            idents: Box::new(HashIdentTable::new()),
            buffers: BufferStack::with_max_depth(max_depth),
            config,
        };
        crate::engine::register_builtin_pragmas(&mut ctx.pragmas);
        ctx
    }

    /// Current file for diagnostics and `__FILE__`, taken from the
    /// innermost open buffer.
    #[must_use]
    pub fn current_file(&self) -> String {
        self.buffers
            .top()
            .map(|b| b.file.clone())
            .unwrap_or_else(|| "<unknown>".to_string())
    }

    /// Current line for diagnostics and `__LINE__`.
    #[must_use]
    pub fn current_line(&self) -> usize {
        self.buffers.top().map(|b| b.current_line).unwrap_or(0)
    }

    pub fn enter_buffer(&mut self, file: String, origin: BufferOrigin) -> Result<(), PreprocessError> {
        log::debug!("entering buffer {file} ({origin:?}), depth {}", self.buffers.depth() + 1);
        self.buffers.push(Buffer::new(file, origin))
    }

    /// Install a macro definition, honoring the rule that a benign
    /// redefinition (identical body) is silent while a conflicting one
    /// is a pedantic warning, not an error.
    pub fn define_macro(&mut self, def: MacroDef) -> Option<PreprocessError> {
        let name = def.name.clone();
        let warning = match self.macros.get(&name) {
            Some(existing) if !existing.is_identical_to(&def) => Some(PreprocessError::pedwarn(
                self.current_file(),
                self.current_line(),
                format!("\"{name}\" redefined"),
            )),
            _ => None,
        };
        self.idents.insert_flags(&name, NodeFlags::MACRO);
        self.macros.insert(name, Rc::new(def));
        warning
    }

    pub fn define_builtin(&mut self, name: &str, value: &str, tokenize: impl Fn(&str) -> Vec<Token>) {
        let def = MacroDef::builtin(name.to_string(), tokenize(value));
        self.idents.insert_flags(name, NodeFlags::MACRO | NodeFlags::BUILTIN);
        self.macros.insert(name.to_string(), Rc::new(def));
    }

    /// Remove a macro. Undefining a name that was never a macro is not
    /// an error; undefining a builtin is a pedantic warning.
    pub fn undef_macro(&mut self, name: &str) -> Option<PreprocessError> {
        let warning = match self.macros.get(name) {
            Some(def) if def.is_builtin => Some(PreprocessError::pedwarn(
                self.current_file(),
                self.current_line(),
                format!("undefining builtin macro \"{name}\""),
            )),
            _ => None,
        };
        self.macros.remove(name);
        self.idents.remove_flags(name, NodeFlags::MACRO | NodeFlags::BUILTIN);
        warning
    }

    #[must_use]
    pub fn is_macro_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    #[must_use]
    pub fn lookup_macro(&self, name: &str) -> Option<Rc<MacroDef>> {
        self.macros.get(name).cloned()
    }

    pub fn poison(&mut self, name: &str) {
        self.idents.insert_flags(name, NodeFlags::POISONED);
    }

    #[must_use]
    pub fn is_poisoned(&self, name: &str) -> bool {
        self.idents.flags(name).contains(NodeFlags::POISONED)
    }

    #[must_use]
    pub fn definition_site_here(&self) -> Option<DefinitionSite> {
        Some(DefinitionSite {
            file: self.current_file(),
            line: self.current_line(),
        })
    }
}
