use ahashmap::AHashMap;
use swc_ecma_ast::Id;

use crate::record::ModuleId;

/// Identity of a symbol across the whole build: the owning module plus the
/// symbol's index in that module's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId {
    pub module: ModuleId,
    pub index: u32,
}

impl SymbolId {
    pub fn new(module: ModuleId, index: u32) -> Self {
        Self { module, index }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Class,
    /// Local binding introduced by an import specifier. Resolves to another
    /// module's symbol through `link`.
    ImportBinding,
    /// Synthesized namespace object for a module.
    Namespace,
    Unbound,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    /// Name as written in the source.
    pub name: String,
    pub kind: SymbolKind,
    /// True when the symbol is written after initialization.
    pub mutated: bool,
    /// References from the declaring module.
    pub use_count: u32,
    /// References linked in from other modules.
    pub external_use_count: u32,
    /// Redirect to another symbol; this is how `import { x } from './a'`
    /// aliases the importer's binding onto `a`'s export.
    pub link: Option<SymbolId>,
    /// For import bindings: the import record that introduced this symbol.
    pub import_record: Option<usize>,
}

impl Symbol {
    fn new(name: String, kind: SymbolKind) -> Self {
        Self {
            name,
            kind,
            mutated: false,
            use_count: 0,
            external_use_count: 0,
            link: None,
            import_record: None,
        }
    }
}

/// Per-module symbol table. Top-level bindings are registered by their SWC
/// `Id` (atom + hygiene context), so shadowed names in nested scopes can
/// never alias a top-level slot.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    by_id: AHashMap<Id, u32>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a binding, returning the existing slot on re-declaration
    /// (`var` redeclares, function overloads).
    pub fn declare(&mut self, id: &Id, kind: SymbolKind) -> u32 {
        if let Some(&index) = self.by_id.get(id) {
            return index;
        }
        let index = self.symbols.len() as u32;
        self.symbols.push(Symbol::new(id.0.to_string(), kind));
        self.by_id.insert(id.clone(), index);
        index
    }

    /// Registers a symbol with no source binding (default exports of
    /// expressions, namespace objects).
    pub fn declare_synthetic(&mut self, name: impl Into<String>, kind: SymbolKind) -> u32 {
        let index = self.symbols.len() as u32;
        self.symbols.push(Symbol::new(name.into(), kind));
        index
    }

    pub fn lookup(&self, id: &Id) -> Option<u32> {
        self.by_id.get(id).copied()
    }

    pub fn get(&self, index: u32) -> &Symbol {
        &self.symbols[index as usize]
    }

    pub fn get_mut(&mut self, index: u32) -> &mut Symbol {
        &mut self.symbols[index as usize]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u32, s))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use swc_common::SyntaxContext;

    fn id(name: &str) -> Id {
        (name.into(), SyntaxContext::empty())
    }

    #[test]
    fn redeclaration_reuses_the_slot() {
        let mut table = SymbolTable::new();
        let first = table.declare(&id("x"), SymbolKind::Variable);
        let second = table.declare(&id("x"), SymbolKind::Variable);
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn synthetic_symbols_do_not_collide_with_bindings() {
        let mut table = SymbolTable::new();
        let default_slot = table.declare_synthetic("default", SymbolKind::Variable);
        let binding = table.declare(&id("default"), SymbolKind::Variable);
        assert_ne!(default_slot, binding);
        assert_eq!(table.lookup(&id("default")), Some(binding));
    }
}
