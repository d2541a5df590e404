//! Scoped symbol table with forward references.
//!
//! A name is *declared* once it is known to the table and *defined* once it
//! carries a value. Lookups fall back to the parent scope on a miss; local
//! labels (`.loop`) live in a child scope of the nearest global label.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::ast::NodeId;
use crate::error::SymbolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SymbolKind {
    Unknown,
    Label,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub identifier: String,
    pub kind: SymbolKind,
    pub declaration: Option<NodeId>,
    pub value: Option<i64>,
}

#[derive(Debug, Clone, Default)]
struct Scope {
    parent: Option<ScopeId>,
    symbols: BTreeMap<String, Symbol>,
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn open_scope(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(parent),
            symbols: BTreeMap::new(),
        });
        id
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes.get(scope.0).and_then(|s| s.parent)
    }

    fn scope_mut(&mut self, scope: ScopeId) -> Result<&mut Scope, SymbolError> {
        self.scopes
            .get_mut(scope.0)
            .ok_or(SymbolError::UnknownScope(scope.0))
    }

    /// Adds an `Unknown` placeholder to `scope` unless one is already there.
    pub fn define(&mut self, scope: ScopeId, name: &str) -> Result<(), SymbolError> {
        let scope = self.scope_mut(scope)?;
        match scope.symbols.get(name) {
            Some(existing) if existing.kind != SymbolKind::Unknown => Err(SymbolError::Duplicate {
                name: name.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                scope.symbols.insert(
                    name.to_string(),
                    Symbol {
                        identifier: name.to_string(),
                        kind: SymbolKind::Unknown,
                        declaration: None,
                        value: None,
                    },
                );
                Ok(())
            }
        }
    }

    /// Promotes a placeholder to `kind`, or inserts a fresh symbol.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: SymbolKind,
        declaration: Option<NodeId>,
    ) -> Result<(), SymbolError> {
        let scope = self.scope_mut(scope)?;
        let entry = scope
            .symbols
            .entry(name.to_string())
            .or_insert_with(|| Symbol {
                identifier: name.to_string(),
                kind: SymbolKind::Unknown,
                declaration: None,
                value: None,
            });
        if entry.kind != SymbolKind::Unknown {
            return Err(SymbolError::Duplicate {
                name: name.to_string(),
            });
        }
        entry.kind = kind;
        entry.declaration = declaration;
        Ok(())
    }

    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let s = self.scopes.get(id.0)?;
            if let Some(sym) = s.symbols.get(name) {
                return Some(sym);
            }
            cur = s.parent;
        }
        None
    }

    pub fn is_declared(&self, scope: ScopeId, name: &str) -> bool {
        self.lookup(scope, name).is_some()
    }

    pub fn is_defined(&self, scope: ScopeId, name: &str) -> bool {
        self.lookup(scope, name).is_some_and(|s| s.value.is_some())
    }

    /// Assigns a value to the nearest visible `name`. Returns the old value.
    pub fn set_value(&mut self, scope: ScopeId, name: &str, value: i64) -> Option<i64> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let s = self.scopes.get_mut(id.0)?;
            if let Some(sym) = s.symbols.get_mut(name) {
                return sym.value.replace(value);
            }
            cur = s.parent;
        }
        None
    }

    /// Every declared label with its scope, global scope first.
    pub fn labels(&self) -> impl Iterator<Item = (ScopeId, &Symbol)> {
        self.scopes.iter().enumerate().flat_map(|(i, s)| {
            s.symbols
                .values()
                .filter(|sym| sym.kind == SymbolKind::Label)
                .map(move |sym| (ScopeId(i), sym))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_then_declare() {
        let mut t = SymbolTable::new();
        let g = t.global();
        t.define(g, "start").unwrap();
        t.define(g, "start").unwrap();
        assert!(t.is_declared(g, "start"));
        assert!(!t.is_defined(g, "start"));
        t.declare(g, "start", SymbolKind::Label, None).unwrap();
        assert_eq!(
            t.define(g, "start"),
            Err(SymbolError::Duplicate { name: "start".into() })
        );
        assert_eq!(
            t.declare(g, "start", SymbolKind::Label, None),
            Err(SymbolError::Duplicate { name: "start".into() })
        );
    }

    #[test]
    fn lookup_walks_to_parent() {
        let mut t = SymbolTable::new();
        let g = t.global();
        let local = t.open_scope(g);
        t.declare(g, "main", SymbolKind::Label, None).unwrap();
        t.declare(local, ".loop", SymbolKind::Label, None).unwrap();
        t.set_value(local, "main", 0x400);
        assert_eq!(t.lookup(local, "main").and_then(|s| s.value), Some(0x400));
        assert!(t.lookup(g, ".loop").is_none());
        assert!(t.is_defined(local, "main"));
    }

    #[test]
    fn same_local_name_in_sibling_scopes() {
        let mut t = SymbolTable::new();
        let g = t.global();
        let a = t.open_scope(g);
        let b = t.open_scope(g);
        t.declare(a, ".next", SymbolKind::Label, None).unwrap();
        t.declare(b, ".next", SymbolKind::Label, None).unwrap();
        assert_eq!(t.labels().count(), 2);
    }

    #[test]
    fn unknown_scope() {
        let mut t = SymbolTable::new();
        assert_eq!(t.define(ScopeId(9), "x"), Err(SymbolError::UnknownScope(9)));
    }
}
