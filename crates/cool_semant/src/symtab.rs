// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Lexically scoped symbol table.
//!
//! A stack of scopes mapping identifiers to values. `lookup` searches from
//! the innermost scope outward; `probe` consults only the innermost scope,
//! which is what duplicate-in-same-scope checks need.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct SymbolTable<K, V> {
    scopes: Vec<HashMap<K, V>>,
}

impl<K: Eq + Hash, V> SymbolTable<K, V> {
    pub fn new() -> Self {
        SymbolTable { scopes: Vec::new() }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Closing a scope that was never opened is a traversal bug.
    pub fn exit_scope(&mut self) {
        assert!(self.scopes.pop().is_some(), "exit_scope with no open scope");
    }

    /// Binds `name` in the innermost scope, shadowing any outer binding.
    pub fn insert(&mut self, name: K, value: V) {
        self.scopes
            .last_mut()
            .expect("insert with no open scope")
            .insert(name, value);
    }

    /// Innermost binding of `name`, searching all scopes outward.
    pub fn lookup(&self, name: &K) -> Option<&V> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Binding of `name` in the innermost scope only.
    pub fn probe(&self, name: &K) -> Option<&V> {
        self.scopes.last().and_then(|scope| scope.get(name))
    }
}

impl<K: Eq + Hash, V> Default for SymbolTable<K, V> {
    fn default() -> Self {
        SymbolTable::new()
    }
}
