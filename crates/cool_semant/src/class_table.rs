// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! The class table: class registration, inheritance-graph validation, and
//! the subtype lattice queries used by the type checker.
//!
//! The table is built once per compilation (built-ins first, then every
//! user class), validated, and read-only afterwards.

use std::collections::{HashMap, HashSet};

use cool_frontend::ast::{Class, Expr, Feature, Formal};
use cool_frontend::source::Span;

use crate::diag::{DiagSink, SemantError};

pub const OBJECT: &str = "Object";
pub const IO: &str = "IO";
pub const INT: &str = "Int";
pub const BOOL: &str = "Bool";
pub const STRING: &str = "String";
pub const MAIN: &str = "Main";
pub const SELF: &str = "self";
pub const SELF_TYPE: &str = "SELF_TYPE";

/// Parent sentinel carried only by `Object`.
pub const NO_CLASS: &str = "_no_class";
/// Type of the value slots of the primitive classes.
pub const PRIM_SLOT: &str = "_prim_slot";

/// Borrowed view of a method declaration, as found by [`ClassTable::resolve_method`].
#[derive(Debug, Clone, Copy)]
pub struct MethodSig<'a> {
    pub formals: &'a [Formal],
    pub ret_type: &'a str,
}

#[derive(Debug)]
pub struct ClassTable {
    classes: HashMap<String, Class>,
    parents: HashMap<String, String>,
    /// Registration order; keeps validation diagnostics deterministic.
    order: Vec<String>,
}

impl ClassTable {
    pub fn new() -> Self {
        let mut table = ClassTable {
            classes: HashMap::new(),
            parents: HashMap::new(),
            order: Vec::new(),
        };
        table.install_basic_classes();
        table
    }

    /// Inserts a user class declaration. On failure a diagnostic is recorded
    /// and no hierarchy entry is made.
    pub fn register(&mut self, class: &Class, sink: &mut DiagSink<'_>) {
        let parent = class
            .parent
            .clone()
            .unwrap_or_else(|| OBJECT.to_string());

        if class.name == SELF_TYPE {
            sink.report(class.span, SemantError::SelfTypeClassName);
            return;
        }
        if parent == BOOL || parent == STRING || parent == SELF_TYPE {
            sink.report(
                class.span,
                SemantError::IllegalParent {
                    class: class.name.clone(),
                    parent,
                },
            );
            return;
        }
        if self.classes.contains_key(&class.name) {
            sink.report(class.span, SemantError::DuplicateClass(class.name.clone()));
            return;
        }

        self.parents.insert(class.name.clone(), parent);
        self.classes.insert(class.name.clone(), class.clone());
        self.order.push(class.name.clone());
    }

    /// Checks that every parent chain reaches `Object` without revisiting a
    /// class, and that `Main` exists. Errors accumulate across classes;
    /// each class's walk stops at its first failure.
    pub fn validate(&self, sink: &mut DiagSink<'_>) -> bool {
        let before = sink.count();

        for name in &self.order {
            let span = self.classes[name].span;
            let mut seen: HashSet<&str> = HashSet::new();
            seen.insert(name);

            let mut cur = self.parents[name].as_str();
            while cur != NO_CLASS {
                if !self.classes.contains_key(cur) {
                    sink.report(
                        span,
                        SemantError::UndefinedParent {
                            class: name.clone(),
                            parent: cur.to_string(),
                        },
                    );
                    break;
                }
                if !seen.insert(cur) {
                    sink.report(span, SemantError::InheritanceCycle(name.clone()));
                    break;
                }
                cur = self.parents[cur].as_str();
            }
        }

        if !self.classes.contains_key(MAIN) {
            sink.report_unlocated(SemantError::MainNotDefined);
        }

        sink.count() == before
    }

    pub fn class_exists(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn get_class(&self, name: &str) -> Option<&Class> {
        self.classes.get(name)
    }

    /// `child` and every class on its parent chain, innermost first.
    /// Requires a validated (acyclic) hierarchy.
    pub fn ancestry<'a>(&'a self, name: &'a str) -> Vec<&'a str> {
        let mut chain = vec![name];
        let mut cur = name;
        while let Some(p) = self.parents.get(cur) {
            if p == NO_CLASS {
                break;
            }
            cur = p.as_str();
            chain.push(cur);
        }
        chain
    }

    /// Reflexive, transitive subtype test along the parent chain. O(depth).
    pub fn is_subtype(&self, child: &str, parent: &str) -> bool {
        if parent == OBJECT {
            return true;
        }
        let mut cur = child;
        loop {
            if cur == parent {
                return true;
            }
            match self.parents.get(cur) {
                Some(p) if p != NO_CLASS => cur = p.as_str(),
                _ => return false,
            }
        }
    }

    /// Nearest common ancestor of `a` and `b`. The hierarchy is a tree, so
    /// the first of `a`'s ancestors found anywhere on `b`'s chain is the
    /// unique lowest one. O(depth²), which is fine at these depths.
    pub fn least_upper_bound(&self, a: &str, b: &str) -> String {
        if a == OBJECT || b == OBJECT {
            return OBJECT.to_string();
        }
        let b_chain = self.ancestry(b);
        for anc in self.ancestry(a) {
            for b_anc in &b_chain {
                if anc == *b_anc {
                    return anc.to_string();
                }
            }
        }
        OBJECT.to_string()
    }

    /// The class's own declaration of `method`, ignoring inherited ones.
    fn own_method(&self, class: &str, method: &str) -> Option<MethodSig<'_>> {
        let class = self.classes.get(class)?;
        class.features.iter().find_map(|f| match f {
            Feature::Method {
                name,
                formals,
                ret_type,
                ..
            } if name == method => Some(MethodSig {
                formals,
                ret_type,
            }),
            _ => None,
        })
    }

    /// Inheritance-aware method lookup starting at `start` and walking
    /// toward `Object`.
    pub fn resolve_method(&self, start: &str, method: &str) -> Option<MethodSig<'_>> {
        self.ancestry(start)
            .into_iter()
            .find_map(|c| self.own_method(c, method))
    }

    /// The nearest proper ancestor of `class` that declares `method` itself.
    /// Used for override checking, so a method is never compared against
    /// its own declaration.
    pub fn nearest_ancestor_defining<'a>(
        &'a self,
        class: &'a str,
        method: &str,
    ) -> Option<&'a str> {
        self.ancestry(class)
            .into_iter()
            .skip(1)
            .find(|c| self.own_method(c, method).is_some())
    }

    /// Compares the two classes' own declarations of `method`: same arity,
    /// same formal types in order (names may differ), same return type.
    pub fn signatures_match(&self, class_a: &str, class_b: &str, method: &str) -> bool {
        let (Some(a), Some(b)) = (
            self.own_method(class_a, method),
            self.own_method(class_b, method),
        ) else {
            return false;
        };
        a.formals.len() == b.formals.len()
            && a.ret_type == b.ret_type
            && a.formals
                .iter()
                .zip(b.formals.iter())
                .all(|(fa, fb)| fa.ty == fb.ty)
    }

    /// The five built-in classes. Method bodies are `no_expr`; they are
    /// provided by the runtime and never type-checked.
    fn install_basic_classes(&mut self) {
        let object = basic_class(
            OBJECT,
            NO_CLASS,
            vec![
                method("abort", &[], OBJECT),
                method("type_name", &[], STRING),
                method("copy", &[], SELF_TYPE),
            ],
        );
        let io = basic_class(
            IO,
            OBJECT,
            vec![
                method("out_string", &[("arg", STRING)], SELF_TYPE),
                method("out_int", &[("arg", INT)], SELF_TYPE),
                method("in_string", &[], STRING),
                method("in_int", &[], INT),
            ],
        );
        let int = basic_class(INT, OBJECT, vec![attr("_val", PRIM_SLOT)]);
        let bool_ = basic_class(BOOL, OBJECT, vec![attr("_val", PRIM_SLOT)]);
        let string = basic_class(
            STRING,
            OBJECT,
            vec![
                attr("_val", INT),
                attr("_str_field", PRIM_SLOT),
                method("length", &[], INT),
                method("concat", &[("arg", STRING)], STRING),
                method("substr", &[("arg", INT), ("arg2", INT)], STRING),
            ],
        );

        for class in [object, io, int, bool_, string] {
            self.parents.insert(
                class.name.clone(),
                class.parent.clone().unwrap_or_else(|| NO_CLASS.to_string()),
            );
            self.order.push(class.name.clone());
            self.classes.insert(class.name.clone(), class);
        }
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        ClassTable::new()
    }
}

fn basic_class(name: &str, parent: &str, features: Vec<Feature>) -> Class {
    Class {
        name: name.to_string(),
        parent: (parent != NO_CLASS).then(|| parent.to_string()),
        features,
        span: Span::DUMMY,
    }
}

fn method(name: &str, formals: &[(&str, &str)], ret: &str) -> Feature {
    Feature::Method {
        name: name.to_string(),
        formals: formals
            .iter()
            .map(|(n, t)| Formal {
                name: n.to_string(),
                ty: t.to_string(),
                span: Span::DUMMY,
            })
            .collect(),
        ret_type: ret.to_string(),
        body: Expr::no_expr(Span::DUMMY),
        span: Span::DUMMY,
    }
}

fn attr(name: &str, ty: &str) -> Feature {
    Feature::Attr {
        name: name.to_string(),
        ty: ty.to_string(),
        init: Expr::no_expr(Span::DUMMY),
        span: Span::DUMMY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cool_frontend::source::SourceMap;
    use proptest::prelude::*;

    fn user_class(name: &str, parent: Option<&str>) -> Class {
        Class {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            features: vec![],
            span: Span::DUMMY,
        }
    }

    /// Registers a linear chain Main, A, B inherits A, C inherits B.
    fn chain_table() -> ClassTable {
        let map = SourceMap::new();
        let mut sink = DiagSink::new(&map);
        let mut table = ClassTable::new();
        table.register(&user_class("Main", None), &mut sink);
        table.register(&user_class("A", None), &mut sink);
        table.register(&user_class("B", Some("A")), &mut sink);
        table.register(&user_class("C", Some("B")), &mut sink);
        assert!(sink.is_empty());
        assert!(table.validate(&mut sink));
        table
    }

    #[test]
    fn builtins_are_always_present() {
        let table = ClassTable::new();
        for name in [OBJECT, IO, INT, BOOL, STRING] {
            assert!(table.class_exists(name), "missing builtin {name}");
        }
        assert!(!table.class_exists("Main"));
    }

    #[test]
    fn builtin_methods_resolve_with_inheritance() {
        let table = ClassTable::new();

        let substr = table.resolve_method(STRING, "substr").unwrap();
        assert_eq!(substr.formals.len(), 2);
        assert_eq!(substr.ret_type, STRING);

        // copy is defined on Object and visible from every class
        let copy = table.resolve_method(INT, "copy").unwrap();
        assert_eq!(copy.ret_type, SELF_TYPE);
        assert!(table.resolve_method(IO, "out_string").is_some());
        assert!(table.resolve_method(OBJECT, "out_string").is_none());
    }

    #[test]
    fn illegal_parent_leaves_no_entry() {
        let map = SourceMap::new();
        for parent in [BOOL, STRING, SELF_TYPE] {
            let mut sink = DiagSink::new(&map);
            let mut table = ClassTable::new();
            table.register(&user_class("Bad", Some(parent)), &mut sink);
            assert_eq!(sink.count(), 1, "parent {parent}");
            assert!(!table.class_exists("Bad"));
        }
    }

    #[test]
    fn duplicate_class_is_rejected() {
        let map = SourceMap::new();
        let mut sink = DiagSink::new(&map);
        let mut table = ClassTable::new();
        table.register(&user_class("A", None), &mut sink);
        table.register(&user_class("A", None), &mut sink);
        assert_eq!(
            sink.diagnostics()[0].error,
            SemantError::DuplicateClass("A".into())
        );
    }

    #[test]
    fn redefining_a_builtin_is_rejected() {
        let map = SourceMap::new();
        let mut sink = DiagSink::new(&map);
        let mut table = ClassTable::new();
        table.register(&user_class("Int", None), &mut sink);
        assert_eq!(sink.count(), 1);
    }

    #[test]
    fn cycle_is_reported_for_every_class_on_it() {
        let map = SourceMap::new();
        let mut sink = DiagSink::new(&map);
        let mut table = ClassTable::new();
        table.register(&user_class("Main", None), &mut sink);
        table.register(&user_class("A", Some("B")), &mut sink);
        table.register(&user_class("B", Some("A")), &mut sink);
        assert!(!table.validate(&mut sink));
        let cycles = sink
            .diagnostics()
            .iter()
            .filter(|d| matches!(d.error, SemantError::InheritanceCycle(_)))
            .count();
        assert_eq!(cycles, 2);
    }

    #[test]
    fn undefined_parent_is_reported() {
        let map = SourceMap::new();
        let mut sink = DiagSink::new(&map);
        let mut table = ClassTable::new();
        table.register(&user_class("Main", None), &mut sink);
        table.register(&user_class("A", Some("Nowhere")), &mut sink);
        assert!(!table.validate(&mut sink));
        assert!(sink.diagnostics().iter().any(|d| matches!(
            d.error,
            SemantError::UndefinedParent { .. }
        )));
    }

    #[test]
    fn missing_main_is_reported_without_a_location() {
        let map = SourceMap::new();
        let mut sink = DiagSink::new(&map);
        let mut table = ClassTable::new();
        table.register(&user_class("A", None), &mut sink);
        assert!(!table.validate(&mut sink));
        let diag = &sink.diagnostics()[0];
        assert_eq!(diag.error, SemantError::MainNotDefined);
        assert_eq!(diag.location, None);
    }

    #[test]
    fn subtype_follows_the_chain() {
        let table = chain_table();
        assert!(table.is_subtype("C", "A"));
        assert!(table.is_subtype("C", "C"));
        assert!(table.is_subtype("C", OBJECT));
        assert!(!table.is_subtype("A", "C"));
        assert!(!table.is_subtype(INT, BOOL));
    }

    #[test]
    fn lub_finds_the_nearest_common_ancestor() {
        let map = SourceMap::new();
        let mut sink = DiagSink::new(&map);
        let mut table = ClassTable::new();
        table.register(&user_class("Main", None), &mut sink);
        table.register(&user_class("A", None), &mut sink);
        table.register(&user_class("B", Some("A")), &mut sink);
        table.register(&user_class("C", Some("A")), &mut sink);
        assert!(table.validate(&mut sink));

        assert_eq!(table.least_upper_bound("B", "C"), "A");
        assert_eq!(table.least_upper_bound("B", "A"), "A");
        assert_eq!(table.least_upper_bound("B", "Main"), OBJECT);
        assert_eq!(table.least_upper_bound(INT, STRING), OBJECT);
    }

    #[test]
    fn nearest_ancestor_skips_the_class_itself() {
        let map = SourceMap::new();
        let mut sink = DiagSink::new(&map);
        let mut table = ClassTable::new();
        let mut a = user_class("A", None);
        a.features.push(method("f", &[("x", INT)], INT));
        let mut b = user_class("B", Some("A"));
        b.features.push(method("f", &[("y", INT)], INT));
        table.register(&user_class("Main", None), &mut sink);
        table.register(&a, &mut sink);
        table.register(&b, &mut sink);
        assert!(table.validate(&mut sink));

        assert_eq!(table.nearest_ancestor_defining("B", "f"), Some("A"));
        assert_eq!(table.nearest_ancestor_defining("A", "f"), None);
        // same formal types under different names still match
        assert!(table.signatures_match("A", "B", "f"));
    }

    #[test]
    fn differing_signatures_do_not_match() {
        let map = SourceMap::new();
        let mut sink = DiagSink::new(&map);
        let mut table = ClassTable::new();
        let mut a = user_class("A", None);
        a.features.push(method("f", &[("x", INT)], INT));
        let mut b = user_class("B", Some("A"));
        b.features.push(method("f", &[("x", INT), ("y", INT)], INT));
        let mut c = user_class("C", Some("A"));
        c.features.push(method("f", &[("x", INT)], STRING));
        table.register(&user_class("Main", None), &mut sink);
        table.register(&a, &mut sink);
        table.register(&b, &mut sink);
        table.register(&c, &mut sink);
        assert!(table.validate(&mut sink));

        assert!(!table.signatures_match("A", "B", "f"));
        assert!(!table.signatures_match("A", "C", "f"));
    }

    /// Random single-inheritance forests hung under Object: each class's
    /// parent is either Object or an earlier class, so the graph is a tree
    /// by construction.
    fn arbitrary_tree() -> impl Strategy<Value = Vec<Option<usize>>> {
        prop::collection::vec(prop::option::of(0usize..16), 1..16).prop_map(|parents| {
            parents
                .into_iter()
                .enumerate()
                .map(|(i, p)| p.filter(|&p| p < i))
                .collect()
        })
    }

    fn table_from_tree(parents: &[Option<usize>]) -> ClassTable {
        let map = SourceMap::new();
        let mut sink = DiagSink::new(&map);
        let mut table = ClassTable::new();
        table.register(&user_class("Main", None), &mut sink);
        for (i, p) in parents.iter().enumerate() {
            let parent = p.map(|p| format!("K{p}"));
            table.register(&user_class(&format!("K{i}"), parent.as_deref()), &mut sink);
        }
        assert!(sink.is_empty());
        assert!(table.validate(&mut sink));
        table
    }

    proptest! {
        #[test]
        fn everything_is_a_subtype_of_object(parents in arbitrary_tree()) {
            let table = table_from_tree(&parents);
            prop_assert!(table.is_subtype(OBJECT, OBJECT));
            for i in 0..parents.len() {
                let name = format!("K{i}");
                prop_assert!(table.is_subtype(&name, OBJECT));
            }
        }

        #[test]
        fn lub_is_symmetric_and_idempotent(parents in arbitrary_tree(), a in 0usize..16, b in 0usize..16) {
            let table = table_from_tree(&parents);
            let a = format!("K{}", a % parents.len());
            let b = format!("K{}", b % parents.len());
            prop_assert_eq!(
                table.least_upper_bound(&a, &b),
                table.least_upper_bound(&b, &a)
            );
            prop_assert_eq!(table.least_upper_bound(&a, &a), a.clone());

            // the lub is an upper bound of both sides
            let lub = table.least_upper_bound(&a, &b);
            prop_assert!(table.is_subtype(&a, &lub));
            prop_assert!(table.is_subtype(&b, &lub));
        }
    }
}
