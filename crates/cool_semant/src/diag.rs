// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Diagnostic accumulation for the semantic stage.
//!
//! Type errors are data, not control flow: every check site reports here
//! and supplies a fallback type so the traversal runs to completion. The
//! error count is inspected once, at the end of the stage.

use std::fmt;

use cool_frontend::ast::Ty;
use cool_frontend::source::{SourceMap, Span};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SemantError {
    // Hierarchy errors
    #[error("Class {0} was previously defined.")]
    DuplicateClass(String),

    #[error("Class {class} cannot inherit class {parent}.")]
    IllegalParent { class: String, parent: String },

    #[error("Class cannot have the name SELF_TYPE.")]
    SelfTypeClassName,

    #[error("Class {0}, or an ancestor of {0}, is involved in an inheritance cycle.")]
    InheritanceCycle(String),

    #[error("Class {class} inherits from an undefined class {parent}.")]
    UndefinedParent { class: String, parent: String },

    #[error("Class Main is not defined.")]
    MainNotDefined,

    // Binding errors
    #[error("Undeclared identifier {0}.")]
    UndeclaredIdentifier(String),

    #[error("Attribute {0} is multiply defined.")]
    AttributeRedefined(String),

    #[error("'self' cannot be the name of an attribute.")]
    SelfAttribute,

    #[error("'self' cannot be bound in a 'let' expression.")]
    SelfLetBinding,

    #[error("'self' cannot be the name of a formal parameter.")]
    SelfFormal,

    #[error("Formal parameter {0} is multiply defined.")]
    DuplicateFormal(String),

    #[error("Class {ty} of attribute {attr} is undefined.")]
    UndefinedAttrType { ty: String, attr: String },

    #[error("Class {ty} of formal parameter {formal} is undefined.")]
    UndefinedFormalType { ty: String, formal: String },

    #[error("Undefined return type {ty} in method {method}.")]
    UndefinedReturnType { ty: String, method: String },

    #[error("Class {ty} of let-bound identifier {name} is undefined.")]
    UndefinedLetType { ty: String, name: String },

    #[error("Class {ty} of case branch is undefined.")]
    UndefinedBranchType { ty: String },

    // Subtype errors
    #[error(
        "Type {found} of assigned expression does not conform to declared type {declared} of identifier {name}."
    )]
    AssignMismatch {
        found: Ty,
        declared: Ty,
        name: String,
    },

    #[error("Cannot assign an expression of type SELF_TYPE to identifier {0}.")]
    SelfTypeAssigned(String),

    #[error(
        "Inferred type {found} of initialization of attribute {attr} does not conform to declared type {declared}."
    )]
    AttrInitMismatch {
        found: Ty,
        attr: String,
        declared: Ty,
    },

    #[error(
        "Inferred type {found} of initialization of {name} does not conform to identifier's declared type {declared}."
    )]
    LetInitMismatch {
        found: Ty,
        name: String,
        declared: Ty,
    },

    #[error(
        "Inferred return type {found} of method {method} does not conform to declared return type {declared}."
    )]
    ReturnMismatch {
        found: Ty,
        method: String,
        declared: Ty,
    },

    #[error(
        "In call of method {method}, type {found} of parameter {formal} does not conform to declared type {declared}."
    )]
    ArgMismatch {
        method: String,
        found: Ty,
        formal: String,
        declared: Ty,
    },

    #[error("Expression type {found} does not conform to declared static dispatch type {declared}.")]
    StaticDispatchMismatch { found: Ty, declared: String },

    #[error("Predicate of 'if' does not have type Bool.")]
    IfPredicateNotBool,

    #[error("Loop condition does not have type Bool.")]
    LoopPredicateNotBool,

    // Dispatch errors
    #[error("Dispatch to undefined method {0}.")]
    UndefinedMethod(String),

    #[error("Formal parameter {0} cannot have type SELF_TYPE.")]
    SelfTypeFormal(String),

    #[error("Method {0} called with wrong number of arguments.")]
    WrongArgCount(String),

    #[error("Static dispatch to SELF_TYPE.")]
    StaticDispatchToSelfType,

    #[error("Static dispatch to undefined class {0}.")]
    UndefinedStaticDispatchType(String),

    #[error("'new' used with undefined class {0}.")]
    UndefinedNewType(String),

    // Override errors
    #[error(
        "Invalid override of method {method}: signature differs from the definition inherited from class {ancestor}."
    )]
    InvalidOverride { method: String, ancestor: String },

    // Case errors
    #[error("Duplicate branch {0} in case statement.")]
    DuplicateBranch(String),

    // Operator errors
    #[error("non-Int arguments: {lhs} {op} {rhs}")]
    NonIntArguments { op: &'static str, lhs: Ty, rhs: Ty },

    #[error("Argument of '~' has type {0} instead of Int.")]
    NegNotInt(Ty),

    #[error("Argument of 'not' has type {0} instead of Bool.")]
    NotNotBool(Ty),

    #[error("Illegal comparison with a basic type.")]
    IllegalComparison,
}

/// A semantic error resolved to its source position. Diagnostics without a
/// location (the missing-Main check) print the bare message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: Option<(String, u32)>,
    pub error: SemantError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some((file, line)) => write!(f, "{file}:{line}: {}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Accumulates diagnostics in traversal order.
#[derive(Debug)]
pub struct DiagSink<'m> {
    map: &'m SourceMap,
    diags: Vec<Diagnostic>,
}

impl<'m> DiagSink<'m> {
    pub fn new(map: &'m SourceMap) -> Self {
        DiagSink {
            map,
            diags: Vec::new(),
        }
    }

    pub fn report(&mut self, span: Span, error: SemantError) {
        let location = self
            .map
            .locate(span)
            .map(|(file, line)| (file.to_string(), line));
        self.diags.push(Diagnostic { location, error });
    }

    pub fn report_unlocated(&mut self, error: SemantError) {
        self.diags.push(Diagnostic {
            location: None,
            error,
        });
    }

    pub fn count(&self) -> usize {
        self.diags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diags.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diags
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn located_diagnostics_print_file_and_line() {
        let mut map = SourceMap::new();
        let base = map.add_file("main.cl", "class Main {\n  x : Foo;\n};\n");
        let mut sink = DiagSink::new(&map);

        sink.report(
            Span::new(base + 15, base + 23),
            SemantError::UndefinedAttrType {
                ty: "Foo".into(),
                attr: "x".into(),
            },
        );
        assert_eq!(sink.count(), 1);
        assert_eq!(
            sink.diagnostics()[0].to_string(),
            "main.cl:2: Class Foo of attribute x is undefined."
        );
    }

    #[test]
    fn unlocated_diagnostics_print_the_bare_message() {
        let map = SourceMap::new();
        let mut sink = DiagSink::new(&map);
        sink.report_unlocated(SemantError::MainNotDefined);
        assert_eq!(sink.diagnostics()[0].to_string(), "Class Main is not defined.");
    }
}
