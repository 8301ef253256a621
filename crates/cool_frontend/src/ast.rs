// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

use std::fmt;

use crate::source::Span;

/// COOL has special type SELF_TYPE which depends on the current class.
/// Types are a concrete class name, SELF_TYPE, or the `_no_type` sentinel
/// that marks an omitted initializer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Named(String),
    SelfType,
    NoType,
}

impl Ty {
    pub fn named<S: Into<String>>(s: S) -> Self {
        Ty::Named(s.into())
    }

    /// Maps a declared type name from the source to a `Ty`.
    pub fn from_name(name: &str) -> Self {
        if name == "SELF_TYPE" {
            Ty::SelfType
        } else {
            Ty::named(name)
        }
    }

    pub fn as_named(&self) -> Option<&str> {
        match self {
            Ty::Named(s) => Some(s.as_str()),
            Ty::SelfType | Ty::NoType => None,
        }
    }

    pub fn is_self_type(&self) -> bool {
        matches!(self, Ty::SelfType)
    }

    pub fn is_no_type(&self) -> bool {
        matches!(self, Ty::NoType)
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Named(s) => f.write_str(s),
            Ty::SelfType => f.write_str("SELF_TYPE"),
            Ty::NoType => f.write_str("_no_type"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub classes: Vec<Class>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    pub name: String,           // TYPE
    pub parent: Option<String>, // TYPE
    pub features: Vec<Feature>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feature {
    Method {
        name: String, // ID
        formals: Vec<Formal>,
        ret_type: String, // TYPE
        body: Expr,
        span: Span,
    },
    Attr {
        name: String, // ID
        ty: String,   // TYPE
        /// `ExprKind::NoExpr` when the initializer is omitted.
        init: Expr,
        span: Span,
    },
}

impl Feature {
    pub fn span(&self) -> Span {
        match self {
            Feature::Method { span, .. } | Feature::Attr { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formal {
    pub name: String, // ID
    pub ty: String,   // TYPE
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseArm {
    pub name: String,
    pub ty: String,
    pub expr: Expr,
    pub span: Span,
}

/// An expression node: a kind, a source span, and the inferred static type
/// written exactly once by the semantic stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    ty: Option<Ty>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr {
            kind,
            span,
            ty: None,
        }
    }

    /// The "no expression" placeholder used where an initializer is omitted.
    pub fn no_expr(span: Span) -> Self {
        Expr::new(ExprKind::NoExpr, span)
    }

    /// Records the inferred type. Writing a node's type twice is a bug in
    /// the traversal, not a user error.
    pub fn set_type(&mut self, ty: Ty) {
        assert!(
            self.ty.is_none(),
            "inferred type written twice for expression at {:?}",
            self.span
        );
        self.ty = Some(ty);
    }

    /// The inferred type, if the semantic stage has run over this node.
    pub fn ty(&self) -> Option<&Ty> {
        self.ty.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Assign {
        name: String,
        expr: Box<Expr>,
    },

    /// Dynamic dispatch, or static dispatch when `static_type` is present.
    Dispatch {
        recv: Box<Expr>,
        static_type: Option<String>,
        method: String,
        args: Vec<Expr>,
    },

    If {
        cond: Box<Expr>,
        then_: Box<Expr>,
        else_: Box<Expr>,
    },

    While {
        cond: Box<Expr>,
        body: Box<Expr>,
    },

    Block(Vec<Expr>),

    /// A single `let` binding; the parser desugars multi-binding `let`s
    /// into a nest of these.
    Let {
        name: String,
        ty: String,
        init: Box<Expr>,
        body: Box<Expr>,
    },

    Case {
        expr: Box<Expr>,
        arms: Vec<CaseArm>,
    },

    New(String),

    IsVoid(Box<Expr>),

    // unary boolean negation
    Not(Box<Expr>),

    // unary arithmetic negation ~expr
    Neg(Box<Expr>),

    // infix binary operations
    Bin {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    // identifiers and literals
    Id(String),
    Int(i64),
    Str(String),
    Bool(bool),
    SelfRef,

    /// Placeholder for an omitted initializer; types to `_no_type`.
    NoExpr,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Eq,
}
