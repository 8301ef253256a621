// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Bottom-up type-checking traversal.
//!
//! Decorates every expression with its inferred static type and reports
//! every rule violation to the diagnostic sink. A type error never stops
//! the traversal: the offending node falls back to `Object` so enclosing
//! rules keep producing useful diagnostics, and the error count decides
//! pass/fail once the whole program has been walked.

use cool_frontend::ast::{BinOp, Class, Expr, ExprKind, Feature, Formal, Program, Ty};
use cool_frontend::source::{SourceMap, Span};

use crate::class_table::{ClassTable, BOOL, INT, OBJECT, SELF, SELF_TYPE, STRING};
use crate::diag::{DiagSink, Diagnostic, SemantError};
use crate::symtab::SymbolTable;

/// Entry point to the semantic stage: builds and validates the class table,
/// then type-checks every user class. On failure the accumulated
/// diagnostics are returned and no later stage may run.
pub fn check_program(
    program: &mut Program,
    sources: &SourceMap,
) -> Result<(), Vec<Diagnostic>> {
    let mut sink = DiagSink::new(sources);

    let mut table = ClassTable::new();
    for class in &program.classes {
        table.register(class, &mut sink);
    }
    let hierarchy_ok = table.validate(&mut sink);
    if !hierarchy_ok || !sink.is_empty() {
        // Declarations that failed registration have no table entry, and a
        // broken hierarchy makes ancestor walks meaningless; stop here.
        return Err(sink.into_diagnostics());
    }

    let mut checker = TypeChecker::new(&table, &mut sink);
    for class in &mut program.classes {
        checker.check_class(class);
    }

    if sink.is_empty() {
        Ok(())
    } else {
        Err(sink.into_diagnostics())
    }
}

struct TypeChecker<'a, 'm> {
    table: &'a ClassTable,
    sink: &'a mut DiagSink<'m>,
    objects: SymbolTable<String, Ty>,
    current_class: String,
}

impl<'a, 'm> TypeChecker<'a, 'm> {
    fn new(table: &'a ClassTable, sink: &'a mut DiagSink<'m>) -> Self {
        TypeChecker {
            table,
            sink,
            objects: SymbolTable::new(),
            current_class: String::new(),
        }
    }

    /// Substitutes SELF_TYPE with the class currently being checked, for
    /// rules that need a concrete class name.
    fn resolve(&self, ty: &Ty) -> String {
        match ty {
            Ty::SelfType => self.current_class.clone(),
            Ty::Named(n) => n.clone(),
            Ty::NoType => "_no_type".to_string(),
        }
    }

    fn conforms(&self, child: &Ty, parent: &Ty) -> bool {
        self.table
            .is_subtype(&self.resolve(child), &self.resolve(parent))
    }

    fn lub(&self, a: &Ty, b: &Ty) -> Ty {
        Ty::Named(
            self.table
                .least_upper_bound(&self.resolve(a), &self.resolve(b)),
        )
    }

    /// Reports and supplies the safe fallback type.
    fn error(&mut self, span: Span, err: SemantError) -> Ty {
        self.sink.report(span, err);
        Ty::named(OBJECT)
    }

    fn check_class(&mut self, class: &mut Class) {
        self.current_class = class.name.clone();
        self.objects.enter_scope();
        self.objects.insert(SELF.to_string(), Ty::SelfType);
        self.populate_attributes(&class.name);
        for feature in &mut class.features {
            match feature {
                Feature::Method {
                    name,
                    formals,
                    ret_type,
                    body,
                    span,
                } => self.check_method(name, formals, ret_type, body, *span),
                Feature::Attr {
                    name,
                    ty,
                    init,
                    span,
                } => self.check_attr(name, ty, init, *span),
            }
        }
        self.objects.exit_scope();
    }

    /// Binds every attribute from `Object` down to the current class, parent
    /// attributes first, so a subclass redeclaring an inherited name is seen
    /// as already bound and reported at the child attribute.
    fn populate_attributes(&mut self, class_name: &str) {
        let table = self.table;
        let chain: Vec<&str> = table.ancestry(class_name).into_iter().rev().collect();
        for cls in chain {
            let Some(decl) = table.get_class(cls) else {
                continue;
            };
            for feature in &decl.features {
                if let Feature::Attr { name, ty, span, .. } = feature {
                    if name == SELF {
                        // reported as reserved-name misuse when the
                        // attribute itself is checked
                        continue;
                    }
                    if self.objects.probe(name).is_some() {
                        self.sink
                            .report(*span, SemantError::AttributeRedefined(name.clone()));
                    } else {
                        self.objects.insert(name.clone(), Ty::from_name(ty));
                    }
                }
            }
        }
    }

    fn check_method(
        &mut self,
        name: &str,
        formals: &[Formal],
        ret_type: &str,
        body: &mut Expr,
        span: Span,
    ) {
        let table = self.table;
        self.objects.enter_scope();

        for formal in formals {
            if formal.name == SELF {
                self.sink.report(formal.span, SemantError::SelfFormal);
                continue;
            }
            let mut bindable = true;
            if formal.ty == SELF_TYPE {
                self.sink
                    .report(formal.span, SemantError::SelfTypeFormal(formal.name.clone()));
                bindable = false;
            } else if !table.class_exists(&formal.ty) {
                self.sink.report(
                    formal.span,
                    SemantError::UndefinedFormalType {
                        ty: formal.ty.clone(),
                        formal: formal.name.clone(),
                    },
                );
            }
            if self.objects.probe(&formal.name).is_some() {
                self.sink
                    .report(formal.span, SemantError::DuplicateFormal(formal.name.clone()));
                bindable = false;
            }
            if bindable {
                self.objects
                    .insert(formal.name.clone(), Ty::from_name(&formal.ty));
            }
        }

        let tret = self.check_expr(body);

        let cname = self.current_class.clone();
        if let Some(ancestor) = table.nearest_ancestor_defining(&cname, name) {
            if !table.signatures_match(&cname, ancestor, name) {
                self.sink.report(
                    span,
                    SemantError::InvalidOverride {
                        method: name.to_string(),
                        ancestor: ancestor.to_string(),
                    },
                );
            }
        }

        let declared = Ty::from_name(ret_type);
        match &declared {
            // A self-typed result must be literally SELF_TYPE: a concrete
            // subtype would lose the polymorphism the declaration promises.
            Ty::SelfType => {
                if !tret.is_self_type() {
                    self.sink.report(
                        span,
                        SemantError::ReturnMismatch {
                            found: tret,
                            method: name.to_string(),
                            declared,
                        },
                    );
                }
            }
            Ty::Named(ret) => {
                if !table.class_exists(ret) {
                    self.sink.report(
                        span,
                        SemantError::UndefinedReturnType {
                            ty: ret.clone(),
                            method: name.to_string(),
                        },
                    );
                } else if !self.conforms(&tret, &declared) {
                    self.sink.report(
                        span,
                        SemantError::ReturnMismatch {
                            found: tret,
                            method: name.to_string(),
                            declared,
                        },
                    );
                }
            }
            Ty::NoType => {}
        }

        self.objects.exit_scope();
    }

    fn check_attr(&mut self, name: &str, ty: &str, init: &mut Expr, span: Span) {
        let table = self.table;
        if name == SELF {
            self.sink.report(span, SemantError::SelfAttribute);
        }

        let declared = Ty::from_name(ty);
        if let Some(t) = declared.as_named() {
            if !table.class_exists(t) {
                self.sink.report(
                    span,
                    SemantError::UndefinedAttrType {
                        ty: t.to_string(),
                        attr: name.to_string(),
                    },
                );
            }
        }

        let t_init = self.check_expr(init);
        if !t_init.is_no_type() && !self.conforms(&t_init, &declared) {
            self.sink.report(
                span,
                SemantError::AttrInitMismatch {
                    found: t_init,
                    attr: name.to_string(),
                    declared,
                },
            );
        }
    }

    /// Infers, records, and returns the type of `expr`. Called exactly once
    /// per reachable node.
    fn check_expr(&mut self, expr: &mut Expr) -> Ty {
        let span = expr.span;
        let ty = self.infer(&mut expr.kind, span);
        expr.set_type(ty.clone());
        ty
    }

    fn infer(&mut self, kind: &mut ExprKind, span: Span) -> Ty {
        match kind {
            ExprKind::Int(_) => Ty::named(INT),
            ExprKind::Str(_) => Ty::named(STRING),
            ExprKind::Bool(_) => Ty::named(BOOL),
            ExprKind::SelfRef => Ty::SelfType,
            ExprKind::NoExpr => Ty::NoType,

            ExprKind::Id(name) => match self.objects.lookup(name).cloned() {
                Some(t) => t,
                None => self.error(span, SemantError::UndeclaredIdentifier(name.clone())),
            },

            ExprKind::Assign { name, expr } => {
                let declared = self.objects.lookup(name).cloned();
                let vt = self.check_expr(expr);
                let Some(declared) = declared else {
                    return self.error(span, SemantError::UndeclaredIdentifier(name.clone()));
                };
                if vt.is_self_type() {
                    // Self-typed r-values are rejected wholesale, even when
                    // produced by a self-returning call. Deliberately kept:
                    // see the semantic quirks note in DESIGN.md.
                    return self.error(span, SemantError::SelfTypeAssigned(name.clone()));
                }
                if !self.conforms(&vt, &declared) {
                    return self.error(
                        span,
                        SemantError::AssignMismatch {
                            found: vt,
                            declared,
                            name: name.clone(),
                        },
                    );
                }
                vt
            }

            ExprKind::Dispatch {
                recv,
                static_type,
                method,
                args,
            } => {
                let static_type = static_type.clone();
                self.check_dispatch(recv, static_type.as_deref(), method, args, span)
            }

            ExprKind::If { cond, then_, else_ } => {
                let tc = self.check_expr(cond);
                let cond_ok = self.resolve(&tc) == BOOL;
                if !cond_ok {
                    self.sink.report(cond.span, SemantError::IfPredicateNotBool);
                }
                let tt = self.check_expr(then_);
                let te = self.check_expr(else_);
                if cond_ok {
                    self.lub(&tt, &te)
                } else {
                    Ty::named(OBJECT)
                }
            }

            ExprKind::While { cond, body } => {
                let tc = self.check_expr(cond);
                if self.resolve(&tc) != BOOL {
                    self.sink
                        .report(cond.span, SemantError::LoopPredicateNotBool);
                }
                let _ = self.check_expr(body);
                Ty::named(OBJECT)
            }

            ExprKind::Block(exprs) => {
                let mut last = Ty::named(OBJECT);
                for e in exprs.iter_mut() {
                    last = self.check_expr(e);
                }
                last
            }

            ExprKind::Let {
                name,
                ty,
                init,
                body,
            } => {
                if name == SELF {
                    self.sink.report(span, SemantError::SelfLetBinding);
                }
                let declared = Ty::from_name(ty);
                if let Some(t) = declared.as_named() {
                    if !self.table.class_exists(t) {
                        self.sink.report(
                            span,
                            SemantError::UndefinedLetType {
                                ty: t.to_string(),
                                name: name.clone(),
                            },
                        );
                    }
                }

                let t_init = self.check_expr(init);
                let mut init_failed = false;
                if !t_init.is_no_type() && !self.conforms(&t_init, &declared) {
                    self.sink.report(
                        init.span,
                        SemantError::LetInitMismatch {
                            found: t_init,
                            name: name.clone(),
                            declared: declared.clone(),
                        },
                    );
                    init_failed = true;
                }

                // The body is checked in its fresh scope even after an
                // initializer error, so its own errors still surface.
                self.objects.enter_scope();
                if name != SELF {
                    self.objects.insert(name.clone(), declared);
                }
                let t_body = self.check_expr(body);
                self.objects.exit_scope();

                if init_failed {
                    Ty::named(OBJECT)
                } else {
                    t_body
                }
            }

            ExprKind::Case { expr, arms } => {
                let _ = self.check_expr(expr);

                let mut dup = None;
                'pairs: for i in 0..arms.len() {
                    for j in 0..i {
                        if arms[i].ty == arms[j].ty {
                            dup = Some(i);
                            break 'pairs;
                        }
                    }
                }
                if let Some(i) = dup {
                    return self
                        .error(arms[i].span, SemantError::DuplicateBranch(arms[i].ty.clone()));
                }

                let mut result: Option<Ty> = None;
                for arm in arms.iter_mut() {
                    if let Ty::Named(t) = Ty::from_name(&arm.ty) {
                        if !self.table.class_exists(&t) {
                            self.sink
                                .report(arm.span, SemantError::UndefinedBranchType { ty: t });
                        }
                    }
                    self.objects.enter_scope();
                    self.objects
                        .insert(arm.name.clone(), Ty::from_name(&arm.ty));
                    let t_arm = self.check_expr(&mut arm.expr);
                    self.objects.exit_scope();

                    result = Some(match result {
                        None => t_arm,
                        Some(prev) => self.lub(&prev, &t_arm),
                    });
                }
                result.unwrap_or_else(|| Ty::named(OBJECT))
            }

            ExprKind::New(ty) => {
                if ty == SELF_TYPE {
                    Ty::SelfType
                } else if self.table.class_exists(ty) {
                    Ty::named(ty.clone())
                } else {
                    self.error(span, SemantError::UndefinedNewType(ty.clone()))
                }
            }

            ExprKind::IsVoid(inner) => {
                let _ = self.check_expr(inner);
                Ty::named(BOOL)
            }

            ExprKind::Not(inner) => {
                let t = self.check_expr(inner);
                if self.resolve(&t) != BOOL {
                    return self.error(span, SemantError::NotNotBool(t));
                }
                Ty::named(BOOL)
            }

            ExprKind::Neg(inner) => {
                let t = self.check_expr(inner);
                if self.resolve(&t) != INT {
                    return self.error(span, SemantError::NegNotInt(t));
                }
                Ty::named(INT)
            }

            ExprKind::Bin { op, lhs, rhs } => {
                let op = *op;
                let tl = self.check_expr(lhs);
                let tr = self.check_expr(rhs);
                match op {
                    BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                        if self.resolve(&tl) != INT || self.resolve(&tr) != INT {
                            return self.error(
                                span,
                                SemantError::NonIntArguments {
                                    op: op_str(op),
                                    lhs: tl,
                                    rhs: tr,
                                },
                            );
                        }
                        Ty::named(INT)
                    }
                    BinOp::Lt | BinOp::Le => {
                        if self.resolve(&tl) != INT || self.resolve(&tr) != INT {
                            return self.error(
                                span,
                                SemantError::NonIntArguments {
                                    op: op_str(op),
                                    lhs: tl,
                                    rhs: tr,
                                },
                            );
                        }
                        Ty::named(BOOL)
                    }
                    BinOp::Eq => {
                        // Equality is unrestricted for reference types, but
                        // the primitives only compare against themselves.
                        let l = self.resolve(&tl);
                        let r = self.resolve(&tr);
                        let basic = |t: &str| t == INT || t == BOOL || t == STRING;
                        if (basic(&l) || basic(&r)) && l != r {
                            return self.error(span, SemantError::IllegalComparison);
                        }
                        Ty::named(BOOL)
                    }
                }
            }
        }
    }

    fn check_dispatch(
        &mut self,
        recv: &mut Expr,
        static_type: Option<&str>,
        method: &str,
        args: &mut [Expr],
        span: Span,
    ) -> Ty {
        let table = self.table;

        let t0 = self.check_expr(recv);
        let recv_class = self.resolve(&t0);

        // Dynamic dispatch resolves on the receiver's class; static dispatch
        // on the annotated class, which the receiver must conform to.
        let resolution_class = match static_type {
            Some(st) if st == SELF_TYPE => {
                self.sink.report(span, SemantError::StaticDispatchToSelfType);
                recv_class.clone()
            }
            Some(st) if !table.class_exists(st) => {
                self.sink
                    .report(span, SemantError::UndefinedStaticDispatchType(st.to_string()));
                recv_class.clone()
            }
            Some(st) => {
                if !table.is_subtype(&recv_class, st) {
                    self.sink.report(
                        span,
                        SemantError::StaticDispatchMismatch {
                            found: t0.clone(),
                            declared: st.to_string(),
                        },
                    );
                }
                st.to_string()
            }
            None => recv_class,
        };

        let Some(sig) = table.resolve_method(&resolution_class, method) else {
            self.sink
                .report(span, SemantError::UndefinedMethod(method.to_string()));
            // keep walking the actuals so their own errors surface
            for arg in args.iter_mut() {
                let _ = self.check_expr(arg);
            }
            return Ty::named(OBJECT);
        };

        if sig.formals.len() != args.len() {
            self.sink
                .report(span, SemantError::WrongArgCount(method.to_string()));
        }

        for (i, arg) in args.iter_mut().enumerate() {
            let ta = self.check_expr(arg);
            let Some(formal) = sig.formals.get(i) else {
                continue;
            };
            if formal.ty == SELF_TYPE {
                self.sink
                    .report(arg.span, SemantError::SelfTypeFormal(formal.name.clone()));
            } else if !self.conforms(&ta, &Ty::named(formal.ty.clone())) {
                self.sink.report(
                    arg.span,
                    SemantError::ArgMismatch {
                        method: method.to_string(),
                        found: ta,
                        formal: formal.name.clone(),
                        declared: Ty::named(formal.ty.clone()),
                    },
                );
            }
        }

        // A self-typed result propagates the receiver's type unsubstituted,
        // so the polymorphism survives through chained calls.
        if Ty::from_name(sig.ret_type).is_self_type() {
            t0
        } else {
            Ty::named(sig.ret_type)
        }
    }
}

fn op_str(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Eq => "=",
    }
}
