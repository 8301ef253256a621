// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

use chumsky::input::{Input, Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::{extra, pratt};
use thiserror::Error;

use crate::ast::*;
use crate::lexer::{SpannedTok, Tok};
use crate::source::Span;

type RichError<'src> = Rich<'src, Tok, SimpleSpan>;
type PExtra<'src> = extra::Err<RichError<'src>>;

/// A parse error detached from the token stream's lifetime.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

fn sp(s: SimpleSpan) -> Span {
    Span::new(s.start as u32, s.end as u32)
}

/// Marker produced by the assignment fold when the left-hand side is not an
/// identifier. Rejected before any expression leaves the parser.
const NON_ID_LHS: &str = "<non-id-lhs>";

fn bad_assign_target(e: &Expr) -> Option<Span> {
    match &e.kind {
        ExprKind::Assign { name, .. } if name == NON_ID_LHS => Some(e.span),
        ExprKind::Assign { expr, .. } => bad_assign_target(expr),
        ExprKind::Dispatch { recv, args, .. } => {
            bad_assign_target(recv).or_else(|| args.iter().find_map(bad_assign_target))
        }
        ExprKind::If { cond, then_, else_ } => bad_assign_target(cond)
            .or_else(|| bad_assign_target(then_))
            .or_else(|| bad_assign_target(else_)),
        ExprKind::While { cond, body } => {
            bad_assign_target(cond).or_else(|| bad_assign_target(body))
        }
        ExprKind::Block(exprs) => exprs.iter().find_map(bad_assign_target),
        ExprKind::Let { init, body, .. } => {
            bad_assign_target(init).or_else(|| bad_assign_target(body))
        }
        ExprKind::Case { expr, arms } => bad_assign_target(expr)
            .or_else(|| arms.iter().find_map(|arm| bad_assign_target(&arm.expr))),
        ExprKind::IsVoid(inner) | ExprKind::Not(inner) | ExprKind::Neg(inner) => {
            bad_assign_target(inner)
        }
        ExprKind::Bin { lhs, rhs, .. } => {
            bad_assign_target(lhs).or_else(|| bad_assign_target(rhs))
        }
        ExprKind::New(_)
        | ExprKind::Id(_)
        | ExprKind::Int(_)
        | ExprKind::Str(_)
        | ExprKind::Bool(_)
        | ExprKind::SelfRef
        | ExprKind::NoExpr => None,
    }
}

/// Public API: parse spanned tokens into a Program. `eoi` is the
/// end-of-input span of the originating file.
pub fn parse_program(tokens: &[SpannedTok], eoi: Span) -> Result<Program, Vec<ParseError>> {
    let stream = Stream::from_iter(
        tokens
            .iter()
            .map(|(t, s)| (t.clone(), SimpleSpan::from(s.start as usize..s.end as usize))),
    )
    .map(
        SimpleSpan::from(eoi.start as usize..eoi.end as usize),
        |(t, s): (Tok, SimpleSpan)| (t, s),
    );

    program_parser().parse(stream).into_result().map_err(|errs| {
        errs.into_iter()
            .map(|e| ParseError {
                message: e.to_string(),
                span: sp(*e.span()),
            })
            .collect()
    })
}

fn program_parser<'src, I>() -> impl Parser<'src, I, Program, PExtra<'src>>
where
    I: ValueInput<'src, Token = Tok, Span = SimpleSpan>,
{
    class_parser()
        .then_ignore(just(Tok::Semi))
        .repeated()
        .at_least(1)
        .collect::<Vec<_>>()
        .map(|classes| Program { classes })
        .then_ignore(end())
}

fn class_parser<'src, I>() -> impl Parser<'src, I, Class, PExtra<'src>>
where
    I: ValueInput<'src, Token = Tok, Span = SimpleSpan>,
{
    just(Tok::KwClass)
        .ignore_then(type_id())
        .then(just(Tok::KwInherits).ignore_then(type_id()).or_not())
        .then(
            just(Tok::LBrace)
                .ignore_then(
                    feature_parser()
                        .then_ignore(just(Tok::Semi))
                        .repeated()
                        .collect::<Vec<_>>(),
                )
                .then_ignore(just(Tok::RBrace)),
        )
        .map_with(|((name, parent), features), e| Class {
            name,
            parent,
            features,
            span: sp(e.span()),
        })
}

fn feature_parser<'src, I>() -> impl Parser<'src, I, Feature, PExtra<'src>>
where
    I: ValueInput<'src, Token = Tok, Span = SimpleSpan>,
{
    let method = obj_id()
        .then(
            just(Tok::LParen)
                .ignore_then(
                    formal_parser()
                        .separated_by(just(Tok::Comma))
                        .allow_trailing()
                        .collect::<Vec<_>>()
                        .or_not()
                        .map(|opt| opt.unwrap_or_default()),
                )
                .then_ignore(just(Tok::RParen)),
        )
        .then_ignore(just(Tok::Colon))
        .then(type_id())
        .then(
            just(Tok::LBrace)
                .ignore_then(expr_parser())
                .then_ignore(just(Tok::RBrace)),
        )
        .map_with(|(((name, formals), ret_type), body), e| Feature::Method {
            name,
            formals,
            ret_type,
            body,
            span: sp(e.span()),
        });

    let attr = obj_id()
        .then_ignore(just(Tok::Colon))
        .then(type_id())
        .then(just(Tok::Assign).ignore_then(expr_parser()).or_not())
        .map_with(|((name, ty), init), e| {
            let span = sp(e.span());
            Feature::Attr {
                name,
                ty,
                init: init.unwrap_or_else(|| Expr::no_expr(span)),
                span,
            }
        });

    method.or(attr)
}

fn formal_parser<'src, I>() -> impl Parser<'src, I, Formal, PExtra<'src>>
where
    I: ValueInput<'src, Token = Tok, Span = SimpleSpan>,
{
    obj_id()
        .then_ignore(just(Tok::Colon))
        .then(type_id())
        .map_with(|(name, ty), e| Formal {
            name,
            ty,
            span: sp(e.span()),
        })
}

fn type_id<'src, I>() -> impl Parser<'src, I, String, PExtra<'src>>
where
    I: ValueInput<'src, Token = Tok, Span = SimpleSpan>,
{
    select! { Tok::TypeId(s) => s }.or(just(Tok::SelfType).to("SELF_TYPE".to_string()))
}

// `self` is lexically an ordinary object identifier; binding positions
// accept it here so its misuse surfaces as a semantic error, not a parse
// error. Expression position never reaches this: the atom parser claims
// `self` first.
fn obj_id<'src, I>() -> impl Parser<'src, I, String, PExtra<'src>>
where
    I: ValueInput<'src, Token = Tok, Span = SimpleSpan>,
{
    select! { Tok::ObjId(s) => s }.or(just(Tok::SelfId).to("self".to_string()))
}

fn expr_parser<'src, I>() -> impl Parser<'src, I, Expr, PExtra<'src>>
where
    I: ValueInput<'src, Token = Tok, Span = SimpleSpan>,
{
    recursive(|expr| {
        // Parentheses group only; no node survives in the AST.
        let paren = just(Tok::LParen)
            .ignore_then(expr.clone())
            .then_ignore(just(Tok::RParen));

        let self_id =
            just(Tok::SelfId).map_with(|_, e| Expr::new(ExprKind::SelfRef, sp(e.span())));
        let id = obj_id().map_with(|name, e| Expr::new(ExprKind::Id(name), sp(e.span())));

        let literal = select! {
            Tok::Int(n) => ExprKind::Int(n),
            Tok::Str(s) => ExprKind::Str(s),
            Tok::KwTrue => ExprKind::Bool(true),
            Tok::KwFalse => ExprKind::Bool(false),
        }
        .map_with(|kind, e| Expr::new(kind, sp(e.span())));

        let block = just(Tok::LBrace)
            .ignore_then(
                expr.clone()
                    .then_ignore(just(Tok::Semi))
                    .repeated()
                    .at_least(1)
                    .collect::<Vec<_>>(),
            )
            .then_ignore(just(Tok::RBrace))
            .map_with(|body, e| Expr::new(ExprKind::Block(body), sp(e.span())));

        let if_ = just(Tok::KwIf)
            .ignore_then(expr.clone())
            .then_ignore(just(Tok::KwThen))
            .then(expr.clone())
            .then_ignore(just(Tok::KwElse))
            .then(expr.clone())
            .then_ignore(just(Tok::KwFi))
            .map_with(|((cond, then_), else_), e| {
                Expr::new(
                    ExprKind::If {
                        cond: Box::new(cond),
                        then_: Box::new(then_),
                        else_: Box::new(else_),
                    },
                    sp(e.span()),
                )
            });

        let while_ = just(Tok::KwWhile)
            .ignore_then(expr.clone())
            .then_ignore(just(Tok::KwLoop))
            .then(expr.clone())
            .then_ignore(just(Tok::KwPool))
            .map_with(|(cond, body), e| {
                Expr::new(
                    ExprKind::While {
                        cond: Box::new(cond),
                        body: Box::new(body),
                    },
                    sp(e.span()),
                )
            });

        // name : TYPE [<- init], remembering the binding's own span for the
        // desugared Let node.
        let let_binding = obj_id()
            .then_ignore(just(Tok::Colon))
            .then(type_id())
            .then(just(Tok::Assign).ignore_then(expr.clone()).or_not())
            .map_with(|((name, ty), init), e| (name, ty, init, sp(e.span())));

        // Multi-binding let desugars to nested single-binding nodes, so each
        // binding opens its own scope and may shadow the previous one.
        let let_ = just(Tok::KwLet)
            .ignore_then(
                let_binding
                    .separated_by(just(Tok::Comma))
                    .at_least(1)
                    .collect::<Vec<_>>(),
            )
            .then_ignore(just(Tok::KwIn))
            .then(expr.clone())
            .map(|(bindings, body)| {
                bindings
                    .into_iter()
                    .rev()
                    .fold(body, |body, (name, ty, init, span)| {
                        Expr::new(
                            ExprKind::Let {
                                name,
                                ty,
                                init: Box::new(init.unwrap_or_else(|| Expr::no_expr(span))),
                                body: Box::new(body),
                            },
                            span,
                        )
                    })
            });

        let case_arm = obj_id()
            .then_ignore(just(Tok::Colon))
            .then(type_id())
            .then_ignore(just(Tok::Darrow))
            .then(expr.clone())
            .then_ignore(just(Tok::Semi))
            .map_with(|((name, ty), expr), e| CaseArm {
                name,
                ty,
                expr,
                span: sp(e.span()),
            });

        let case_ = just(Tok::KwCase)
            .ignore_then(expr.clone())
            .then_ignore(just(Tok::KwOf))
            .then(case_arm.repeated().at_least(1).collect::<Vec<_>>())
            .then_ignore(just(Tok::KwEsac))
            .map_with(|(scrutinee, arms), e| {
                Expr::new(
                    ExprKind::Case {
                        expr: Box::new(scrutinee),
                        arms,
                    },
                    sp(e.span()),
                )
            });

        let new_ = just(Tok::KwNew)
            .ignore_then(type_id())
            .map_with(|ty, e| Expr::new(ExprKind::New(ty), sp(e.span())));

        let atom = if_
            .or(while_)
            .or(let_)
            .or(case_)
            .or(block)
            .or(new_)
            .or(paren)
            .or(literal)
            .or(self_id)
            .or(id);

        // args: ( [expr (, expr)*]? )
        let args = just(Tok::LParen)
            .ignore_then(
                expr.clone()
                    .separated_by(just(Tok::Comma))
                    .allow_trailing()
                    .collect::<Vec<_>>()
                    .or_not()
                    .map(|opt| opt.unwrap_or_default()),
            )
            .then_ignore(just(Tok::RParen));

        // Optional self-dispatch: id(args) => self.id(args)
        let primary =
            atom.then(args.clone().or_not())
                .map_with(|(a, maybe_args), e| match (a, maybe_args) {
                    (
                        Expr {
                            kind: ExprKind::Id(name),
                            ..
                        },
                        Some(args),
                    ) => {
                        let span = sp(e.span());
                        Expr::new(
                            ExprKind::Dispatch {
                                recv: Box::new(Expr::new(ExprKind::SelfRef, span)),
                                static_type: None,
                                method: name,
                                args,
                            },
                            span,
                        )
                    }
                    (other, _) => other,
                });

        // recv [@TYPE] . id(args)
        let dispatch_step = just(Tok::At)
            .ignore_then(type_id())
            .or_not()
            .then_ignore(just(Tok::Dot))
            .then(obj_id())
            .then(args.clone())
            .map(|((static_ty, method), args)| (static_ty, method, args));

        let postfix = primary
            .then(dispatch_step.repeated().collect::<Vec<_>>())
            .map_with(|(base, steps), e| {
                let span = sp(e.span());
                steps
                    .into_iter()
                    .fold(base, |recv, (static_type, method, args)| {
                        Expr::new(
                            ExprKind::Dispatch {
                                recv: Box::new(recv),
                                static_type,
                                method,
                                args,
                            },
                            span,
                        )
                    })
            });

        // prefix: |op, rhs, extra|
        // infix:  |lhs, op, rhs, extra|
        // Higher binding power binds tighter: assignment is loosest, `~`
        // tightest.
        let pratt_expr = postfix.pratt((
            pratt::prefix(7, just(Tok::Tilde), |_, rhs: Expr, e| {
                Expr::new(ExprKind::Neg(Box::new(rhs)), sp(e.span()))
            }),
            pratt::prefix(6, just(Tok::KwIsVoid), |_, rhs: Expr, e| {
                Expr::new(ExprKind::IsVoid(Box::new(rhs)), sp(e.span()))
            }),
            pratt::prefix(2, just(Tok::KwNot), |_, rhs: Expr, e| {
                Expr::new(ExprKind::Not(Box::new(rhs)), sp(e.span()))
            }),
            pratt::infix(pratt::left(5), just(Tok::Star), |lhs, _, rhs, e| {
                bin(BinOp::Mul, lhs, rhs, sp(e.span()))
            }),
            pratt::infix(pratt::left(5), just(Tok::Slash), |lhs, _, rhs, e| {
                bin(BinOp::Div, lhs, rhs, sp(e.span()))
            }),
            pratt::infix(pratt::left(4), just(Tok::Plus), |lhs, _, rhs, e| {
                bin(BinOp::Add, lhs, rhs, sp(e.span()))
            }),
            pratt::infix(pratt::left(4), just(Tok::Minus), |lhs, _, rhs, e| {
                bin(BinOp::Sub, lhs, rhs, sp(e.span()))
            }),
            pratt::infix(pratt::left(3), just(Tok::Le), |lhs, _, rhs, e| {
                bin(BinOp::Le, lhs, rhs, sp(e.span()))
            }),
            pratt::infix(pratt::left(3), just(Tok::Lt), |lhs, _, rhs, e| {
                bin(BinOp::Lt, lhs, rhs, sp(e.span()))
            }),
            pratt::infix(pratt::left(3), just(Tok::Eq), |lhs, _, rhs, e| {
                bin(BinOp::Eq, lhs, rhs, sp(e.span()))
            }),
            pratt::infix(
                pratt::right(1),
                just(Tok::Assign),
                |lhs: Expr, _, rhs, e| {
                    let span = sp(e.span());
                    match lhs.kind {
                        ExprKind::Id(name) => Expr::new(
                            ExprKind::Assign {
                                name,
                                expr: Box::new(rhs),
                            },
                            span,
                        ),
                        _ => Expr::new(
                            ExprKind::Assign {
                                name: NON_ID_LHS.to_string(),
                                expr: Box::new(rhs),
                            },
                            span,
                        ),
                    }
                },
            ),
        ));

        pratt_expr
            .try_map(|expr, _span| match bad_assign_target(&expr) {
                Some(bad) => Err(Rich::custom(
                    SimpleSpan::from(bad.start as usize..bad.end as usize),
                    "the target of an assignment must be an identifier",
                )),
                None => Ok(expr),
            })
            .boxed()
    })
}

fn bin(op: BinOp, lhs: Expr, rhs: Expr, span: Span) -> Expr {
    Expr::new(
        ExprKind::Bin {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}
