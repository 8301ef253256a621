// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

use std::fmt;

use logos::Logos;
use thiserror::Error;

use crate::source::Span;

#[derive(Logos, Debug, Clone, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f\v]+")]
pub enum Tok {
    // Keywords (case-insensitive except true/false first letter must be lowercase)
    #[regex(r"(?i:class)")]
    KwClass,
    #[regex(r"(?i:inherits)")]
    KwInherits,
    #[regex(r"(?i:if)")]
    KwIf,
    #[regex(r"(?i:then)")]
    KwThen,
    #[regex(r"(?i:else)")]
    KwElse,
    #[regex(r"(?i:fi)")]
    KwFi,
    #[regex(r"(?i:while)")]
    KwWhile,
    #[regex(r"(?i:loop)")]
    KwLoop,
    #[regex(r"(?i:pool)")]
    KwPool,
    #[regex(r"(?i:let)")]
    KwLet,
    #[regex(r"(?i:in)")]
    KwIn,
    #[regex(r"(?i:case)")]
    KwCase,
    #[regex(r"(?i:of)")]
    KwOf,
    #[regex(r"(?i:esac)")]
    KwEsac,
    #[regex(r"(?i:new)")]
    KwNew,
    #[regex(r"(?i:isvoid)")]
    KwIsVoid,
    #[regex(r"(?i:not)")]
    KwNot,

    // true/false special casing rule (first char lowercase)
    #[regex(r"t[rR][uU][eE]")]
    KwTrue,
    #[regex(r"f[aA][lL][sS][eE]")]
    KwFalse,

    // Special identifiers
    #[token("self")]
    SelfId,
    #[token("SELF_TYPE")]
    SelfType,

    // Symbols / operators
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("@")]
    At,

    #[token("<-")]
    Assign,
    #[token("=>")]
    Darrow,
    #[token("<=")]
    Le,
    #[token("<")]
    Lt,
    #[token("=")]
    Eq,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,

    #[token("~")]
    Tilde,

    // Literals. A literal too large for i64 is a lexical error, not a panic.
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    Str(String),

    // Identifiers
    #[regex(r"[A-Z][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    TypeId(String),

    #[regex(r"[a-z][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    ObjId(String),
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tok::KwClass => f.write_str("class"),
            Tok::KwInherits => f.write_str("inherits"),
            Tok::KwIf => f.write_str("if"),
            Tok::KwThen => f.write_str("then"),
            Tok::KwElse => f.write_str("else"),
            Tok::KwFi => f.write_str("fi"),
            Tok::KwWhile => f.write_str("while"),
            Tok::KwLoop => f.write_str("loop"),
            Tok::KwPool => f.write_str("pool"),
            Tok::KwLet => f.write_str("let"),
            Tok::KwIn => f.write_str("in"),
            Tok::KwCase => f.write_str("case"),
            Tok::KwOf => f.write_str("of"),
            Tok::KwEsac => f.write_str("esac"),
            Tok::KwNew => f.write_str("new"),
            Tok::KwIsVoid => f.write_str("isvoid"),
            Tok::KwNot => f.write_str("not"),
            Tok::KwTrue => f.write_str("true"),
            Tok::KwFalse => f.write_str("false"),
            Tok::SelfId => f.write_str("self"),
            Tok::SelfType => f.write_str("SELF_TYPE"),
            Tok::LBrace => f.write_str("{"),
            Tok::RBrace => f.write_str("}"),
            Tok::LParen => f.write_str("("),
            Tok::RParen => f.write_str(")"),
            Tok::Colon => f.write_str(":"),
            Tok::Semi => f.write_str(";"),
            Tok::Comma => f.write_str(","),
            Tok::Dot => f.write_str("."),
            Tok::At => f.write_str("@"),
            Tok::Assign => f.write_str("<-"),
            Tok::Darrow => f.write_str("=>"),
            Tok::Le => f.write_str("<="),
            Tok::Lt => f.write_str("<"),
            Tok::Eq => f.write_str("="),
            Tok::Plus => f.write_str("+"),
            Tok::Minus => f.write_str("-"),
            Tok::Star => f.write_str("*"),
            Tok::Slash => f.write_str("/"),
            Tok::Tilde => f.write_str("~"),
            Tok::Int(n) => write!(f, "{n}"),
            Tok::Str(s) => write!(f, "{s:?}"),
            Tok::TypeId(s) | Tok::ObjId(s) => f.write_str(s),
        }
    }
}

fn parse_string(lex: &mut logos::Lexer<Tok>) -> String {
    let raw = lex.slice();
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::new();
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('b') => out.push('\u{0008}'),
                Some('t') => out.push('\t'),
                Some('n') => out.push('\n'),
                Some('f') => out.push('\u{000C}'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some(other) => out.push(other),
                None => break,
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// A token paired with its span in the owning [`crate::source::SourceMap`].
pub type SpannedTok = (Tok, Span);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated block comment")]
    UnterminatedComment { span: Span },

    #[error("invalid character sequence `{slice}`")]
    InvalidToken { slice: String, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnterminatedComment { span } | LexError::InvalidToken { span, .. } => *span,
        }
    }
}

/// Strip COOL comments:
///  - line comments: -- ... \n
///  - block comments: (* ... *) nested
///
/// Comment bytes are blanked rather than removed so that every surviving
/// byte keeps its original offset; `base` shifts error spans into the
/// global offset space.
pub fn strip_comments(input: &str, base: u32) -> Result<String, LexError> {
    let bytes = input.as_bytes();
    let mut i = 0usize;
    let mut out = String::with_capacity(input.len());
    let mut depth = 0usize;
    let mut open_at = 0usize;

    let blank = |out: &mut String, b: u8| {
        out.push(if b == b'\n' { '\n' } else { ' ' });
    };

    while i < bytes.len() {
        if depth > 0 {
            if i + 1 < bytes.len() && bytes[i] == b'(' && bytes[i + 1] == b'*' {
                depth += 1;
                out.push_str("  ");
                i += 2;
                continue;
            }
            if i + 1 < bytes.len() && bytes[i] == b'*' && bytes[i + 1] == b')' {
                depth -= 1;
                out.push_str("  ");
                i += 2;
                continue;
            }
            blank(&mut out, bytes[i]);
            i += 1;
            continue;
        }

        // line comment "--"
        if i + 1 < bytes.len() && bytes[i] == b'-' && bytes[i + 1] == b'-' {
            while i < bytes.len() && bytes[i] != b'\n' {
                out.push(' ');
                i += 1;
            }
            continue;
        }

        // block comment "(*"
        if i + 1 < bytes.len() && bytes[i] == b'(' && bytes[i + 1] == b'*' {
            depth = 1;
            open_at = i;
            out.push_str("  ");
            i += 2;
            continue;
        }

        out.push(bytes[i] as char);
        i += 1;
    }

    if depth != 0 {
        return Err(LexError::UnterminatedComment {
            span: Span::new(base + open_at as u32, base + open_at as u32 + 2),
        });
    }
    Ok(out)
}

/// Lex COOL input into spanned tokens. `base` is the offset assigned to
/// this file by the source map; all spans are global.
pub fn lex(input: &str, base: u32) -> Result<Vec<SpannedTok>, LexError> {
    let cleaned = strip_comments(input, base)?;
    let mut toks = Vec::new();
    let mut lx = Tok::lexer(&cleaned);

    while let Some(res) = lx.next() {
        let range = lx.span();
        let span = Span::new(base + range.start as u32, base + range.end as u32);
        match res {
            Ok(tok) => toks.push((tok, span)),
            Err(_) => {
                return Err(LexError::InvalidToken {
                    slice: lx.slice().to_string(),
                    span,
                })
            }
        }
    }

    Ok(toks)
}
