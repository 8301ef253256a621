// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod source;

pub use ast::*;
pub use lexer::{lex, strip_comments, LexError, Tok};
pub use parser::{parse_program, ParseError};
pub use source::{SourceMap, Span};
