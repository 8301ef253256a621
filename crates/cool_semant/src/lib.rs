// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Semantic analysis: class hierarchy construction and validation, followed
//! by a scoped, type-decorating traversal of every class body.

pub mod class_table;
pub mod diag;
pub mod symtab;
pub mod typecheck;

pub use class_table::ClassTable;
pub use diag::{DiagSink, Diagnostic, SemantError};
pub use symtab::SymbolTable;
pub use typecheck::check_program;
