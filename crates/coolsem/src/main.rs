// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0
use std::{env, fs, process};

use cool_frontend::ast::Program;
use cool_frontend::lexer::lex;
use cool_frontend::parser::parse_program;
use cool_frontend::source::SourceMap;
use cool_semant::check_program;

fn usage_and_exit() -> ! {
    eprintln!("Usage: coolsem <file1.cl> <file2.cl> ...");
    eprintln!("Example: coolsem demos/list.cl demos/main.cl");
    process::exit(2);
}

fn main() {
    let mut args = env::args();
    let _bin = args.next();

    let paths: Vec<String> = args.collect();
    if paths.is_empty() {
        usage_and_exit();
    }

    // Each file lexes and parses on its own; the class lists merge into one
    // program, and the source map keeps diagnostics pointing at the right
    // file and line.
    let mut map = SourceMap::new();
    let mut classes = Vec::new();
    for path in &paths {
        let src = fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("Failed to read {path}: {e}");
            process::exit(2);
        });

        let base = map.add_file(path, &src);

        let toks = lex(&src, base).unwrap_or_else(|e| {
            match map.locate(e.span()) {
                Some((file, line)) => eprintln!("{file}:{line}: {e}"),
                None => eprintln!("{e}"),
            }
            process::exit(1);
        });

        let prog = parse_program(&toks, map.eoi(base)).unwrap_or_else(|errs| {
            for e in &errs {
                match map.locate(e.span) {
                    Some((file, line)) => eprintln!("{file}:{line}: {e}"),
                    None => eprintln!("{e}"),
                }
            }
            process::exit(1);
        });
        classes.extend(prog.classes);
    }

    let mut program = Program { classes };

    match check_program(&mut program, &map) {
        Ok(()) => {
            // the AST is now decorated with inferred types
            println!("{program:#?}");
        }
        Err(diags) => {
            for d in &diags {
                eprintln!("{d}");
            }
            eprintln!("Compilation halted due to static semantic errors.");
            process::exit(1);
        }
    }
}
