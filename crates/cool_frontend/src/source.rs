// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Byte spans and the map from spans back to `(filename, line)`.
//!
//! Several source files are compiled as one program, so every file added to
//! the [`SourceMap`] is assigned a base offset and all spans live in a single
//! global offset space.

/// A half-open byte range in the global offset space of a [`SourceMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// A span that resolves to no file, used for synthesized nodes such as
    /// the built-in class declarations.
    pub const DUMMY: Span = Span {
        start: u32::MAX,
        end: u32::MAX,
    };

    pub fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }

    pub fn is_dummy(&self) -> bool {
        *self == Span::DUMMY
    }
}

#[derive(Debug)]
struct SourceFile {
    name: String,
    base: u32,
    len: u32,
    /// Global offset of the first byte of each line.
    line_starts: Vec<u32>,
}

/// Registry of compiled files, resolving spans to filenames and line numbers.
#[derive(Debug, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        SourceMap::default()
    }

    /// Registers a file and returns the base offset its spans must use.
    pub fn add_file(&mut self, name: impl Into<String>, src: &str) -> u32 {
        let base = self
            .files
            .last()
            .map(|f| f.base + f.len + 1)
            .unwrap_or(0);

        let mut line_starts = vec![base];
        for (i, b) in src.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(base + i as u32 + 1);
            }
        }

        self.files.push(SourceFile {
            name: name.into(),
            base,
            len: src.len() as u32,
            line_starts,
        });
        base
    }

    /// End-of-input span for the file registered at `base`.
    pub fn eoi(&self, base: u32) -> Span {
        let end = self
            .files
            .iter()
            .find(|f| f.base == base)
            .map(|f| f.base + f.len)
            .unwrap_or(base);
        Span::new(end, end)
    }

    /// Resolves a span to `(filename, 1-based line)`. Dummy spans and spans
    /// outside every registered file resolve to `None`.
    pub fn locate(&self, span: Span) -> Option<(&str, u32)> {
        if span.is_dummy() {
            return None;
        }
        let file = self
            .files
            .iter()
            .find(|f| span.start >= f.base && span.start <= f.base + f.len)?;
        let line = file.line_starts.partition_point(|&s| s <= span.start) as u32;
        Some((&file.name, line.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_lines_in_a_single_file() {
        let mut map = SourceMap::new();
        let base = map.add_file("main.cl", "class Main {\n  x : Int;\n};\n");
        assert_eq!(base, 0);

        assert_eq!(map.locate(Span::new(0, 5)), Some(("main.cl", 1)));
        assert_eq!(map.locate(Span::new(15, 16)), Some(("main.cl", 2)));
        assert_eq!(map.locate(Span::new(24, 25)), Some(("main.cl", 3)));
    }

    #[test]
    fn locates_across_multiple_files() {
        let mut map = SourceMap::new();
        let a = map.add_file("a.cl", "class A {\n};\n");
        let b = map.add_file("b.cl", "class B {\n};\n");
        assert!(b > a);

        assert_eq!(map.locate(Span::new(a, a + 1)), Some(("a.cl", 1)));
        assert_eq!(map.locate(Span::new(b + 10, b + 11)), Some(("b.cl", 2)));
    }

    #[test]
    fn dummy_span_has_no_location() {
        let mut map = SourceMap::new();
        map.add_file("a.cl", "class A {};");
        assert_eq!(map.locate(Span::DUMMY), None);
    }
}
