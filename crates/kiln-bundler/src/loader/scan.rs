//! Syntactic import extraction.
//!
//! A byte-level scanner, not a parser. It skips comments, string literals and
//! template literals, and recognises:
//!
//! - `import x from 'a'`, `import { x } from 'a'`, `import 'a'` (static)
//! - `export * from 'a'`, `export { x } from 'a'` (static)
//! - `require('a')` (static)
//! - `import('a')` with a literal argument (dynamic)
//!
//! Regular expression literals are not tracked; a quote inside one can
//! desynchronise the scan for the rest of that line.

use kiln_graph::{ImportKind, ImportRecord};
use memchr::{memchr, memmem};

/// Scan transformed module output for imports, in source order.
pub fn scan_imports(source: &[u8]) -> Vec<ImportRecord> {
    let mut scanner = Scanner {
        src: source,
        pos: 0,
        out: Vec::new(),
    };
    scanner.run();
    scanner.out
}

struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
    out: Vec<ImportRecord>,
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn run(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b'/' if self.peek_at(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek_at(1) == Some(b'*') => self.skip_block_comment(),
                b'\'' | b'"' => {
                    self.read_string();
                }
                b'`' => self.skip_template(),
                b if is_ident_byte(b) => {
                    let start = self.pos;
                    let word = self.read_ident();
                    if !self.preceded_by_member_access(start) {
                        match word {
                            b"import" => self.after_import(),
                            b"export" => self.after_export(),
                            b"require" => self.after_require(),
                            _ => {}
                        }
                    }
                }
                _ => self.pos += 1,
            }
        }
    }

    /// `obj.import(...)` and `a?.require(...)` are property accesses.
    fn preceded_by_member_access(&self, start: usize) -> bool {
        self.src[..start]
            .iter()
            .rev()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'.')
    }

    fn skip_line_comment(&mut self) {
        match memchr(b'\n', &self.src[self.pos..]) {
            Some(offset) => self.pos += offset + 1,
            None => self.pos = self.src.len(),
        }
    }

    fn skip_block_comment(&mut self) {
        match memmem::find(&self.src[self.pos + 2..], b"*/") {
            Some(offset) => self.pos += offset + 4,
            None => self.pos = self.src.len(),
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b if b.is_ascii_whitespace() => self.pos += 1,
                b'/' if self.peek_at(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek_at(1) == Some(b'*') => self.skip_block_comment(),
                _ => break,
            }
        }
    }

    fn read_ident(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_byte) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    /// Read a quoted string starting at the current quote. Escapes are kept
    /// verbatim; specifiers do not use them in practice.
    fn read_string(&mut self) -> Option<String> {
        let quote = self.peek()?;
        let start = self.pos + 1;
        self.pos = start;
        while let Some(b) = self.peek() {
            match b {
                b'\\' => self.pos += 2,
                b'\n' => return None,
                b if b == quote => {
                    let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
                    self.pos += 1;
                    return Some(text);
                }
                _ => self.pos += 1,
            }
        }
        None
    }

    fn skip_template(&mut self) {
        self.pos += 1;
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'\\' => self.pos += 2,
                b'`' if depth == 0 => {
                    self.pos += 1;
                    return;
                }
                b'$' if depth == 0 && self.peek_at(1) == Some(b'{') => {
                    depth = 1;
                    self.pos += 2;
                }
                b'{' if depth > 0 => {
                    depth += 1;
                    self.pos += 1;
                }
                b'}' if depth > 0 => {
                    depth -= 1;
                    self.pos += 1;
                }
                b'\'' | b'"' if depth > 0 => {
                    self.read_string();
                }
                _ => self.pos += 1,
            }
        }
    }

    fn push(&mut self, specifier: String, kind: ImportKind) {
        self.out.push(ImportRecord::new(specifier, kind));
    }

    fn after_import(&mut self) {
        self.skip_trivia();
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                self.skip_trivia();
                if matches!(self.peek(), Some(b'\'' | b'"')) {
                    if let Some(spec) = self.read_string() {
                        self.skip_trivia();
                        if matches!(self.peek(), Some(b')' | b',')) {
                            self.push(spec, ImportKind::Dynamic);
                        }
                    }
                }
            }
            Some(b'\'' | b'"') => {
                if let Some(spec) = self.read_string() {
                    self.push(spec, ImportKind::Static);
                }
            }
            Some(b'.') => {}
            _ => self.clause_then_from(),
        }
    }

    fn after_export(&mut self) {
        self.skip_trivia();
        if matches!(self.peek(), Some(b'*' | b'{')) || self.src[self.pos..].starts_with(b"type") {
            self.clause_then_from();
        }
    }

    /// Walk an import/export clause (`x, { a as b }`, `* as ns`) and record
    /// the string that follows `from`. Anything unexpected ends the walk.
    fn clause_then_from(&mut self) {
        let mut last_was_from = false;
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(b'\'' | b'"') => {
                    let spec = self.read_string();
                    if let (true, Some(spec)) = (last_was_from, spec) {
                        self.push(spec, ImportKind::Static);
                    }
                    return;
                }
                Some(b'{' | b'}' | b',' | b'*') => {
                    self.pos += 1;
                    last_was_from = false;
                }
                Some(b) if is_ident_byte(b) => {
                    last_was_from = self.read_ident() == b"from";
                }
                _ => return,
            }
        }
    }

    fn after_require(&mut self) {
        self.skip_trivia();
        if self.peek() != Some(b'(') {
            return;
        }
        self.pos += 1;
        self.skip_trivia();
        if !matches!(self.peek(), Some(b'\'' | b'"')) {
            return;
        }
        if let Some(spec) = self.read_string() {
            self.skip_trivia();
            if self.peek() == Some(b')') {
                self.push(spec, ImportKind::Static);
            }
        }
    }
}
