// Heuristic C lexer
//
// Classification of identifiers (definition vs. call vs. global) relies on
// brace/paren depth and lookahead to the next significant character, not on a
// real parser. Exotic declarations (function pointers, multi-line signatures)
// can be misclassified; that is an accepted property of the approach.

use std::collections::VecDeque;

use super::keywords::{keyword_index, KW_ENUM, KW_EXTERN, KW_STRUCT, KW_TYPEDEF, KW_UNION};
use super::{Token, TokenKind};

/// Single-use tokenizer over one source file. A fresh scan always starts at
/// byte 0; there is no way to restart mid-file.
pub struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
    line_no: u32,
    line_start: usize,

    // Line and text span of the record closed by the last Newline/Eof token.
    record_line: u32,
    record_span: (usize, usize),

    entry_no: u32,
    brace_depth: i32,
    paren_depth: i32,

    in_block_comment: bool,
    in_preproc: bool,
    expect_define_name: bool,
    define_open: bool,

    // FnDef seen, body brace not yet opened.
    fn_pending: bool,
    // Inside a function body; the closing brace at depth 0 emits FnEnd.
    fn_open: bool,

    // struct/union/enum/class keyword seen, tag or body expected.
    pending_class: Option<TokenKind>,
    // Aggregate tag token emitted; the next '{' opens its body.
    aggregate_open: bool,
    // Brace depths of open aggregate bodies, innermost last.
    aggregate_depths: Vec<i32>,
    // Brace depth at which the active typedef statement started.
    typedef_depth: Option<i32>,
    // `extern` seen in the current statement; suppresses definition marks.
    extern_decl: bool,

    pending: VecDeque<Token>,
    done: bool,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        let mut bytes = src.as_bytes();
        // A UTF-8 BOM already passed the binary sniff; consume it here.
        if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
            bytes = &bytes[3..];
        }
        Self {
            src: bytes,
            pos: 0,
            line_no: 1,
            line_start: 0,
            record_line: 1,
            record_span: (0, 0),
            entry_no: 0,
            brace_depth: 0,
            paren_depth: 0,
            in_block_comment: false,
            in_preproc: false,
            expect_define_name: false,
            define_open: false,
            fn_pending: false,
            fn_open: false,
            pending_class: None,
            aggregate_open: false,
            aggregate_depths: Vec::new(),
            typedef_depth: None,
            extern_decl: false,
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// 1-based number of the line closed by the last Newline/Eof token.
    pub fn record_line(&self) -> u32 {
        self.record_line
    }

    /// Raw text of the line closed by the last Newline/Eof token.
    pub fn record_text(&self) -> &'a str {
        let (start, end) = self.record_span;
        // src is checked ASCII, slicing on byte offsets is safe
        std::str::from_utf8(&self.src[start..end]).unwrap_or("")
    }

    /// Byte offset where the last closed record's text starts.
    pub fn record_start(&self) -> usize {
        self.record_span.0
    }

    /// Text of an arbitrary token span.
    pub fn text(&self, token: &Token) -> &'a str {
        self.slice(token.start, token.end)
    }

    /// Text of an arbitrary byte range of the scanned source.
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        std::str::from_utf8(&self.src[start..end]).unwrap_or("")
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            if let Some(tok) = self.pending.pop_front() {
                return tok;
            }
            if self.done {
                return self.make(TokenKind::Eof, self.pos, self.pos);
            }
            if self.pos >= self.src.len() {
                return self.finish_eof();
            }
            let b = self.src[self.pos];

            if self.in_block_comment {
                if b == b'\n' {
                    return self.emit_newline();
                }
                if b == b'*' && self.peek_at(self.pos + 1) == Some(b'/') {
                    self.pos += 2;
                    self.in_block_comment = false;
                } else {
                    self.pos += 1;
                }
                continue;
            }

            match b {
                b'\n' => return self.emit_newline(),
                b' ' | b'\t' | b'\r' | 11 | 12 => self.pos += 1,
                b'/' if self.peek_at(self.pos + 1) == Some(b'/') => {
                    while self.pos < self.src.len() && self.src[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                b'/' if self.peek_at(self.pos + 1) == Some(b'*') => {
                    self.pos += 2;
                    self.in_block_comment = true;
                }
                b'"' => self.skip_literal(b'"'),
                b'\'' => self.skip_literal(b'\''),
                b'#' if self.at_line_head() && !self.in_preproc => {
                    if let Some(tok) = self.enter_preproc() {
                        return tok;
                    }
                }
                b'{' => self.open_brace(),
                b'}' => {
                    if let Some(tok) = self.close_brace() {
                        return tok;
                    }
                }
                b'(' => {
                    self.paren_depth += 1;
                    self.pending_class = None;
                    self.pos += 1;
                }
                b')' => {
                    self.paren_depth = (self.paren_depth - 1).max(0);
                    self.pos += 1;
                }
                b';' => {
                    self.end_statement();
                    self.pos += 1;
                }
                _ if is_ident_start(b) => return self.lex_word(),
                _ if b.is_ascii_digit() => self.skip_number(),
                _ => self.pos += 1,
            }
        }
    }

    fn make(&self, kind: TokenKind, start: usize, end: usize) -> Token {
        Token {
            kind,
            start,
            end,
            fcn_scope: self.entry_no,
        }
    }

    fn peek_at(&self, at: usize) -> Option<u8> {
        self.src.get(at).copied()
    }

    /// Next significant byte on the same line, skipping blanks only.
    fn peek_significant(&self) -> Option<u8> {
        let mut i = self.pos;
        while let Some(b) = self.peek_at(i) {
            match b {
                b' ' | b'\t' | b'\r' => i += 1,
                b'\n' => return None,
                other => return Some(other),
            }
        }
        None
    }

    /// True when only blanks precede the current position on this line.
    fn at_line_head(&self) -> bool {
        self.src[self.line_start..self.pos]
            .iter()
            .all(|&b| matches!(b, b' ' | b'\t' | b'\r'))
    }

    fn skip_literal(&mut self, quote: u8) {
        self.pos += 1;
        while let Some(b) = self.peek_at(self.pos) {
            match b {
                b'\\' => self.pos += 2,
                b'\n' => break, // unterminated; the newline closes it
                _ if b == quote => {
                    self.pos += 1;
                    break;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn skip_number(&mut self) {
        while let Some(b) = self.peek_at(self.pos) {
            if b.is_ascii_alphanumeric() || b == b'.' || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn skip_blanks(&mut self) {
        while matches!(self.peek_at(self.pos), Some(b' ' | b'\t' | b'\r')) {
            self.pos += 1;
        }
    }

    /// Handle a `#` directive head. Returns the `#include` target token, if
    /// the directive is an include with a well-formed target.
    fn enter_preproc(&mut self) -> Option<Token> {
        self.in_preproc = true;
        self.pos += 1;
        self.skip_blanks();
        let word_start = self.pos;
        while matches!(self.peek_at(self.pos), Some(b) if b.is_ascii_lowercase() || b == b'_') {
            self.pos += 1;
        }
        match &self.src[word_start..self.pos] {
            b"define" => {
                self.expect_define_name = true;
                None
            }
            b"include" | b"include_next" => {
                self.skip_blanks();
                let global = match self.peek_at(self.pos) {
                    Some(b'<') => true,
                    Some(b'"') => false,
                    _ => return None,
                };
                let close = if global { b'>' } else { b'"' };
                self.pos += 1;
                let start = self.pos;
                while matches!(self.peek_at(self.pos), Some(b) if b != close && b != b'\n') {
                    self.pos += 1;
                }
                let end = self.pos;
                if self.peek_at(self.pos) == Some(close) {
                    self.pos += 1;
                }
                Some(self.make(TokenKind::Include { global }, start, end))
            }
            _ => None,
        }
    }

    fn open_brace(&mut self) {
        self.brace_depth += 1;
        let anonymous_body = self.pending_class.take().is_some();
        if anonymous_body || std::mem::take(&mut self.aggregate_open) {
            self.aggregate_depths.push(self.brace_depth);
        } else if self.brace_depth == 1 && self.fn_pending {
            self.fn_pending = false;
            self.fn_open = true;
        }
        self.pos += 1;
    }

    fn close_brace(&mut self) -> Option<Token> {
        let at = self.pos;
        self.pos += 1;
        self.brace_depth = (self.brace_depth - 1).max(0);
        if let Some(&agg) = self.aggregate_depths.last() {
            if self.brace_depth < agg {
                self.aggregate_depths.pop();
            }
        }
        if self.brace_depth == 0 && self.fn_open {
            self.fn_open = false;
            return Some(self.make(TokenKind::FnEnd, at, at));
        }
        None
    }

    fn end_statement(&mut self) {
        if let Some(depth) = self.typedef_depth {
            if self.brace_depth == depth {
                self.typedef_depth = None;
            }
        }
        self.fn_pending = false;
        self.pending_class = None;
        self.aggregate_open = false;
        self.extern_decl = false;
    }

    fn lex_word(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek_at(self.pos), Some(b) if is_ident_continue(b)) {
            self.pos += 1;
        }
        let end = self.pos;
        let word = std::str::from_utf8(&self.src[start..end]).unwrap_or("");

        if self.expect_define_name {
            self.expect_define_name = false;
            self.define_open = true;
            return self.make(TokenKind::Define, start, end);
        }

        if let Some(idx) = keyword_index(word) {
            match idx {
                KW_STRUCT => self.pending_class = Some(TokenKind::StructDef),
                KW_UNION => self.pending_class = Some(TokenKind::UnionDef),
                KW_ENUM => self.pending_class = Some(TokenKind::EnumDef),
                KW_TYPEDEF => self.typedef_depth = Some(self.brace_depth),
                KW_EXTERN => self.extern_decl = true,
                _ => {}
            }
            return self.make(TokenKind::Keyword(idx), start, end);
        }

        let next = self.peek_significant();

        if let Some(tag_kind) = self.pending_class.take() {
            let defines_body = next == Some(b'{')
                || (tag_kind == TokenKind::ClassDef && next == Some(b':'));
            if defines_body {
                self.aggregate_open = true;
                return self.make(tag_kind, start, end);
            }
            // `struct foo x;` leaves the tag as a plain reference.
        }

        if word == "class" && self.brace_depth == 0 {
            self.pending_class = Some(TokenKind::ClassDef);
            return self.make(TokenKind::Ident, start, end);
        }

        if next == Some(b'(') {
            let at_file_scope = self.brace_depth == 0
                && self.paren_depth == 0
                && !self.in_preproc
                && self.typedef_depth.is_none();
            if at_file_scope {
                if self.extern_decl {
                    // declaration, not a definition
                    return self.make(TokenKind::Ident, start, end);
                }
                self.entry_no += 1;
                self.fn_pending = true;
                return self.make(TokenKind::FnDef, start, end);
            }
            return self.make(TokenKind::FnCall, start, end);
        }

        if let Some(depth) = self.typedef_depth {
            if self.brace_depth == depth
                && matches!(next, Some(b';' | b',' | b')' | b'['))
            {
                return self.make(TokenKind::Typedef, start, end);
            }
        }

        if let Some(&agg) = self.aggregate_depths.last() {
            if self.brace_depth == agg
                && matches!(next, Some(b';' | b',' | b'=' | b'[' | b':' | b'}'))
            {
                return self.make(TokenKind::MemberDef, start, end);
            }
        }

        if self.brace_depth == 0
            && self.paren_depth == 0
            && !self.in_preproc
            && !self.extern_decl
            && self.typedef_depth.is_none()
            && matches!(next, Some(b';' | b'=' | b'[' | b','))
        {
            return self.make(TokenKind::GlobalDef, start, end);
        }

        self.make(TokenKind::Ident, start, end)
    }

    fn emit_newline(&mut self) -> Token {
        if self.in_preproc && !self.preproc_continues() {
            self.in_preproc = false;
            self.expect_define_name = false;
            if self.define_open {
                self.define_open = false;
                self.pending
                    .push_front(self.make(TokenKind::DefineEnd, self.pos, self.pos));
            }
        }
        self.record_line = self.line_no;
        self.record_span = (self.line_start, self.pos);
        let newline = self.make(TokenKind::Newline, self.pos, self.pos);
        self.pos += 1;
        self.line_no += 1;
        self.line_start = self.pos;
        self.entry_no = 0;
        if let Some(first) = self.pending.pop_front() {
            self.pending.push_back(newline);
            first
        } else {
            newline
        }
    }

    fn preproc_continues(&self) -> bool {
        let mut i = self.pos;
        if i > 0 && self.src[i - 1] == b'\r' {
            i -= 1;
        }
        i > 0 && self.src[i - 1] == b'\\'
    }

    fn finish_eof(&mut self) -> Token {
        self.done = true;
        if self.define_open {
            self.define_open = false;
            self.pending
                .push_front(self.make(TokenKind::DefineEnd, self.pos, self.pos));
        }
        self.record_line = self.line_no;
        self.record_span = (self.line_start, self.pos);
        let eof = self.make(TokenKind::Eof, self.pos, self.pos);
        if let Some(first) = self.pending.pop_front() {
            self.pending.push_back(eof);
            first
        } else {
            eof
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collect (kind, text) for every token up to Eof.
    fn tokenize(src: &str) -> Vec<(TokenKind, String)> {
        let mut scanner = Scanner::new(src);
        let mut out = Vec::new();
        loop {
            let tok = scanner.next_token();
            let text = scanner.text(&tok).to_string();
            let kind = tok.kind;
            out.push((kind, text));
            if kind == TokenKind::Eof {
                break;
            }
        }
        out
    }

    fn symbols(src: &str) -> Vec<(TokenKind, String)> {
        tokenize(src)
            .into_iter()
            .filter(|(k, _)| k.is_symbol())
            .collect()
    }

    #[test]
    fn test_function_definition_and_call() {
        let syms = symbols("int add(int a, int b) { return a+b; }\n");
        assert_eq!(syms[0], (TokenKind::FnDef, "add".to_string()));
        assert!(syms.contains(&(TokenKind::Ident, "a".to_string())));
        assert!(syms.contains(&(TokenKind::FnEnd, String::new())));

        let syms = symbols("int main() { return add(1, 2); }\n");
        assert_eq!(syms[0], (TokenKind::FnDef, "main".to_string()));
        assert!(syms.contains(&(TokenKind::FnCall, "add".to_string())));
    }

    #[test]
    fn test_entry_no_distinguishes_scopes() {
        let mut scanner = Scanner::new("void a(void) {} void b(void) {}\n");
        let mut scopes = Vec::new();
        loop {
            let tok = scanner.next_token();
            if tok.kind == TokenKind::FnDef {
                scopes.push(tok.fcn_scope);
            }
            if tok.kind == TokenKind::Eof {
                break;
            }
        }
        assert_eq!(scopes, vec![1, 2]);
    }

    #[test]
    fn test_entry_no_resets_each_line() {
        let mut scanner = Scanner::new("void a(void) {}\nint x;\n");
        let mut after_newline = None;
        let mut seen_newline = false;
        loop {
            let tok = scanner.next_token();
            match tok.kind {
                TokenKind::Newline => seen_newline = true,
                TokenKind::Eof => break,
                _ if seen_newline && after_newline.is_none() => {
                    after_newline = Some(tok.fcn_scope);
                }
                _ => {}
            }
        }
        assert_eq!(after_newline, Some(0));
    }

    #[test]
    fn test_define_and_end() {
        let syms = symbols("#define MAX 10\nint y;\n");
        assert_eq!(syms[0], (TokenKind::Define, "MAX".to_string()));
        assert_eq!(syms[1], (TokenKind::DefineEnd, String::new()));
    }

    #[test]
    fn test_define_continuation_extends_body() {
        let toks = tokenize("#define TWICE(x) \\\n  ((x) + (x))\nint z;\n");
        let define_end_at = toks
            .iter()
            .position(|(k, _)| *k == TokenKind::DefineEnd)
            .unwrap();
        let newlines_before = toks[..define_end_at]
            .iter()
            .filter(|(k, _)| *k == TokenKind::Newline)
            .count();
        // the continuation newline precedes the macro end
        assert_eq!(newlines_before, 1);
    }

    #[test]
    fn test_macro_body_records_calls_not_definitions() {
        let syms = symbols("#define RUN() helper()\n");
        assert!(syms.contains(&(TokenKind::FnCall, "helper".to_string())));
        assert!(!syms.iter().any(|(k, _)| *k == TokenKind::FnDef));
    }

    #[test]
    fn test_include_targets() {
        let syms = symbols("#include <stdio.h>\n#include \"local.h\"\n");
        assert_eq!(
            syms[0],
            (TokenKind::Include { global: true }, "stdio.h".to_string())
        );
        assert_eq!(
            syms[1],
            (TokenKind::Include { global: false }, "local.h".to_string())
        );
    }

    #[test]
    fn test_struct_tag_and_members() {
        let syms = symbols("struct point {\n    int x;\n    int y;\n};\n");
        assert_eq!(syms[0], (TokenKind::StructDef, "point".to_string()));
        assert!(syms.contains(&(TokenKind::MemberDef, "x".to_string())));
        assert!(syms.contains(&(TokenKind::MemberDef, "y".to_string())));
    }

    #[test]
    fn test_struct_variable_is_not_a_tag_definition() {
        let syms = symbols("struct point origin;\n");
        assert_eq!(syms[0], (TokenKind::Ident, "point".to_string()));
        assert_eq!(syms[1], (TokenKind::GlobalDef, "origin".to_string()));
    }

    #[test]
    fn test_enum_and_union() {
        let syms = symbols("enum color { RED, GREEN };\nunion u { int i; };\n");
        assert!(syms.contains(&(TokenKind::EnumDef, "color".to_string())));
        assert!(syms.contains(&(TokenKind::MemberDef, "RED".to_string())));
        assert!(syms.contains(&(TokenKind::UnionDef, "u".to_string())));
    }

    #[test]
    fn test_typedef() {
        let syms = symbols("typedef unsigned long size_type;\n");
        assert!(syms.contains(&(TokenKind::Typedef, "size_type".to_string())));

        let syms = symbols("typedef struct node { int v; } node_t;\n");
        assert!(syms.contains(&(TokenKind::StructDef, "node".to_string())));
        assert!(syms.contains(&(TokenKind::MemberDef, "v".to_string())));
        assert!(syms.contains(&(TokenKind::Typedef, "node_t".to_string())));
    }

    #[test]
    fn test_extern_declarations_are_references() {
        let syms = symbols("extern int errno;\nextern int strcmp(const char *, const char *);\nint mine;\n");
        assert_eq!(syms[0], (TokenKind::Ident, "errno".to_string()));
        assert_eq!(syms[1], (TokenKind::Ident, "strcmp".to_string()));
        assert_eq!(syms[2], (TokenKind::GlobalDef, "mine".to_string()));
    }

    #[test]
    fn test_global_definitions() {
        let syms = symbols("int counter = 0;\nchar buffer[64];\nint a, b;\n");
        let globals: Vec<_> = syms
            .iter()
            .filter(|(k, _)| *k == TokenKind::GlobalDef)
            .map(|(_, t)| t.clone())
            .collect();
        assert_eq!(globals, vec!["counter", "buffer", "a", "b"]);
    }

    #[test]
    fn test_keywords_are_not_symbols() {
        let toks = tokenize("while (running) stop();\n");
        assert!(toks
            .iter()
            .any(|(k, t)| *k == TokenKind::Keyword(31) && t == "while"));
        // control keyword before '(' never classifies as a call
        assert!(!toks
            .iter()
            .any(|(k, t)| *k == TokenKind::FnCall && t == "while"));
    }

    #[test]
    fn test_comments_and_strings_hide_symbols() {
        let syms = symbols("/* add(1) */ int x; // call(2)\nchar *s = \"quoted(3)\";\n");
        assert!(!syms.iter().any(|(_, t)| t.contains("add")));
        assert!(!syms.iter().any(|(_, t)| t.contains("call")));
        assert!(!syms.iter().any(|(_, t)| t.contains("quoted")));
        assert!(syms.contains(&(TokenKind::GlobalDef, "x".to_string())));
    }

    #[test]
    fn test_multiline_comment_keeps_line_numbers() {
        let mut scanner = Scanner::new("/* line one\nline two */\nint x;\n");
        let mut lines = Vec::new();
        loop {
            let tok = scanner.next_token();
            if matches!(tok.kind, TokenKind::Newline | TokenKind::Eof) {
                lines.push(scanner.record_line());
            }
            if tok.kind == TokenKind::Eof {
                break;
            }
        }
        assert_eq!(lines, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_eof_without_trailing_newline() {
        let syms = symbols("int tail;");
        assert_eq!(syms[0], (TokenKind::GlobalDef, "tail".to_string()));
    }

    #[test]
    fn test_bom_is_consumed() {
        let src = format!("{}int x;\n", "\u{feff}");
        let syms = symbols(&src);
        assert_eq!(syms[0], (TokenKind::GlobalDef, "x".to_string()));
    }
}
