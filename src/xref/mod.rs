// Cross-reference writer: turns one file's token stream into a File Block

pub mod compress;

use std::io::{self, Write};

use crate::db::Mark;
use crate::scanner::{Scanner, TokenKind};
use compress::{keyword_code, normalize, pack_digraphs};

/// Symbols longer than this are cut down when truncation is enabled.
pub const TRUNCATE_LEN: usize = 8;

/// Writer knobs taken from the session configuration.
#[derive(Debug, Clone, Copy)]
pub struct XrefOptions {
    /// When false, output is pure ASCII and text runs take a direct-copy path.
    pub compress: bool,
    pub truncate: bool,
}

impl Default for XrefOptions {
    fn default() -> Self {
        Self {
            compress: true,
            truncate: false,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileStats {
    pub lines: usize,
    pub symbols: usize,
}

/// One deduplicated symbol occurrence, held for the current line only.
struct SymbolEntry {
    kind: TokenKind,
    start: usize,
    end: usize,
    fcn_scope: u32,
}

/// Keyword occurrence; participates in text compression, not a symbol.
struct KeywordRef {
    index: usize,
    start: usize,
    end: usize,
}

/// Mark byte for a symbol token kind; plain identifiers carry no mark.
pub fn mark_for(kind: TokenKind) -> Option<Mark> {
    match kind {
        TokenKind::FnDef => Some(Mark::FnDef),
        TokenKind::FnCall => Some(Mark::FnCall),
        TokenKind::FnEnd => Some(Mark::FnEnd),
        TokenKind::Define => Some(Mark::Define),
        TokenKind::DefineEnd => Some(Mark::DefineEnd),
        TokenKind::Include { .. } => Some(Mark::Include),
        TokenKind::GlobalDef => Some(Mark::GlobalDef),
        TokenKind::StructDef => Some(Mark::StructDef),
        TokenKind::UnionDef => Some(Mark::UnionDef),
        TokenKind::EnumDef => Some(Mark::EnumDef),
        TokenKind::ClassDef => Some(Mark::ClassDef),
        TokenKind::MemberDef => Some(Mark::MemberDef),
        TokenKind::Typedef => Some(Mark::Typedef),
        _ => None,
    }
}

/// Scan `src` and append its File Block to `out`.
///
/// A write failure here is fatal for the whole build; the builder writes to a
/// temporary path and renames only on full success.
pub fn write_file_block<W: Write>(
    out: &mut W,
    path: &str,
    src: &str,
    opts: &XrefOptions,
) -> io::Result<FileStats> {
    out.write_all(b"\t@")?;
    out.write_all(path.as_bytes())?;
    out.write_all(b"\n\n")?;

    let mut scanner = Scanner::new(src);
    let mut entries: Vec<SymbolEntry> = Vec::new();
    let mut keywords: Vec<KeywordRef> = Vec::new();
    let mut stats = FileStats::default();

    loop {
        let tok = scanner.next_token();
        match tok.kind {
            TokenKind::Newline | TokenKind::Eof => {
                if !entries.is_empty() {
                    serialize_line(
                        out,
                        scanner.record_line(),
                        scanner.record_text().as_bytes(),
                        scanner.record_start(),
                        &entries,
                        &keywords,
                        opts,
                    )?;
                    stats.lines += 1;
                    stats.symbols += entries.len();
                }
                entries.clear();
                keywords.clear();
                if tok.kind == TokenKind::Eof {
                    break;
                }
            }
            TokenKind::Keyword(index) => keywords.push(KeywordRef {
                index,
                start: tok.start,
                end: tok.end,
            }),
            _ => {
                debug_assert!(tok.kind.is_symbol());
                // dedupe on (text, kind, scope); typical lines hold only a
                // few symbols, so the linear scan is fine
                let text = scanner.text(&tok);
                let duplicate = entries.iter().any(|e| {
                    e.kind == tok.kind
                        && e.fcn_scope == tok.fcn_scope
                        && scanner.slice(e.start, e.end) == text
                });
                if !duplicate {
                    entries.push(SymbolEntry {
                        kind: tok.kind,
                        start: tok.start,
                        end: tok.end,
                        fcn_scope: tok.fcn_scope,
                    });
                }
            }
        }
    }

    Ok(stats)
}

/// Serialize one line record.
///
/// Layout: a line-number line carrying the text before the first symbol,
/// then alternating symbol and text lines, then a blank terminator line.
/// Mid-record text lines may be empty; the terminator is unambiguous because
/// it is read in a symbol position.
fn serialize_line<W: Write>(
    out: &mut W,
    line_no: u32,
    line: &[u8],
    line_start: usize,
    entries: &[SymbolEntry],
    keywords: &[KeywordRef],
    opts: &XrefOptions,
) -> io::Result<()> {
    write!(out, "{} ", line_no)?;

    let mut cursor = 0usize;
    for entry in entries {
        let start = entry.start - line_start;
        let end = entry.end - line_start;
        emit_text(out, line, line_start, cursor, start, keywords, opts)?;
        out.write_all(b"\n")?;
        emit_symbol(out, entry, &line[start..end], opts)?;
        out.write_all(b"\n")?;
        cursor = end;
    }
    emit_text(out, line, line_start, cursor, line.len(), keywords, opts)?;
    out.write_all(b"\n\n")
}

fn emit_symbol<W: Write>(
    out: &mut W,
    entry: &SymbolEntry,
    text: &[u8],
    opts: &XrefOptions,
) -> io::Result<()> {
    match entry.kind {
        TokenKind::Include { global } => {
            out.write_all(&[b'\t', Mark::Include.byte(), if global { b'<' } else { b'"' }])?;
        }
        other => {
            if let Some(mark) = mark_for(other) {
                out.write_all(&[b'\t', mark.byte()])?;
            }
        }
    }
    let mut text = text;
    if opts.truncate && text.len() > TRUNCATE_LEN {
        text = &text[..TRUNCATE_LEN];
    }
    if opts.compress {
        let mut packed = Vec::with_capacity(text.len());
        pack_digraphs(text, &mut packed);
        out.write_all(&packed)
    } else {
        out.write_all(text)
    }
}

/// Emit the non-symbol text in `line[from..to]` (offsets relative to the line
/// start), substituting keyword control bytes and packing digraphs when
/// compression is on. Digraph pairs never straddle a keyword or symbol
/// boundary because each stretch is encoded independently.
fn emit_text<W: Write>(
    out: &mut W,
    line: &[u8],
    line_start: usize,
    from: usize,
    to: usize,
    keywords: &[KeywordRef],
    opts: &XrefOptions,
) -> io::Result<()> {
    if !opts.compress {
        // direct-copy path: only whitespace normalization applies
        return out.write_all(&normalize(&line[from..to]));
    }

    let mut buf = Vec::with_capacity(to - from);
    let mut cursor = from;
    for kw in keywords {
        let (start, end) = (
            kw.start.wrapping_sub(line_start),
            kw.end.wrapping_sub(line_start),
        );
        if start < cursor || end > to {
            continue;
        }
        pack_digraphs(&normalize(&line[cursor..start]), &mut buf);
        match keyword_code(kw.index) {
            Some(code) => buf.push(code),
            // above the compression threshold: stored as plain text
            None => pack_digraphs(&line[start..end], &mut buf),
        }
        cursor = end;
    }
    pack_digraphs(&normalize(&line[cursor..to]), &mut buf);
    out.write_all(&buf)
}
