// Streaming database reader
//
// Walks File Blocks and Line Records sequentially, reversing both
// compression layers so callers see reconstructed source text.

use std::path::Path;

use super::{DbHeader, Mark};
use crate::error::CrossRefError;
use crate::xref::compress::decode_text;

/// One symbol occurrence inside a line record.
#[derive(Debug, Clone)]
pub struct SymbolRef {
    /// None for plain identifier references.
    pub mark: Option<Mark>,
    pub text: String,
    /// For includes: true when the target was written as `<...>`.
    pub include_global: bool,
}

/// One reconstructed source line with its tagged symbols. `text` is the full
/// line (symbols re-expanded, compression reversed), identical to the
/// original modulo whitespace normalization.
#[derive(Debug, Clone)]
pub struct LineRecord {
    pub line_no: u32,
    pub text: String,
    pub symbols: Vec<SymbolRef>,
}

/// Sequential reader over one database file.
pub struct DbReader {
    data: Vec<u8>,
    pos: usize,
    done: bool,
    pub header: DbHeader,
}

impl DbReader {
    pub fn open(path: &Path) -> Result<Self, CrossRefError> {
        let data = std::fs::read(path)?;
        let mut reader = Self {
            data,
            pos: 0,
            done: false,
            header: DbHeader::new(String::new(), false, false),
        };
        let first = reader
            .read_line()
            .map(|line| line.to_vec())
            .ok_or_else(|| CrossRefError::Corrupt("empty database file".into()))?;
        reader.header = DbHeader::parse(&String::from_utf8_lossy(&first))?;
        Ok(reader)
    }

    /// Advance to the next File Block, skipping any unread records of the
    /// current one. Returns the block's path, or None at the end sentinel.
    pub fn next_file(&mut self) -> Result<Option<String>, CrossRefError> {
        if self.done {
            return Ok(None);
        }
        loop {
            match self.read_line() {
                None => {
                    return Err(CrossRefError::Corrupt(
                        "database ends without a file-mark sentinel".into(),
                    ))
                }
                Some(line) if line.starts_with(b"\t@") => {
                    let path = &line[2..];
                    if path.is_empty() {
                        self.done = true;
                        return Ok(None);
                    }
                    let path = String::from_utf8_lossy(path).into_owned();
                    // blank separator after the path line
                    match self.read_line() {
                        Some(line) if line.is_empty() => {}
                        _ => {
                            return Err(CrossRefError::Corrupt(format!(
                                "missing blank line after file mark for {:?}",
                                path
                            )))
                        }
                    }
                    return Ok(Some(path));
                }
                Some(_) => {} // leftover record data; keep scanning
            }
        }
    }

    /// Read the next Line Record of the current block, or None when the next
    /// thing in the stream is a file mark (or end of data).
    pub fn next_line(&mut self) -> Result<Option<LineRecord>, CrossRefError> {
        if self.done || self.pos >= self.data.len() || self.peek_file_mark() {
            return Ok(None);
        }
        let head = self
            .read_line()
            .ok_or_else(|| CrossRefError::Corrupt("truncated line record".into()))?;
        let space = head
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| CrossRefError::Corrupt("line record missing number field".into()))?;
        let line_no: u32 = std::str::from_utf8(&head[..space])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                CrossRefError::Corrupt(format!(
                    "bad line number: {:?}",
                    String::from_utf8_lossy(&head[..space])
                ))
            })?;

        let head = head[space + 1..].to_vec();
        let mut text = decode_text(&head);
        let mut symbols = Vec::new();

        // alternating symbol / text lines until a blank in symbol position
        loop {
            let sym_line = match self.read_line() {
                Some(line) => line.to_vec(),
                None => return Err(CrossRefError::Corrupt("unterminated line record".into())),
            };
            if sym_line.is_empty() {
                break;
            }
            let symbol = parse_symbol(&sym_line)?;
            text.push_str(&symbol.text);
            symbols.push(symbol);

            match self.read_line() {
                Some(chunk) => text.push_str(&decode_text(chunk)),
                None => return Err(CrossRefError::Corrupt("unterminated line record".into())),
            }
        }

        Ok(Some(LineRecord {
            line_no,
            text,
            symbols,
        }))
    }

    fn peek_file_mark(&self) -> bool {
        self.data[self.pos..].starts_with(b"\t@")
    }

    /// Next line without its trailing newline; None at end of data.
    fn read_line(&mut self) -> Option<&[u8]> {
        if self.pos >= self.data.len() {
            return None;
        }
        let rest = &self.data[self.pos..];
        let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        let line = &self.data[self.pos..self.pos + end];
        self.pos += end + 1;
        Some(line)
    }
}

fn parse_symbol(line: &[u8]) -> Result<SymbolRef, CrossRefError> {
    if line[0] != b'\t' {
        // unmarked plain identifier
        return Ok(SymbolRef {
            mark: None,
            text: decode_text(line),
            include_global: false,
        });
    }
    if line.len() < 2 {
        return Err(CrossRefError::Corrupt("bare tab in symbol line".into()));
    }
    let mark = Mark::from_byte(line[1]).ok_or_else(|| {
        CrossRefError::Corrupt(format!("unknown mark byte: {:?}", line[1] as char))
    })?;
    let (include_global, rest) = if mark == Mark::Include {
        match line.get(2) {
            Some(&b'<') => (true, &line[3..]),
            Some(&b'"') => (false, &line[3..]),
            _ => {
                return Err(CrossRefError::Corrupt(
                    "include mark without delimiter".into(),
                ))
            }
        }
    } else {
        (false, &line[2..])
    };
    Ok(SymbolRef {
        mark: Some(mark),
        text: decode_text(rest),
        include_global,
    })
}
