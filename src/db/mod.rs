// Cross-reference database format: header line, mark bytes, block layout
//
// The database is an append-structured sequential file: one header line, one
// File Block per indexed source file in strict lexicographic path order, and
// a bare file-mark sentinel at the end. Mark bytes and the compression
// tables are frozen; reordering them breaks existing databases.

pub mod builder;
pub mod reader;

use crate::error::CrossRefError;

/// Magic word opening the header line.
pub const DB_MAGIC: &str = "cxref";

/// Current format version. Databases carrying any other version force a full
/// rebuild.
pub const FORMAT_VERSION: u32 = 15;

/// Width of the legacy trailer-offset field in the header. The value is
/// unused but must be emitted for compatibility.
pub const TRAILER_WIDTH: usize = 10;

/// Tab-prefixed mark bytes tagging symbol occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mark {
    /// Starts a File Block; a bare file mark is the end sentinel.
    File,
    FnDef,
    FnCall,
    FnEnd,
    Define,
    DefineEnd,
    /// Followed by `<` or `"` recording the original delimiter.
    Include,
    ClassDef,
    EnumDef,
    GlobalDef,
    MemberDef,
    StructDef,
    Typedef,
    UnionDef,
}

impl Mark {
    pub fn byte(self) -> u8 {
        match self {
            Mark::File => b'@',
            Mark::FnDef => b'$',
            Mark::FnCall => b'`',
            Mark::FnEnd => b'}',
            Mark::Define => b'#',
            Mark::DefineEnd => b')',
            Mark::Include => b'~',
            Mark::ClassDef => b'c',
            Mark::EnumDef => b'e',
            Mark::GlobalDef => b'g',
            Mark::MemberDef => b'm',
            Mark::StructDef => b's',
            Mark::Typedef => b't',
            Mark::UnionDef => b'u',
        }
    }

    pub fn from_byte(b: u8) -> Option<Mark> {
        Some(match b {
            b'@' => Mark::File,
            b'$' => Mark::FnDef,
            b'`' => Mark::FnCall,
            b'}' => Mark::FnEnd,
            b'#' => Mark::Define,
            b')' => Mark::DefineEnd,
            b'~' => Mark::Include,
            b'c' => Mark::ClassDef,
            b'e' => Mark::EnumDef,
            b'g' => Mark::GlobalDef,
            b'm' => Mark::MemberDef,
            b's' => Mark::StructDef,
            b't' => Mark::Typedef,
            b'u' => Mark::UnionDef,
            _ => return None,
        })
    }

    pub fn describe(self) -> &'static str {
        match self {
            Mark::File => "file",
            Mark::FnDef => "function definition",
            Mark::FnCall => "function call",
            Mark::FnEnd => "function end",
            Mark::Define => "macro definition",
            Mark::DefineEnd => "macro end",
            Mark::Include => "include",
            Mark::ClassDef => "class definition",
            Mark::EnumDef => "enum definition",
            Mark::GlobalDef => "global definition",
            Mark::MemberDef => "member definition",
            Mark::StructDef => "struct definition",
            Mark::Typedef => "typedef definition",
            Mark::UnionDef => "union definition",
        }
    }
}

/// Parsed or to-be-written header line:
/// `cxref <version> <current-dir> [-c] [-T] <trailer-offset>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbHeader {
    pub version: u32,
    pub cur_dir: String,
    /// `-c`: compression disabled, database is pure ASCII.
    pub compress_disabled: bool,
    /// `-T`: symbols were truncated at write time.
    pub truncate: bool,
    pub trailer_offset: u64,
}

impl DbHeader {
    pub fn new(cur_dir: String, compress_disabled: bool, truncate: bool) -> Self {
        Self {
            version: FORMAT_VERSION,
            cur_dir,
            compress_disabled,
            truncate,
            trailer_offset: 0,
        }
    }

    pub fn encode(&self) -> String {
        let mut line = format!("{} {} {}", DB_MAGIC, self.version, self.cur_dir);
        if self.compress_disabled {
            line.push_str(" -c");
        }
        if self.truncate {
            line.push_str(" -T");
        }
        line.push_str(&format!(
            " {:0width$}",
            self.trailer_offset,
            width = TRAILER_WIDTH
        ));
        line
    }

    /// Parse a header line. `cur_dir` may contain blanks, so it is taken as
    /// the span between the fixed leading fields and the fixed tail (the
    /// optional flags and the trailer offset), not by whitespace splitting.
    pub fn parse(line: &str) -> Result<Self, CrossRefError> {
        let corrupt =
            || CrossRefError::Corrupt(format!("unrecognized header line: {:?}", line));
        let rest = line
            .strip_prefix(DB_MAGIC)
            .and_then(|r| r.strip_prefix(' '))
            .ok_or_else(corrupt)?;
        let (version_field, rest) = rest.split_once(' ').ok_or_else(corrupt)?;
        let version: u32 = version_field.parse().map_err(|_| {
            CrossRefError::Corrupt(format!("bad version field: {:?}", version_field))
        })?;
        if version != FORMAT_VERSION {
            return Err(CrossRefError::VersionMismatch {
                found: version,
                expected: FORMAT_VERSION,
            });
        }
        let (head, trailer_field) = rest.rsplit_once(' ').ok_or_else(corrupt)?;
        let trailer_offset: u64 = trailer_field.parse().map_err(|_| {
            CrossRefError::Corrupt(format!("bad trailer offset: {:?}", trailer_field))
        })?;
        // flags sit between the directory and the trailer, in emit order
        let mut cur_dir = head;
        let mut truncate = false;
        let mut compress_disabled = false;
        if let Some(stripped) = cur_dir.strip_suffix(" -T") {
            truncate = true;
            cur_dir = stripped;
        }
        if let Some(stripped) = cur_dir.strip_suffix(" -c") {
            compress_disabled = true;
            cur_dir = stripped;
        }
        if cur_dir.is_empty() {
            return Err(corrupt());
        }
        Ok(Self {
            version,
            cur_dir: cur_dir.to_string(),
            compress_disabled,
            truncate,
            trailer_offset,
        })
    }
}
