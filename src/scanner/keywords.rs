// Static C keyword table
//
// The table order is frozen: keyword indices below KEYWORD_COMPRESS_LIMIT are
// written into databases as single control bytes, so reordering entries breaks
// every existing database.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// All recognized C keywords, in frozen order.
pub const KEYWORDS: [&str; 32] = [
    "auto", "break", "case", "char", "const", "continue", "default", "do",
    "double", "else", "enum", "extern", "float", "for", "goto", "if", "int",
    "long", "register", "return", "short", "signed", "sizeof", "static",
    "struct", "switch", "typedef", "union", "unsigned", "void", "volatile",
    "while",
];

/// Keywords with an index below this are stored as one control byte.
pub const KEYWORD_COMPRESS_LIMIT: usize = 28;

pub const KW_ENUM: usize = 10;
pub const KW_EXTERN: usize = 11;
pub const KW_STRUCT: usize = 24;
pub const KW_TYPEDEF: usize = 26;
pub const KW_UNION: usize = 27;

static KEYWORD_LOOKUP: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    KEYWORDS.iter().enumerate().map(|(i, &kw)| (kw, i)).collect()
});

/// Look up a word in the keyword table, returning its frozen index.
pub fn keyword_index(word: &str) -> Option<usize> {
    KEYWORD_LOOKUP.get(word).copied()
}
