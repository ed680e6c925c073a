// Database text compression: keyword control bytes and digraph packing
//
// Both layers are part of the on-disk format. The digraph tables hold the
// most frequent character pairs in English C source; their order, like the
// keyword table's, is frozen.

use once_cell::sync::Lazy;

use crate::scanner::keywords::{KEYWORDS, KEYWORD_COMPRESS_LIMIT};

/// Most frequent first characters of a pair.
pub const DICHAR1: [u8; 16] = *b" teisaprnl(of)=c";
/// Most frequent second characters of a pair.
pub const DICHAR2: [u8; 8] = *b" tnerpla";

// dicode tables: 0 means "not in table", otherwise a 1-based code
// pre-scaled so that the packed byte is 0o200 - 2 + code1 + code2.
static DICODE1: Lazy<[u8; 256]> = Lazy::new(|| {
    let mut table = [0u8; 256];
    for (i, &c) in DICHAR1.iter().enumerate() {
        table[c as usize] = (i * 8 + 1) as u8;
    }
    table
});

static DICODE2: Lazy<[u8; 256]> = Lazy::new(|| {
    let mut table = [0u8; 256];
    for (i, &c) in DICHAR2.iter().enumerate() {
        table[c as usize] = (i + 1) as u8;
    }
    table
});

/// Pack two adjacent characters into one high-bit byte, if both are in the
/// digraph tables.
pub fn digraph_byte(c1: u8, c2: u8) -> Option<u8> {
    let d1 = DICODE1[c1 as usize];
    let d2 = DICODE2[c2 as usize];
    if d1 != 0 && d2 != 0 {
        Some(0o200 - 2 + d1 + d2)
    } else {
        None
    }
}

/// Unpack a high-bit digraph byte.
pub fn expand_digraph(b: u8) -> Option<(u8, u8)> {
    if b & 0o200 == 0 {
        return None;
    }
    let index = (b & 0o177) as usize;
    Some((DICHAR1[index >> 3], DICHAR2[index & 7]))
}

/// Control byte for a keyword table index, for indices below
/// KEYWORD_COMPRESS_LIMIT. Codes avoid `\t`, `\n`, and `\r`, which carry
/// structure in the database.
pub fn keyword_code(index: usize) -> Option<u8> {
    match index {
        0..=7 => Some(index as u8 + 1),   // 1..=8
        8..=9 => Some(index as u8 + 3),   // 11..=12
        10..=27 => Some(index as u8 + 4), // 14..=31
        _ => None,
    }
}

/// Inverse of `keyword_code`.
pub fn keyword_from_code(b: u8) -> Option<usize> {
    match b {
        1..=8 => Some(b as usize - 1),
        11..=12 => Some(b as usize - 3),
        14..=31 => Some(b as usize - 4),
        _ => None,
    }
}

/// Whitespace normalization applied to every stored text run: tabs (and the
/// other blank control characters) become single blanks, and runs of blanks
/// collapse to one.
pub fn normalize(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut prev_blank = false;
    for &b in raw {
        if matches!(b, b' ' | b'\t' | 11 | 12 | 13) {
            if !prev_blank {
                out.push(b' ');
            }
            prev_blank = true;
        } else {
            out.push(b);
            prev_blank = false;
        }
    }
    out
}

/// Digraph-pack an already-normalized text run.
pub fn pack_digraphs(text: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < text.len() {
        if i + 1 < text.len() {
            if let Some(b) = digraph_byte(text[i], text[i + 1]) {
                out.push(b);
                i += 2;
                continue;
            }
        }
        out.push(text[i]);
        i += 1;
    }
}

/// Reverse both compression layers, yielding the stored plain text.
pub fn decode_text(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        if let Some((c1, c2)) = expand_digraph(b) {
            out.push(c1 as char);
            out.push(c2 as char);
        } else if let Some(index) = keyword_from_code(b) {
            out.push_str(KEYWORDS[index]);
        } else {
            out.push(b as char);
        }
    }
    out
}
