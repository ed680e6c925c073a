// C source tokenizer: token types, binary-file detection, lexer

pub mod keywords;
pub mod lexer;

pub use lexer::Scanner;

/// What a scanned token represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Plain identifier reference.
    Ident,
    /// Recognized C keyword, by frozen table index.
    Keyword(usize),
    /// Function definition (identifier followed by `(` at file scope).
    FnDef,
    /// Function call (identifier followed by `(` inside a body or macro).
    FnCall,
    /// Closing brace that ends a function body. Carries no text.
    FnEnd,
    /// `#define` name.
    Define,
    /// Logical end of a `#define` directive. Carries no text.
    DefineEnd,
    /// `#include` target; `global` is true for `<...>`, false for `"..."`.
    Include { global: bool },
    /// File-scope data definition.
    GlobalDef,
    /// Struct tag definition.
    StructDef,
    /// Union tag definition.
    UnionDef,
    /// Enum tag definition.
    EnumDef,
    /// Class name definition.
    ClassDef,
    /// Member of a struct/union/enum/class body.
    MemberDef,
    /// Typedef name definition.
    Typedef,
    /// Logical end of a source line.
    Newline,
    /// End of file. Terminates the last line even without a trailing newline.
    Eof,
}

impl TokenKind {
    /// True for kinds that name a symbol occurrence (including the empty-text
    /// FnEnd/DefineEnd markers), as opposed to keywords and line structure.
    pub fn is_symbol(self) -> bool {
        !matches!(
            self,
            TokenKind::Keyword(_) | TokenKind::Newline | TokenKind::Eof
        )
    }
}

/// One lexical event. `start..end` index the scanned source; all symbol
/// tokens lie within the line that the next Newline/Eof token closes.
/// Tokens are consumed while processing that line and never persisted.
#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    /// Function-scope entry number: incremented at each FnDef on the line,
    /// reset to 0 at each newline. Disambiguates same-named symbols during
    /// per-line deduplication.
    pub fcn_scope: u32,
}

/// Number of leading bytes inspected when sniffing for binary content.
const SNIFF_WINDOW: usize = 16;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Decide whether a file's leading bytes look like binary data.
///
/// Any byte < 9, in 14..=31, or > 126 within the first 16 bytes disqualifies
/// the file, except a UTF-8 byte-order mark at offset 0, which is skipped
/// (the rest of the window is still expected to be ASCII). Files failing this
/// check are skipped whole, never partially indexed.
pub fn looks_binary(bytes: &[u8]) -> bool {
    let mut window = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    if window.starts_with(&UTF8_BOM) {
        window = &window[UTF8_BOM.len()..];
    }
    window
        .iter()
        .any(|&b| b < 9 || (14..=31).contains(&b) || b > 126)
}
