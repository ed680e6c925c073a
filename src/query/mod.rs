// Query types and result sets

pub mod engine;

pub use engine::QueryEngine;

use serde::Serialize;
use std::collections::BTreeMap;

/// The eight database queries plus the two pseudo-queries, which take no
/// pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// All references to a symbol, marked or plain.
    Symbol,
    /// Definitions only: functions, macros, globals, aggregates, typedefs.
    Definition,
    /// Functions called by the named function or macro.
    CalledBy,
    /// Functions calling the named function.
    Calling,
    /// Literal text occurring anywhere in a stored line.
    Text,
    /// Regular-expression match over stored lines.
    Regex,
    /// Indexed files whose name matches.
    File,
    /// Files that include the named file.
    Including,
    /// Every function definition in the database.
    AllFunctions,
    /// Files skipped during the last build.
    ScanErrors,
}

impl QueryKind {
    /// Pseudo-queries ignore the pattern entirely.
    pub fn is_pseudo(self) -> bool {
        matches!(self, QueryKind::AllFunctions | QueryKind::ScanErrors)
    }

    pub fn describe(self) -> &'static str {
        match self {
            QueryKind::Symbol => "symbol references",
            QueryKind::Definition => "definitions",
            QueryKind::CalledBy => "functions called by",
            QueryKind::Calling => "functions calling",
            QueryKind::Text => "text",
            QueryKind::Regex => "regex",
            QueryKind::File => "files named",
            QueryKind::Including => "files including",
            QueryKind::AllFunctions => "all function definitions",
            QueryKind::ScanErrors => "files skipped by the indexer",
        }
    }
}

/// One query hit: where it is and the line it sits on.
#[derive(Debug, Clone, Serialize)]
pub struct Match {
    pub file: String,
    pub line: u32,
    /// Enclosing function, or `<global>` at file scope.
    pub function: String,
    pub text: String,
}

/// How a query invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Completed,
    /// The cancel flag was seen mid-scan; `matches` holds the partial set.
    Cancelled,
    /// Smart-query short-circuit: same query as last time, nothing scanned.
    NotPerformed,
}

#[derive(Debug)]
pub struct SearchResultSet {
    pub matches: Vec<Match>,
    pub match_count: usize,
    pub status: QueryStatus,
}

impl SearchResultSet {
    pub fn not_performed() -> Self {
        Self {
            matches: Vec::new(),
            match_count: 0,
            status: QueryStatus::NotPerformed,
        }
    }
}

/// Per-mark symbol counts over the whole database.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub files: usize,
    pub lines: usize,
    /// Plain identifier references, which carry no mark.
    pub plain_refs: usize,
    /// Counts keyed by the mark's description, sorted for stable output.
    pub by_mark: BTreeMap<&'static str, usize>,
}
