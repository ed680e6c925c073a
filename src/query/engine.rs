// Query execution engine
//
// Every query is one sequential pass over the database. The engine holds no
// open handle between queries, so a rebuild can swap the file underneath it
// at any time.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use regex::RegexBuilder;
use tracing::debug;

use super::{CacheStats, Match, QueryKind, QueryStatus, SearchResultSet};
use crate::config::Config;
use crate::db::builder::ScanError;
use crate::db::reader::{DbReader, SymbolRef};
use crate::db::Mark;
use crate::error::CrossRefError;
use crate::xref::TRUNCATE_LEN;

/// Function attribution for matches outside any function body.
pub const GLOBAL_SCOPE: &str = "<global>";

pub struct QueryEngine {
    db_path: PathBuf,
    config: Config,
    /// Last successfully completed (kind, pattern), for smart-query.
    last_query: Option<(QueryKind, String)>,
    /// Files the most recent build skipped, served by the pseudo-query.
    scan_errors: Vec<ScanError>,
}

impl QueryEngine {
    pub fn new(db_path: PathBuf, config: Config) -> Self {
        Self {
            db_path,
            config,
            last_query: None,
            scan_errors: Vec::new(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Record the skip list of a finished build and forget the last query,
    /// since the database contents may have changed.
    pub fn set_scan_errors(&mut self, errors: Vec<ScanError>) {
        self.scan_errors = errors;
        self.invalidate();
    }

    pub fn invalidate(&mut self) {
        self.last_query = None;
    }

    /// Run one query. The cancel flag is checked once per line record;
    /// cancellation returns the partial result set, not an error.
    pub fn query(
        &mut self,
        kind: QueryKind,
        pattern: &str,
        cancel: &AtomicBool,
    ) -> Result<SearchResultSet, CrossRefError> {
        if !kind.is_pseudo() && pattern.is_empty() {
            return Err(CrossRefError::EmptyPattern);
        }
        if kind == QueryKind::ScanErrors {
            return Ok(self.scan_error_results());
        }

        let key = (kind, pattern.to_string());
        if self.config.query.smart && self.last_query.as_ref() == Some(&key) {
            debug!("smart query: repeating {:?} {:?}, skipping scan", kind, pattern);
            return Ok(SearchResultSet::not_performed());
        }

        let ci = self.config.query.case_insensitive;
        let regex = if kind == QueryKind::Regex {
            Some(
                RegexBuilder::new(pattern)
                    .case_insensitive(ci)
                    .build()
                    .map_err(|e| CrossRefError::BadPattern(e.to_string()))?,
            )
        } else {
            None
        };

        let mut reader = DbReader::open(&self.db_path)?;
        let mut pattern = pattern.to_string();
        let symbol_kind = matches!(
            kind,
            QueryKind::Symbol | QueryKind::Definition | QueryKind::CalledBy | QueryKind::Calling
        );
        if reader.header.truncate && symbol_kind && pattern.len() > TRUNCATE_LEN {
            // stored symbols are cut down, so the pattern must be too
            pattern.truncate(TRUNCATE_LEN);
        }
        let needle = fold(&pattern, ci);

        let mut matches = Vec::new();
        let mut status = QueryStatus::Completed;
        'files: while let Some(file) = reader.next_file()? {
            if cancel.load(Ordering::Relaxed) {
                status = QueryStatus::Cancelled;
                break;
            }
            if kind == QueryKind::File {
                if file_name_matches(&fold(&file, ci), &needle) {
                    matches.push(Match {
                        file: file.clone(),
                        line: 1,
                        function: GLOBAL_SCOPE.to_string(),
                        text: file,
                    });
                }
                continue;
            }

            let mut current_fn = GLOBAL_SCOPE.to_string();
            let mut in_target = false;
            while let Some(rec) = reader.next_line()? {
                if cancel.load(Ordering::Relaxed) {
                    status = QueryStatus::Cancelled;
                    break 'files;
                }
                for sym in &rec.symbols {
                    let hit = match kind {
                        QueryKind::Symbol => {
                            is_reference(sym.mark) && fold(&sym.text, ci) == needle
                        }
                        QueryKind::Definition => {
                            is_definition(sym.mark) && fold(&sym.text, ci) == needle
                        }
                        QueryKind::CalledBy => {
                            if matches!(sym.mark, Some(Mark::FnDef) | Some(Mark::Define))
                                && fold(&sym.text, ci) == needle
                            {
                                in_target = true;
                            }
                            in_target && sym.mark == Some(Mark::FnCall)
                        }
                        QueryKind::Calling => {
                            sym.mark == Some(Mark::FnCall) && fold(&sym.text, ci) == needle
                        }
                        QueryKind::Including => {
                            sym.mark == Some(Mark::Include)
                                && self.include_matches(&file, sym, &needle, ci)
                        }
                        QueryKind::AllFunctions => sym.mark == Some(Mark::FnDef),
                        _ => false,
                    };

                    // scope tracking after the hit test, so a definition
                    // match is attributed to its own function
                    match sym.mark {
                        Some(Mark::FnDef) | Some(Mark::Define) => current_fn = sym.text.clone(),
                        Some(Mark::FnEnd) | Some(Mark::DefineEnd) => {
                            current_fn = GLOBAL_SCOPE.to_string();
                            in_target = false;
                        }
                        _ => {}
                    }
                    if hit {
                        matches.push(Match {
                            file: file.clone(),
                            line: rec.line_no,
                            function: current_fn.clone(),
                            text: rec.text.clone(),
                        });
                    }
                }

                let line_hit = match kind {
                    QueryKind::Text => fold(&rec.text, ci).contains(&needle),
                    QueryKind::Regex => regex.as_ref().is_some_and(|re| re.is_match(&rec.text)),
                    _ => false,
                };
                if line_hit {
                    matches.push(Match {
                        file: file.clone(),
                        line: rec.line_no,
                        function: current_fn.clone(),
                        text: rec.text.clone(),
                    });
                }
            }
        }

        if status == QueryStatus::Completed {
            self.last_query = Some(key);
        }
        debug!(
            "{} {:?}: {} matches ({:?})",
            kind.describe(),
            pattern,
            matches.len(),
            status
        );
        Ok(SearchResultSet {
            match_count: matches.len(),
            matches,
            status,
        })
    }

    /// One full pass counting symbols per mark.
    pub fn cache_stats(&self) -> Result<CacheStats, CrossRefError> {
        let mut reader = DbReader::open(&self.db_path)?;
        let mut stats = CacheStats::default();
        while reader.next_file()?.is_some() {
            stats.files += 1;
            while let Some(rec) = reader.next_line()? {
                stats.lines += 1;
                for sym in &rec.symbols {
                    match sym.mark {
                        Some(mark) => *stats.by_mark.entry(mark.describe()).or_insert(0) += 1,
                        None => stats.plain_refs += 1,
                    }
                }
            }
        }
        Ok(stats)
    }

    fn scan_error_results(&self) -> SearchResultSet {
        let matches: Vec<Match> = self
            .scan_errors
            .iter()
            .map(|err| Match {
                file: err.path.display().to_string(),
                line: 1,
                function: GLOBAL_SCOPE.to_string(),
                text: err.reason.clone(),
            })
            .collect();
        SearchResultSet {
            match_count: matches.len(),
            matches,
            status: QueryStatus::Completed,
        }
    }

    /// An include target matches on exact text or basename; a path-qualified
    /// pattern additionally requires the resolved path to end with it.
    fn include_matches(&self, including: &str, sym: &SymbolRef, needle: &str, ci: bool) -> bool {
        let target = fold(&sym.text, ci);
        if target == needle {
            return true;
        }
        if basename(&target) != basename(needle) {
            return false;
        }
        if needle.contains('/') {
            match self.resolve_include(including, sym) {
                Some(resolved) => fold(&resolved.to_string_lossy(), ci).ends_with(needle),
                None => false,
            }
        } else {
            true
        }
    }

    /// Quoted includes resolve against the including file's directory,
    /// bracketed ones against the configured include search path.
    fn resolve_include(&self, including: &str, sym: &SymbolRef) -> Option<PathBuf> {
        if sym.include_global {
            for dir in &self.config.paths.include_path {
                let skip = dir
                    .file_name()
                    .is_some_and(|n| self.config.is_ignored_dir(&n.to_string_lossy()));
                if skip {
                    continue;
                }
                let candidate = dir.join(&sym.text);
                if candidate.exists() {
                    return Some(candidate);
                }
            }
            None
        } else {
            let candidate = Path::new(including).parent()?.join(&sym.text);
            candidate.exists().then_some(candidate)
        }
    }
}

fn fold(s: &str, case_insensitive: bool) -> String {
    if case_insensitive {
        s.to_lowercase()
    } else {
        s.to_string()
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn file_name_matches(path: &str, needle: &str) -> bool {
    path == needle || path.ends_with(&format!("/{}", needle))
}

/// Marks a symbol query should report. Structural end markers and include
/// targets are not symbol references.
fn is_reference(mark: Option<Mark>) -> bool {
    !matches!(
        mark,
        Some(Mark::FnEnd) | Some(Mark::DefineEnd) | Some(Mark::Include) | Some(Mark::File)
    )
}

fn is_definition(mark: Option<Mark>) -> bool {
    matches!(
        mark,
        Some(Mark::FnDef)
            | Some(Mark::Define)
            | Some(Mark::GlobalDef)
            | Some(Mark::StructDef)
            | Some(Mark::UnionDef)
            | Some(Mark::EnumDef)
            | Some(Mark::ClassDef)
            | Some(Mark::MemberDef)
            | Some(Mark::Typedef)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::builder::{build, NoopProgress, SourceFile};
    use tempfile::TempDir;

    fn engine_for(sources: &[(&str, &str)]) -> (TempDir, QueryEngine) {
        engine_with_config(sources, Config::default())
    }

    fn engine_with_config(sources: &[(&str, &str)], config: Config) -> (TempDir, QueryEngine) {
        let dir = TempDir::new().unwrap();
        let mut files = Vec::new();
        for (name, content) in sources {
            let path = dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            files.push(SourceFile::from_path(path).unwrap());
        }
        files.sort_by(|a, b| a.path.as_os_str().cmp(b.path.as_os_str()));
        let db_path = dir.path().join("cxref.out");
        let cancel = AtomicBool::new(false);
        build(&db_path, &files, &config, &NoopProgress, &cancel).unwrap();
        (dir, QueryEngine::new(db_path, config))
    }

    fn run(engine: &mut QueryEngine, kind: QueryKind, pattern: &str) -> SearchResultSet {
        engine
            .query(kind, pattern, &AtomicBool::new(false))
            .unwrap()
    }

    const FOO_C: &str = "int add(int a, int b) { return a+b; }\n";
    const MAIN_C: &str = "int main() { return add(1,2); }\n";

    #[test]
    fn test_definition_query() {
        let (_dir, mut engine) = engine_for(&[("foo.c", FOO_C), ("main.c", MAIN_C)]);
        let result = run(&mut engine, QueryKind::Definition, "add");
        assert_eq!(result.status, QueryStatus::Completed);
        assert_eq!(result.match_count, 1);
        assert!(result.matches[0].file.ends_with("foo.c"));
        assert_eq!(result.matches[0].line, 1);
        assert_eq!(result.matches[0].function, "add");
    }

    #[test]
    fn test_symbol_query_finds_all_references() {
        let (_dir, mut engine) = engine_for(&[("foo.c", FOO_C), ("main.c", MAIN_C)]);
        let result = run(&mut engine, QueryKind::Symbol, "add");
        assert_eq!(result.match_count, 2);
        let files: Vec<&str> = result
            .matches
            .iter()
            .map(|m| basename(&m.file))
            .collect();
        assert_eq!(files, vec!["foo.c", "main.c"]);
    }

    #[test]
    fn test_called_by() {
        let (_dir, mut engine) = engine_for(&[("foo.c", FOO_C), ("main.c", MAIN_C)]);
        let result = run(&mut engine, QueryKind::CalledBy, "main");
        assert_eq!(result.match_count, 1);
        assert!(result.matches[0].file.ends_with("main.c"));
        assert_eq!(result.matches[0].function, "main");
        assert!(result.matches[0].text.contains("add(1,2)"));
    }

    #[test]
    fn test_calling() {
        let (_dir, mut engine) = engine_for(&[("foo.c", FOO_C), ("main.c", MAIN_C)]);
        let result = run(&mut engine, QueryKind::Calling, "add");
        assert_eq!(result.match_count, 1);
        assert_eq!(result.matches[0].function, "main");
    }

    #[test]
    fn test_text_and_regex_queries() {
        let (_dir, mut engine) = engine_for(&[("foo.c", FOO_C), ("main.c", MAIN_C)]);
        let result = run(&mut engine, QueryKind::Text, "return a+b");
        assert_eq!(result.match_count, 1);
        assert!(result.matches[0].file.ends_with("foo.c"));

        let result = run(&mut engine, QueryKind::Regex, r"add\([0-9]+,[0-9]+\)");
        assert_eq!(result.match_count, 1);
        assert!(result.matches[0].file.ends_with("main.c"));
    }

    #[test]
    fn test_bad_regex_rejected_before_scan() {
        let (_dir, mut engine) = engine_for(&[("foo.c", FOO_C)]);
        let result = engine.query(QueryKind::Regex, "add(", &AtomicBool::new(false));
        assert!(matches!(result, Err(CrossRefError::BadPattern(_))));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let (_dir, mut engine) = engine_for(&[("foo.c", FOO_C)]);
        for kind in [
            QueryKind::Symbol,
            QueryKind::Definition,
            QueryKind::Text,
            QueryKind::Regex,
            QueryKind::File,
        ] {
            let result = engine.query(kind, "", &AtomicBool::new(false));
            assert!(matches!(result, Err(CrossRefError::EmptyPattern)));
        }
        // pseudo-queries take no pattern
        let result = run(&mut engine, QueryKind::AllFunctions, "");
        assert_eq!(result.status, QueryStatus::Completed);
    }

    #[test]
    fn test_smart_query_short_circuit() {
        let (_dir, mut engine) = engine_for(&[("foo.c", FOO_C)]);
        let first = run(&mut engine, QueryKind::Definition, "add");
        assert_eq!(first.status, QueryStatus::Completed);
        let repeat = run(&mut engine, QueryKind::Definition, "add");
        assert_eq!(repeat.status, QueryStatus::NotPerformed);
        assert_eq!(repeat.match_count, 0);

        // a different pattern or kind scans again
        let other = run(&mut engine, QueryKind::Symbol, "add");
        assert_eq!(other.status, QueryStatus::Completed);

        engine.invalidate();
        let after = run(&mut engine, QueryKind::Symbol, "add");
        assert_eq!(after.status, QueryStatus::Completed);
    }

    #[test]
    fn test_smart_query_disabled() {
        let mut config = Config::default();
        config.query.smart = false;
        let (_dir, mut engine) = engine_with_config(&[("foo.c", FOO_C)], config);
        run(&mut engine, QueryKind::Definition, "add");
        let repeat = run(&mut engine, QueryKind::Definition, "add");
        assert_eq!(repeat.status, QueryStatus::Completed);
        assert_eq!(repeat.match_count, 1);
    }

    #[test]
    fn test_cancellation_returns_partial_results() {
        let (_dir, mut engine) = engine_for(&[("foo.c", FOO_C), ("main.c", MAIN_C)]);
        let cancel = AtomicBool::new(true);
        let result = engine.query(QueryKind::Symbol, "add", &cancel).unwrap();
        assert_eq!(result.status, QueryStatus::Cancelled);
        assert_eq!(result.match_count, 0);
        // a cancelled query must not arm the smart-query short-circuit
        let again = run(&mut engine, QueryKind::Symbol, "add");
        assert_eq!(again.status, QueryStatus::Completed);
        assert_eq!(again.match_count, 2);
    }

    #[test]
    fn test_file_query_respects_cancellation() {
        let (_dir, mut engine) = engine_for(&[("foo.c", FOO_C), ("main.c", MAIN_C)]);
        let cancel = AtomicBool::new(true);
        let result = engine.query(QueryKind::File, "foo.c", &cancel).unwrap();
        assert_eq!(result.status, QueryStatus::Cancelled);
        assert_eq!(result.match_count, 0);
    }

    #[test]
    fn test_case_insensitive_matching() {
        let mut config = Config::default();
        config.query.case_insensitive = true;
        let (_dir, mut engine) = engine_with_config(&[("foo.c", FOO_C)], config);
        let result = run(&mut engine, QueryKind::Definition, "ADD");
        assert_eq!(result.match_count, 1);
    }

    #[test]
    fn test_all_functions() {
        let (_dir, mut engine) = engine_for(&[("foo.c", FOO_C), ("main.c", MAIN_C)]);
        let result = run(&mut engine, QueryKind::AllFunctions, "");
        assert_eq!(result.match_count, 2);
        let names: Vec<&str> = result.matches.iter().map(|m| m.function.as_str()).collect();
        assert_eq!(names, vec!["add", "main"]);
    }

    #[test]
    fn test_file_query() {
        let (_dir, mut engine) = engine_for(&[("foo.c", FOO_C), ("main.c", MAIN_C)]);
        let result = run(&mut engine, QueryKind::File, "foo.c");
        assert_eq!(result.match_count, 1);
        assert!(result.matches[0].file.ends_with("foo.c"));

        let result = run(&mut engine, QueryKind::File, "missing.c");
        assert_eq!(result.match_count, 0);
        assert_eq!(result.status, QueryStatus::Completed);
    }

    #[test]
    fn test_including_query() {
        let (_dir, mut engine) = engine_for(&[
            ("a.c", "#include \"util.h\"\nint a;\n"),
            ("b.c", "#include <stdio.h>\nint b;\n"),
            ("util.h", "int util_fn(void);\n"),
        ]);
        let result = run(&mut engine, QueryKind::Including, "util.h");
        assert_eq!(result.match_count, 1);
        assert!(result.matches[0].file.ends_with("a.c"));

        let result = run(&mut engine, QueryKind::Including, "stdio.h");
        assert_eq!(result.match_count, 1);
        assert!(result.matches[0].file.ends_with("b.c"));
    }

    #[test]
    fn test_scan_errors_pseudo_query() {
        let (_dir, mut engine) = engine_for(&[("foo.c", FOO_C)]);
        let result = run(&mut engine, QueryKind::ScanErrors, "");
        assert_eq!(result.match_count, 0);

        engine.set_scan_errors(vec![ScanError {
            path: PathBuf::from("/src/blob.c"),
            reason: "not a text file".to_string(),
        }]);
        let result = run(&mut engine, QueryKind::ScanErrors, "");
        assert_eq!(result.match_count, 1);
        assert_eq!(result.matches[0].text, "not a text file");
    }

    #[test]
    fn test_truncated_database_truncates_pattern() {
        let mut config = Config::default();
        config.index.truncate_symbols = true;
        let (_dir, mut engine) = engine_with_config(
            &[("long.c", "int extremely_long_name;\n")],
            config,
        );
        let result = run(&mut engine, QueryKind::Definition, "extremely_long_name");
        assert_eq!(result.match_count, 1);
    }

    #[test]
    fn test_missing_database_reports_io_error() {
        let mut engine = QueryEngine::new(PathBuf::from("/nonexistent/cxref.out"), Config::default());
        let result = engine.query(QueryKind::Symbol, "x", &AtomicBool::new(false));
        assert!(matches!(result, Err(CrossRefError::Io(_))));
    }
}
