// Session facade: one database, one operation at a time
//
// Builds and queries never overlap by construction; a second caller gets a
// Busy error immediately rather than waiting.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Config;
use crate::db::builder::{self, BuildStats, ProgressSink, SourceFile};
use crate::error::CrossRefError;
use crate::query::{CacheStats, QueryEngine, QueryKind, SearchResultSet};

pub struct CrossRef {
    config: Config,
    engine: QueryEngine,
    busy: AtomicBool,
}

/// Clears the busy flag on every exit path, including errors.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, CrossRefError> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .map_err(|_| CrossRefError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl CrossRef {
    pub fn new(db_path: PathBuf, config: Config) -> Self {
        Self {
            engine: QueryEngine::new(db_path, config.clone()),
            config,
            busy: AtomicBool::new(false),
        }
    }

    pub fn db_path(&self) -> &Path {
        self.engine.db_path()
    }

    /// Rebuild the database from the sorted source list. The engine keeps the
    /// build's skip list for the scan-errors pseudo-query.
    pub fn build(
        &mut self,
        files: &[SourceFile],
        progress: &dyn ProgressSink,
        cancel: &AtomicBool,
    ) -> Result<BuildStats, CrossRefError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        let stats = builder::build(self.engine.db_path(), files, &self.config, progress, cancel)?;
        self.engine.set_scan_errors(stats.scan_errors.clone());
        Ok(stats)
    }

    pub fn query(
        &mut self,
        kind: QueryKind,
        pattern: &str,
        cancel: &AtomicBool,
    ) -> Result<SearchResultSet, CrossRefError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        self.engine.query(kind, pattern, cancel)
    }

    pub fn cache_stats(&self) -> Result<CacheStats, CrossRefError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        self.engine.cache_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::builder::NoopProgress;
    use crate::query::QueryStatus;
    use tempfile::TempDir;

    #[test]
    fn test_busy_guard_rejects_overlap() {
        let flag = AtomicBool::new(false);
        let guard = BusyGuard::acquire(&flag).unwrap();
        assert!(matches!(
            BusyGuard::acquire(&flag),
            Err(CrossRefError::Busy)
        ));
        drop(guard);
        assert!(BusyGuard::acquire(&flag).is_ok());
    }

    #[test]
    fn test_busy_guard_releases_on_error_path() {
        let dir = TempDir::new().unwrap();
        let mut session = CrossRef::new(dir.path().join("cxref.out"), Config::default());
        // no database yet: the query fails but must release the flag
        let cancel = AtomicBool::new(false);
        assert!(session.query(QueryKind::Symbol, "x", &cancel).is_err());
        assert!(!session.busy.load(Ordering::Relaxed));
    }

    #[test]
    fn test_build_then_query() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("foo.c");
        std::fs::write(&src, "int add(int a, int b) { return a+b; }\n").unwrap();
        let files = vec![SourceFile::from_path(src).unwrap()];

        let mut session = CrossRef::new(dir.path().join("cxref.out"), Config::default());
        let cancel = AtomicBool::new(false);
        let stats = session.build(&files, &NoopProgress, &cancel).unwrap();
        assert_eq!(stats.files_indexed, 1);

        let result = session
            .query(QueryKind::Definition, "add", &cancel)
            .unwrap();
        assert_eq!(result.status, QueryStatus::Completed);
        assert_eq!(result.match_count, 1);
    }

    #[test]
    fn test_rebuild_resets_smart_query() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("foo.c");
        std::fs::write(&src, "int add(int a, int b) { return a+b; }\n").unwrap();
        let files = vec![SourceFile::from_path(src).unwrap()];

        let mut session = CrossRef::new(dir.path().join("cxref.out"), Config::default());
        let cancel = AtomicBool::new(false);
        session.build(&files, &NoopProgress, &cancel).unwrap();
        session.query(QueryKind::Definition, "add", &cancel).unwrap();

        // after a rebuild the same query scans again
        session.build(&files, &NoopProgress, &cancel).unwrap();
        let result = session
            .query(QueryKind::Definition, "add", &cancel)
            .unwrap();
        assert_eq!(result.status, QueryStatus::Completed);
        assert_eq!(result.match_count, 1);
    }
}
