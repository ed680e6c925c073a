use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use walkdir::WalkDir;

use crate::config::Config;
use crate::db::builder::{ProgressSink, SourceFile};
use crate::session::CrossRef;

struct BarSink(ProgressBar);

impl ProgressSink for BarSink {
    fn file_started(&self, done: usize, _total: usize, path: &Path) {
        self.0.set_position(done as u64);
        if let Some(name) = path.file_name() {
            self.0.set_message(name.to_string_lossy().into_owned());
        }
    }
}

pub fn build_database(project: String, rebuild: bool) -> Result<()> {
    let config = Config::from_project_dir(&project);
    let db_path = PathBuf::from(&project).join("cxref.out");

    if rebuild && db_path.exists() {
        // discarding the old database forces a full scan
        std::fs::remove_file(&db_path)?;
    }

    let files = enumerate_sources(Path::new(&project), &config)?;
    println!("Indexing {} source files in {}", files.len(), project);

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "[{bar:40}] {pos}/{len} {msg}",
    )?);

    let mut session = CrossRef::new(db_path, config);
    let cancel = AtomicBool::new(false);
    let stats = session.build(&files, &BarSink(bar.clone()), &cancel)?;
    bar.finish_and_clear();

    println!(
        "Done: {} scanned, {} unchanged, {} skipped ({} lines, {} symbols)",
        stats.files_indexed, stats.files_copied, stats.files_skipped, stats.lines, stats.symbols
    );
    if stats.full_rebuild {
        println!("Full rebuild (no usable previous database)");
    }
    for err in &stats.scan_errors {
        eprintln!("warning: {}: {}", err.path.display(), err.reason);
    }

    Ok(())
}

/// Walk the project tree collecting source files in the strict path order
/// the builder requires. Ignored directories are pruned, not descended.
pub fn enumerate_sources(root: &Path, config: &Config) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        !(entry.file_type().is_dir()
            && config.is_ignored_dir(&entry.file_name().to_string_lossy()))
    });
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if !config.is_source_file(&entry.file_name().to_string_lossy()) {
            continue;
        }
        files.push(SourceFile::from_path(entry.into_path())?);
    }
    files.sort_by(|a, b| a.path.as_os_str().cmp(b.path.as_os_str()));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_enumerate_sources_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("zed.c"), "int z;\n").unwrap();
        std::fs::write(dir.path().join("sub/alpha.h"), "int a;\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not source\n").unwrap();
        std::fs::write(dir.path().join(".git/hook.c"), "int hidden;\n").unwrap();

        let files = enumerate_sources(dir.path(), &Config::default()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| f.path.strip_prefix(dir.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["sub/alpha.h", "zed.c"]);
    }
}
