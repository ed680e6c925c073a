// Database builder: full and incremental rebuilds
//
// The new database is always written to `<db>.new` and renamed over the old
// one only on full success, so a write failure or cancellation can never
// clobber a valid database.

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use super::{DbHeader, FORMAT_VERSION};
use crate::config::Config;
use crate::error::CrossRefError;
use crate::scanner::looks_binary;
use crate::xref::{write_file_block, XrefOptions};

/// One candidate source file, as supplied by the enumeration collaborator.
/// The list handed to `build` must be in strict lexicographic path order.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub mtime: SystemTime,
    pub size: u64,
}

impl SourceFile {
    pub fn from_path(path: PathBuf) -> std::io::Result<Self> {
        let meta = fs::metadata(&path)?;
        Ok(Self {
            mtime: meta.modified()?,
            size: meta.len(),
            path,
        })
    }
}

/// Progress callbacks at file granularity, for a host UI.
pub trait ProgressSink {
    fn file_started(&self, _done: usize, _total: usize, _path: &Path) {}
}

/// Sink that ignores all progress.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {}

/// A source file that could not be indexed. Non-fatal; surfaced through the
/// scan-errors pseudo-query.
#[derive(Debug, Clone)]
pub struct ScanError {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct BuildStats {
    pub files_indexed: usize,
    pub files_copied: usize,
    pub files_skipped: usize,
    pub lines: usize,
    pub symbols: usize,
    /// False when unchanged File Blocks were spliced from the old database.
    pub full_rebuild: bool,
    pub scan_errors: Vec<ScanError>,
}

/// Offset Hash Index: path of a previously-indexed file to the byte range of
/// its File Block in the old database. Built once per incremental rebuild and
/// discarded afterwards.
struct OldDatabase {
    data: Vec<u8>,
    blocks: HashMap<String, (usize, usize)>,
    mtime: SystemTime,
}

/// Build a new database at `db_path` from the sorted source list.
///
/// Reuses unchanged File Blocks from an existing database at the same path;
/// a missing, corrupt, version-mismatched, or differently-configured old
/// database degrades to a full rebuild. The cancellation flag is checked once
/// per file.
pub fn build(
    db_path: &Path,
    files: &[SourceFile],
    config: &Config,
    progress: &dyn ProgressSink,
    cancel: &AtomicBool,
) -> Result<BuildStats, CrossRefError> {
    for pair in files.windows(2) {
        if pair[0].path.as_os_str() >= pair[1].path.as_os_str() {
            return Err(CrossRefError::UnsortedFileList(
                pair[1].path.clone(),
                pair[0].path.clone(),
            ));
        }
    }

    let opts = XrefOptions {
        compress: config.index.compress,
        truncate: config.index.truncate_symbols,
    };
    let old = load_old_database(db_path, &opts);
    let tmp_path = PathBuf::from(format!("{}.new", db_path.display()));

    let result = write_new_database(&tmp_path, files, &opts, old.as_ref(), progress, cancel);
    match result {
        Ok(mut stats) => {
            fs::rename(&tmp_path, db_path)?;
            stats.full_rebuild = old.is_none();
            info!(
                "database built: {} scanned, {} copied, {} skipped",
                stats.files_indexed, stats.files_copied, stats.files_skipped
            );
            Ok(stats)
        }
        Err(err) => {
            let _ = fs::remove_file(&tmp_path);
            Err(err)
        }
    }
}

fn write_new_database(
    tmp_path: &Path,
    files: &[SourceFile],
    opts: &XrefOptions,
    old: Option<&OldDatabase>,
    progress: &dyn ProgressSink,
    cancel: &AtomicBool,
) -> Result<BuildStats, CrossRefError> {
    let cur_dir = std::env::current_dir()
        .map(|d| d.display().to_string())
        .unwrap_or_else(|_| ".".to_string());
    let header = DbHeader::new(cur_dir, !opts.compress, opts.truncate);

    let file = fs::File::create(tmp_path)?;
    let mut out = BufWriter::new(file);
    writeln!(out, "{}", header.encode())?;

    let mut stats = BuildStats::default();
    for (done, source) in files.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return Err(CrossRefError::Cancelled);
        }
        progress.file_started(done, files.len(), &source.path);

        let path_str = source.path.to_string_lossy().into_owned();
        if let Some(old) = old {
            if let Some(&(start, end)) = old.blocks.get(&path_str) {
                if source.mtime <= old.mtime {
                    debug!(size = source.size, "copying unchanged block: {}", path_str);
                    out.write_all(&old.data[start..end])?;
                    stats.files_copied += 1;
                    continue;
                }
            }
        }

        let bytes = match fs::read(&source.path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("cannot read {}: {}", path_str, err);
                stats.scan_errors.push(ScanError {
                    path: source.path.clone(),
                    reason: err.to_string(),
                });
                stats.files_skipped += 1;
                continue;
            }
        };
        if looks_binary(&bytes) {
            warn!("skipping binary file: {}", path_str);
            stats.scan_errors.push(ScanError {
                path: source.path.clone(),
                reason: "not a text file".to_string(),
            });
            stats.files_skipped += 1;
            continue;
        }

        let content = to_ascii(bytes);
        let file_stats = write_file_block(&mut out, &path_str, &content, opts)?;
        stats.files_indexed += 1;
        stats.lines += file_stats.lines;
        stats.symbols += file_stats.symbols;
    }

    out.write_all(b"\t@\n")?;
    out.flush()?;
    Ok(stats)
}

/// Only the leading bytes were sniffed; later non-ASCII bytes are replaced
/// so byte offsets stay stable during scanning.
fn to_ascii(bytes: Vec<u8>) -> String {
    if bytes.is_ascii() {
        // checked just above, cannot fail
        String::from_utf8(bytes).unwrap_or_default()
    } else {
        bytes
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { '?' })
            .collect()
    }
}

/// Load the previous database and build the Offset Hash Index over its File
/// Blocks. Any problem (absent file, bad header, other version, different
/// compression/truncation flags) returns None, degrading to a full rebuild.
fn load_old_database(db_path: &Path, opts: &XrefOptions) -> Option<OldDatabase> {
    let meta = fs::metadata(db_path).ok()?;
    let mtime = meta.modified().ok()?;
    let data = fs::read(db_path).ok()?;

    let header_end = data.iter().position(|&b| b == b'\n')?;
    let header = match DbHeader::parse(&String::from_utf8_lossy(&data[..header_end])) {
        Ok(header) => header,
        Err(err) => {
            warn!("old database unusable, forcing full rebuild: {}", err);
            return None;
        }
    };
    if header.version != FORMAT_VERSION
        || header.compress_disabled != !opts.compress
        || header.truncate != opts.truncate
    {
        info!("old database options differ, forcing full rebuild");
        return None;
    }

    let mut blocks = HashMap::new();
    let mut open_block: Option<(String, usize)> = None;
    let mut offset = header_end + 1;
    while offset < data.len() {
        let line_end = data[offset..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| offset + i)
            .unwrap_or(data.len());
        let line = &data[offset..line_end];
        if let Some(path) = line.strip_prefix(b"\t@") {
            if let Some((prev_path, start)) = open_block.take() {
                blocks.insert(prev_path, (start, offset));
            }
            if path.is_empty() {
                break; // sentinel
            }
            open_block = Some((String::from_utf8_lossy(path).into_owned(), offset));
        }
        offset = line_end + 1;
    }
    // a database without a sentinel is truncated; only complete blocks are
    // reused, so an unclosed trailing block is simply dropped

    debug!("offset index holds {} old file blocks", blocks.len());
    Some(OldDatabase {
        data,
        blocks,
        mtime,
    })
}
