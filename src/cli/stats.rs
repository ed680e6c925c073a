use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::session::CrossRef;

pub fn show_stats(project: String, verbose: bool) -> Result<()> {
    let config = Config::from_project_dir(&project);
    let db_path = PathBuf::from(&project).join("cxref.out");

    let session = CrossRef::new(db_path, config);
    let stats = session.cache_stats()?;

    println!("Cross-reference statistics for {}", project);
    println!("  Files: {}", stats.files);
    println!("  Lines with symbols: {}", stats.lines);
    println!("  Plain references: {}", stats.plain_refs);
    println!("  Database size: {:.2} MB", db_size_mb(session.db_path())?);

    if verbose {
        println!("  Symbols by kind:");
        for (kind, count) in &stats.by_mark {
            println!("    {}: {}", kind, count);
        }
    }

    Ok(())
}

fn db_size_mb(db_path: &Path) -> Result<f64> {
    let metadata = std::fs::metadata(db_path)?;
    Ok(metadata.len() as f64 / (1024.0 * 1024.0))
}
