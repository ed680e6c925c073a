use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use crate::config::Config;
use crate::query::{QueryKind, QueryStatus};
use crate::session::CrossRef;

pub fn run_query(
    query_type: String,
    pattern: Option<String>,
    project: String,
    format: String,
) -> Result<()> {
    let kind = match parse_kind(&query_type) {
        Some(kind) => kind,
        None => {
            eprintln!("Unknown query type: {}", query_type);
            eprintln!(
                "Expected one of: symbol, definition, called-by, calling, \
                 text, regex, file, including, functions, errors"
            );
            std::process::exit(1);
        }
    };
    let pattern = pattern.unwrap_or_default();

    let config = Config::from_project_dir(&project);
    let db_path = PathBuf::from(&project).join("cxref.out");
    let mut session = CrossRef::new(db_path, config);
    let cancel = AtomicBool::new(false);
    let results = session.query(kind, &pattern, &cancel)?;

    if results.status == QueryStatus::Cancelled {
        eprintln!("Search cancelled; results are partial");
    }
    if results.matches.is_empty() {
        println!("No results for {} '{}'", kind.describe(), pattern);
        return Ok(());
    }

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&results.matches)?);
        }
        "text" => {
            println!("Found {} results:", results.match_count);
            for m in &results.matches {
                println!("  {}:{} {} {}", m.file, m.line, m.function, m.text);
            }
        }
        _ => {
            eprintln!("Unknown format: {}", format);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn parse_kind(name: &str) -> Option<QueryKind> {
    Some(match name {
        "symbol" | "references" => QueryKind::Symbol,
        "definition" | "def" => QueryKind::Definition,
        "called-by" | "callees" => QueryKind::CalledBy,
        "calling" | "callers" => QueryKind::Calling,
        "text" => QueryKind::Text,
        "regex" | "egrep" => QueryKind::Regex,
        "file" => QueryKind::File,
        "including" | "includers" => QueryKind::Including,
        "functions" => QueryKind::AllFunctions,
        "errors" => QueryKind::ScanErrors,
        _ => return None,
    })
}
