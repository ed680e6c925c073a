use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;

mod cli;
mod config;
mod db;
mod error;
mod query;
mod scanner;
mod session;
mod xref;

#[derive(Parser)]
#[command(name = "cxref")]
#[command(version = "0.1.0")]
#[command(about = "Interactive C source cross-reference engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or incrementally update the cross-reference database
    Build {
        /// Project directory to index
        #[arg(default_value = ".")]
        project: String,

        /// Discard the old database and rebuild from scratch
        #[arg(short, long)]
        rebuild: bool,
    },

    /// Query the cross-reference database
    Query {
        /// Query type: symbol, definition, called-by, calling, text,
        /// regex, file, including, functions, errors
        query_type: String,

        /// Pattern to search for (omitted for functions/errors)
        pattern: Option<String>,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Output format: json, text
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show database statistics
    Stats {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

fn init_logging(debug: bool, verbose: bool) {
    let level = if debug {
        Level::DEBUG
    } else if verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.debug, cli.verbose);

    match cli.command {
        Commands::Build { project, rebuild } => {
            cli::build::build_database(project, rebuild)?;
        }

        Commands::Query {
            query_type,
            pattern,
            project,
            format,
        } => {
            cli::query::run_query(query_type, pattern, project, format)?;
        }

        Commands::Stats { project, verbose } => {
            cli::stats::show_stats(project, verbose)?;
        }
    }

    Ok(())
}
