// Configuration management for cxref

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub query: QueryConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Compress the database with keyword and digraph encoding.
    pub compress: bool,
    /// Truncate stored symbols to eight characters.
    pub truncate_symbols: bool,
    /// File suffixes treated as source files during enumeration.
    pub source_suffixes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub case_insensitive: bool,
    /// Repeating the immediately preceding query returns a "no search
    /// performed" result instead of rescanning the database.
    pub smart: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory names skipped during enumeration.
    pub ignored_dirs: Vec<String>,
    /// Extra directories searched when resolving include targets.
    pub include_path: Vec<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            compress: true,
            truncate_symbols: false,
            source_suffixes: vec![
                ".c".to_string(),
                ".h".to_string(),
                ".y".to_string(),
                ".l".to_string(),
            ],
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            case_insensitive: false,
            smart: true,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            ignored_dirs: vec![".git".to_string()],
            include_path: vec![],
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    /// Looks for .cxref.toml in the project root
    pub fn from_project_dir<P: AsRef<Path>>(project_dir: P) -> Self {
        let config_path = project_dir.as_ref().join(".cxref.toml");

        match Self::from_file(&config_path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", config_path.display());
                config
            }
            Err(e) => {
                tracing::debug!("Could not load config from {}: {}", config_path.display(), e);
                tracing::info!("Using default configuration");
                Self::default()
            }
        }
    }

    /// Whether a file name carries one of the configured source suffixes
    pub fn is_source_file(&self, name: &str) -> bool {
        self.index
            .source_suffixes
            .iter()
            .any(|suffix| name.ends_with(suffix.as_str()))
    }

    /// Whether a directory name is excluded from enumeration
    pub fn is_ignored_dir(&self, name: &str) -> bool {
        self.paths.ignored_dirs.iter().any(|d| d == name)
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.index.source_suffixes.is_empty() {
            return Err(anyhow::anyhow!("At least one source suffix is required"));
        }
        for suffix in &self.index.source_suffixes {
            if !suffix.starts_with('.') || suffix.len() < 2 {
                return Err(anyhow::anyhow!("Invalid source suffix: {:?}", suffix));
            }
        }
        for dir in &self.paths.include_path {
            if dir.as_os_str().is_empty() {
                return Err(anyhow::anyhow!("Include path entries cannot be empty"));
            }
        }
        Ok(())
    }
}
