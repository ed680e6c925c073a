// CLI command implementations

pub mod build;
pub mod query;
pub mod stats;
