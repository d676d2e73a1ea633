//! Configuration module for govcrawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use govcrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("govcrawl.toml")).unwrap();
//! println!("Crawling nature of suit: {}", config.search.nature_of_suit);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CheckpointConfig, Config, DocumentKind, FetchConfig, GovernorConfig, OutputConfig,
    RetryConfig, SchedulerConfig, SearchConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{parse_date, ALLOWED_PAGE_SIZES};

#[cfg(test)]
pub(crate) use parser::SAMPLE_CONFIG;
