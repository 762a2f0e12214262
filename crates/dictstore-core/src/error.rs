//! Error types for DictStore
//!
//! Store construction and lookups are total and never fail. Errors only
//! surface from the configuration layer: reading a properties file and
//! validating an explicitly built `Config`.

use std::path::PathBuf;

use thiserror::Error;

/// DictStore error types with detailed context
#[derive(Debug, Error)]
pub enum DictError {
    /// Reading a configuration source failed
    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        /// The file being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A configuration parameter is out of range
    #[error("invalid configuration for `{key}`: {reason}")]
    InvalidConfig {
        /// Property key the value belongs to
        key: &'static str,
        /// Human-readable description
        reason: String,
    },
}

/// Result type alias for DictStore operations
pub type DictResult<T> = Result<T, DictError>;
