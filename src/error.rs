//! Error types for the bootflash CLI

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the CLI commands
#[derive(Debug, Error)]
pub enum CliError {
    /// Failed to read or write a file
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Flash operation failed
    #[error(transparent)]
    Flash(#[from] bootflash_core::Error),

    /// Input does not fit into the device
    #[error("{what} of {len} bytes at 0x{address:08X} does not fit into the {size} byte device")]
    TooLarge {
        what: &'static str,
        len: usize,
        address: u32,
        size: u32,
    },

    /// Invalid device options
    #[error("Invalid device configuration: {0}")]
    InvalidConfig(String),
}

impl CliError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for CLI commands
pub type Result<T> = std::result::Result<T, CliError>;
