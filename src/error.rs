//! Error taxonomy shared by every pass
//!
//! Configuration problems surface synchronously from the builder calls,
//! streaming problems terminate the current `process_*` call chain.
//! Unparseable numbers are not errors: they are counted as missing.

use thiserror::Error;

/// Errors raised by pipeline stages and their building blocks
#[derive(Error, Debug)]
pub enum PassError {
    /// Bad rule pattern, missing successor, or a rule added mid-stream
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A statistical primitive failed to converge or got an out-of-domain argument
    #[error("numeric error: {0}")]
    Numeric(String),

    /// Row width disagrees with the header, or joined sources disagree on shape
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Token carries a byte the arena reserves for its own delimiters
    #[error("token in column {column} contains reserved byte 0x{byte:02x}")]
    ReservedByte { byte: u8, column: usize },

    /// Token handed to a queue carries the queue's terminator
    #[error("queued token contains a NUL byte at offset {offset}")]
    QueuedTerminator { offset: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PassError {
    /// Build a configuration error for a pattern that failed to compile
    pub fn bad_pattern(pattern: &str, err: &regex::Error) -> Self {
        PassError::Configuration(format!("invalid pattern {:?}: {}", pattern, err))
    }

    /// Build the error for a stage that has no successor yet
    pub fn no_successor(stage: &str) -> Self {
        PassError::Configuration(format!("{} has no downstream pass configured", stage))
    }

    /// Build the error for a rule added while a stream is in flight
    pub fn locked(stage: &str) -> Self {
        PassError::Configuration(format!(
            "{} rules cannot change after streaming has started",
            stage
        ))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, PassError::Configuration(_))
    }

    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, PassError::SchemaMismatch(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, PassError::Numeric(_))
    }
}

/// Result type for pass operations
pub type Result<T> = std::result::Result<T, PassError>;
