//! Unified error types for voicepack.
//!
//! This module provides a single [`VoicepackError`] enum that covers all error
//! cases in the library.
//!
//! # Error Handling Philosophy
//!
//! - **Library users** get typed errors they can match on
//! - **Application users** get clear, actionable error messages
//! - **Expected misses** (no alias, cache miss, invalid number) are expressed
//!   as `Option`/enum returns, never as errors
//!
//! Per-record problems inside an export file (bad timestamp markup, an
//! unparseable participant) are recovered with fallback values by the
//! pipeline and never surface here; this type is for real failures: I/O,
//! malformed persisted state, misuse of a closed stream.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A specialized [`Result`] type for voicepack operations.
pub type Result<T> = std::result::Result<T, VoicepackError>;

/// The error type for all voicepack operations.
///
/// Each variant contains context about what went wrong and, where applicable,
/// the underlying source error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VoicepackError {
    /// An I/O error occurred.
    ///
    /// This typically happens when:
    /// - An export file cannot be read
    /// - An output or spill file cannot be written
    /// - Permission denied
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Failed to parse an input file.
    ///
    /// Contains the format being parsed, a description of the problem,
    /// and optionally the file path.
    #[error("Failed to parse {format} export{}: {message}", path.as_ref().map(|p| format!(" (file: {})", p.display())).unwrap_or_default())]
    Parse {
        /// The format being parsed (e.g., "takeout HTML", "Phones.vcf")
        format: &'static str,
        /// Description of the parse problem
        message: String,
        /// The file path, if available
        path: Option<PathBuf>,
    },

    /// The file doesn't match the expected export structure.
    ///
    /// This occurs when:
    /// - An HTML file carries no recognizable record kind marker
    /// - The alias store file has a malformed line
    /// - A spill file contains a corrupt entry
    #[error("Invalid {format} format: {message}")]
    InvalidFormat {
        /// The format that was expected
        format: &'static str,
        /// Description of what's wrong
        message: String,
    },

    /// JSON parsing/serialization error.
    ///
    /// This can occur when reading or writing the metadata cache or a
    /// conversation spill file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing error.
    ///
    /// This can occur when writing the unknown-identity report.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The output directory could not be created.
    ///
    /// This is one of the few fatal conditions: without an output directory
    /// no conversation stream can be opened.
    #[error("Cannot create output directory {}: {source}", path.display())]
    OutputDir {
        /// The directory that could not be created
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A message was routed to a conversation stream that has already
    /// been finalized.
    #[error("Conversation stream '{key}' is already closed")]
    StreamClosed {
        /// The conversation key of the closed stream
        key: String,
    },
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl VoicepackError {
    /// Creates a parse error for takeout HTML files.
    pub fn html_parse(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        VoicepackError::Parse {
            format: "takeout HTML",
            message: message.into(),
            path,
        }
    }

    /// Creates a parse error for contact card files.
    pub fn vcf_parse(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        VoicepackError::Parse {
            format: "Phones.vcf",
            message: message.into(),
            path,
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(format: &'static str, message: impl Into<String>) -> Self {
        VoicepackError::InvalidFormat {
            format,
            message: message.into(),
        }
    }

    /// Creates an output-directory error.
    pub fn output_dir(path: impl Into<PathBuf>, source: io::Error) -> Self {
        VoicepackError::OutputDir {
            path: path.into(),
            source,
        }
    }

    /// Creates a closed-stream error.
    pub fn stream_closed(key: impl Into<String>) -> Self {
        VoicepackError::StreamClosed { key: key.into() }
    }

    /// Returns `true` if this is an IO error.
    pub fn is_io(&self) -> bool {
        matches!(self, VoicepackError::Io(_))
    }

    /// Returns `true` if this is a parse error.
    pub fn is_parse(&self) -> bool {
        matches!(self, VoicepackError::Parse { .. })
    }

    /// Returns `true` if this is an invalid format error.
    pub fn is_invalid_format(&self) -> bool {
        matches!(self, VoicepackError::InvalidFormat { .. })
    }

    /// Returns `true` if this error is fatal for the whole run.
    ///
    /// Everything else is recoverable: the offending file is skipped and
    /// the run continues.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VoicepackError::OutputDir { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
