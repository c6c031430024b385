//! Per-conversation output rendering.
//!
//! Two formats are supported:
//! - [`xml`] - SMS-backup-schema XML, one element per record, suitable for
//!   restore tools
//! - [`html`] - human-readable tables, one page per conversation, plus the
//!   run-wide `index.html`
//!
//! The format types here are library-first and carry no CLI dependencies;
//! the binary maps its own `clap` value enum onto [`OutputFormat`].
//!
//! # Example
//!
//! ```
//! use std::str::FromStr;
//! use voicepack::output::OutputFormat;
//!
//! let format = OutputFormat::from_str("html").unwrap();
//! assert_eq!(format, OutputFormat::Html);
//! assert_eq!(format.extension(), "html");
//! ```

pub mod html;
pub mod xml;

use serde::{Deserialize, Serialize};

use crate::error::VoicepackError;

/// Output format for converted conversations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// SMS-backup-schema XML (default).
    #[default]
    Xml,
    /// Readable HTML tables.
    Html,
}

impl OutputFormat {
    /// Returns the file extension for this format (without dot).
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Xml => "xml",
            OutputFormat::Html => "html",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Xml => write!(f, "XML"),
            OutputFormat::Html => write!(f, "HTML"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = VoicepackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xml" | "sms" => Ok(OutputFormat::Xml),
            "html" | "table" => Ok(OutputFormat::Html),
            other => Err(VoicepackError::invalid_format(
                "output",
                format!("expected xml or html, got '{other}'"),
            )),
        }
    }
}

/// One finalized conversation's entry in the summary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Conversation key.
    pub key: String,
    /// Output file name (relative to the output directory).
    pub file_name: String,
    /// Number of records written.
    pub message_count: usize,
    /// Set when the commercial classifier flagged the conversation.
    pub commercial: bool,
}

/// Global record totals aggregated at finalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionStats {
    /// Plain text messages.
    pub sms: usize,
    /// Multimedia and group messages.
    pub mms: usize,
    /// Call log entries.
    pub calls: usize,
    /// Voicemails.
    pub voicemails: usize,
    /// Image attachments.
    pub images: usize,
    /// Contact card attachments.
    pub vcards: usize,
}

impl ConversionStats {
    /// Total records across all kinds.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.sms + self.mms + self.calls + self.voicemails
    }

    /// Merges another stats block into this one.
    pub fn merge(&mut self, other: &ConversionStats) {
        self.sms += other.sms;
        self.mms += other.mms;
        self.calls += other.calls;
        self.voicemails += other.voicemails;
        self.images += other.images;
        self.vcards += other.vcards;
    }
}
