//! Command-line interface definition using clap.
//!
//! This module defines:
//! - [`Args`] - CLI argument structure (for use with clap)
//! - [`OutputFormat`] - Output format options
//!
//! # Using OutputFormat in Libraries
//!
//! The CLI format enum converts into the library-side
//! [`output::OutputFormat`](crate::output::OutputFormat), so `clap` stays a
//! binary-only dependency:
//!
//! ```rust
//! use voicepack::cli;
//! use voicepack::output;
//!
//! let format: output::OutputFormat = cli::OutputFormat::Html.into();
//! assert_eq!(format.extension(), "html");
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_CACHE_MAX_AGE_DAYS;
use crate::manager::{DEFAULT_MAX_OPEN_HANDLES, DEFAULT_SPILL_THRESHOLD};

/// Convert Google Voice takeout exports into per-conversation
/// SMS-backup XML or HTML archives.
#[derive(Parser, Debug, Clone)]
#[command(name = "voicepack")]
#[command(version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    voicepack ./Takeout/Voice
    voicepack ./Takeout/Voice -o archive --format html
    voicepack ./Voice --own-number \"+12125550000\" --drop-commercial
    voicepack ./Voice --enhanced-filtering --no-cache")]
pub struct Args {
    /// Path to the takeout export directory (the one holding the per-message
    /// HTML files and Phones.vcf)
    pub input: PathBuf,

    /// Output directory for converted conversations
    #[arg(short, long, default_value = "converted")]
    pub output: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "xml")]
    pub format: OutputFormat,

    /// Your own phone number, for exports that tag your messages with a
    /// number instead of "Me"
    #[arg(long, value_name = "NUMBER")]
    pub own_number: Option<String>,

    /// Also reject short codes, toll-free, premium-rate, and fictitious
    /// numbers
    #[arg(long)]
    pub enhanced_filtering: bool,

    /// Maximum simultaneously open spill file handles
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_OPEN_HANDLES)]
    pub max_handles: usize,

    /// Buffered messages per conversation before spilling to disk
    #[arg(long, value_name = "N", default_value_t = DEFAULT_SPILL_THRESHOLD)]
    pub spill_threshold: usize,

    /// Re-parse every file instead of consulting the metadata cache
    #[arg(long)]
    pub no_cache: bool,

    /// Drop cache entries older than this many days
    #[arg(long, value_name = "DAYS", default_value_t = DEFAULT_CACHE_MAX_AGE_DAYS)]
    pub cache_max_age: u32,

    /// Delete commercial conversations instead of tagging them in the index
    #[arg(long)]
    pub drop_commercial: bool,

    /// Alias store location (default: aliases.txt in the output directory)
    #[arg(long, value_name = "FILE")]
    pub alias_file: Option<PathBuf>,
}

/// Output format options.
///
/// Different formats serve different purposes:
/// - [`Xml`](OutputFormat::Xml) - SMS-backup-schema XML, restorable by
///   backup tools
/// - [`Html`](OutputFormat::Html) - Readable tables, one page per
///   conversation
///
/// # Example
///
/// ```rust
/// use voicepack::cli::OutputFormat;
///
/// let format = OutputFormat::Html;
/// println!("Extension: {}", format.extension()); // "html"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// SMS-backup-schema XML (default)
    #[default]
    #[value(alias = "sms")]
    Xml,

    /// Readable HTML tables
    #[value(alias = "table")]
    Html,
}

impl OutputFormat {
    /// Returns the file extension for this format (without dot).
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Xml => "xml",
            OutputFormat::Html => "html",
        }
    }

    /// Returns all supported format names (including aliases).
    pub fn all_names() -> &'static [&'static str] {
        &["xml", "sms", "html", "table"]
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
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xml" | "sms" => Ok(OutputFormat::Xml),
            "html" | "table" => Ok(OutputFormat::Html),
            _ => Err(format!(
                "Unknown format: '{}'. Expected one of: {}",
                s,
                OutputFormat::all_names().join(", ")
            )),
        }
    }
}

// Conversion to library format type
impl From<OutputFormat> for crate::output::OutputFormat {
    fn from(format: OutputFormat) -> crate::output::OutputFormat {
        match format {
            OutputFormat::Xml => crate::output::OutputFormat::Xml,
            OutputFormat::Html => crate::output::OutputFormat::Html,
        }
    }
}
