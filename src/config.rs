//! Run configuration.
//!
//! This module provides a clean configuration struct for library usage,
//! without any CLI framework dependencies.
//!
//! # Example
//!
//! ```rust
//! use voicepack::config::ConvertConfig;
//! use voicepack::output::OutputFormat;
//!
//! let config = ConvertConfig::new("takeout/Calls", "converted")
//!     .with_format(OutputFormat::Html)
//!     .with_own_number("+19175551111");
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::manager::{DEFAULT_MAX_OPEN_HANDLES, DEFAULT_SPILL_THRESHOLD};
use crate::output::OutputFormat;
use crate::phone::FilterPolicy;

/// File name of the persistent alias store inside the output directory.
pub const ALIAS_FILE_NAME: &str = "aliases.txt";

/// File name of the metadata cache inside the output directory.
pub const CACHE_FILE_NAME: &str = ".voicepack-cache.json";

/// File name of the unknown-identity report inside the output directory.
pub const REPORT_FILE_NAME: &str = "unknown_identities.csv";

/// Default cache entry lifetime in days.
pub const DEFAULT_CACHE_MAX_AGE_DAYS: u32 = 30;

/// Configuration for one conversion run.
///
/// # Example
///
/// ```rust
/// use voicepack::config::ConvertConfig;
///
/// let config = ConvertConfig::new("takeout/Calls", "converted")
///     .with_enhanced_filtering(true)
///     .with_drop_commercial(true);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Directory holding the takeout HTML export files.
    pub input_dir: PathBuf,

    /// Directory receiving per-conversation artifacts, index, and report.
    pub output_dir: PathBuf,

    /// Output rendering format (default: XML)
    pub format: OutputFormat,

    /// The export owner's number, for self-detection beyond the `Me` label.
    pub own_number: Option<String>,

    /// Number filtering strictness (default: standard)
    pub filter_policy: FilterPolicy,

    /// Bound on simultaneously open spill handles (default: 32)
    pub max_open_handles: usize,

    /// Per-conversation buffered messages before spilling (default: 512)
    pub spill_threshold: usize,

    /// Skip re-parsing unchanged files via the metadata cache (default: true)
    pub use_cache: bool,

    /// Cache entries older than this are dropped on open (default: 30 days)
    pub cache_max_age_days: u32,

    /// Delete artifacts of commercially-classified conversations
    /// (default: false, conversations are only tagged in the index)
    pub drop_commercial: bool,

    /// Alias store location; defaults to `aliases.txt` in the output
    /// directory when unset.
    pub alias_file: Option<PathBuf>,
}

impl ConvertConfig {
    /// Creates a configuration with default values for the given
    /// input and output directories.
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            format: OutputFormat::default(),
            own_number: None,
            filter_policy: FilterPolicy::default(),
            max_open_handles: DEFAULT_MAX_OPEN_HANDLES,
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            use_cache: true,
            cache_max_age_days: DEFAULT_CACHE_MAX_AGE_DAYS,
            drop_commercial: false,
            alias_file: None,
        }
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the export owner's phone number.
    #[must_use]
    pub fn with_own_number(mut self, number: impl Into<String>) -> Self {
        self.own_number = Some(number.into());
        self
    }

    /// Enables or disables enhanced number filtering.
    #[must_use]
    pub fn with_enhanced_filtering(mut self, enhanced: bool) -> Self {
        self.filter_policy = if enhanced {
            FilterPolicy::Enhanced
        } else {
            FilterPolicy::Standard
        };
        self
    }

    /// Sets the open-handle bound.
    #[must_use]
    pub fn with_max_open_handles(mut self, max: usize) -> Self {
        self.max_open_handles = max;
        self
    }

    /// Sets the per-conversation spill threshold.
    #[must_use]
    pub fn with_spill_threshold(mut self, threshold: usize) -> Self {
        self.spill_threshold = threshold;
        self
    }

    /// Enables or disables the metadata cache.
    #[must_use]
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    /// Sets the cache entry age limit in days.
    #[must_use]
    pub fn with_cache_max_age_days(mut self, days: u32) -> Self {
        self.cache_max_age_days = days;
        self
    }

    /// Sets whether commercial conversations are deleted after tagging.
    #[must_use]
    pub fn with_drop_commercial(mut self, drop: bool) -> Self {
        self.drop_commercial = drop;
        self
    }

    /// Overrides the alias store location.
    #[must_use]
    pub fn with_alias_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.alias_file = Some(path.into());
        self
    }

    /// Resolved alias store path.
    #[must_use]
    pub fn alias_path(&self) -> PathBuf {
        self.alias_file
            .clone()
            .unwrap_or_else(|| self.output_dir.join(ALIAS_FILE_NAME))
    }

    /// Resolved cache file path.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.output_dir.join(CACHE_FILE_NAME)
    }

    /// Resolved unknown-identity report path.
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(REPORT_FILE_NAME)
    }

    /// Returns the input directory.
    #[must_use]
    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }
}
