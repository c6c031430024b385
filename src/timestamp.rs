//! Timestamp extraction with a safe-fallback policy.
//!
//! Export markup carries timestamps in several places and shapes: a
//! `published`-labeled element, a `dt`-labeled element, or some other
//! datetime-bearing attribute, each holding an ISO-8601 instant with an
//! explicit UTC offset. The same elements sometimes hold duration strings
//! instead (call length), which must never be mistaken for instants.
//!
//! [`TimestampResolver::resolve`] walks the candidates in label priority
//! order and converts the first parseable instant to Unix milliseconds. When
//! nothing parses, it falls back to the source file's modification time
//! clamped to the plausible window, and finally to the current time. The
//! resolver never returns zero or a value outside
//! [`MIN_TIMESTAMP_MS`]..=[`MAX_TIMESTAMP_MS`].

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};

/// 2000-01-01T00:00:00Z; the earliest plausible record timestamp.
pub const MIN_TIMESTAMP_MS: i64 = 946_684_800_000;

/// 2100-01-01T00:00:00Z; the latest plausible record timestamp.
pub const MAX_TIMESTAMP_MS: i64 = 4_102_444_800_000;

/// Where in the markup a timestamp candidate was found.
///
/// Variants are in search-priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CandidateLabel {
    /// A `published`-labeled element.
    Published,
    /// A `dt`-labeled element.
    Dt,
    /// Any other datetime-bearing element.
    Other,
}

/// One raw timestamp candidate pulled from record markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampCandidate {
    label: CandidateLabel,
    value: String,
}

impl TimestampCandidate {
    /// Creates a candidate with an explicit label.
    #[must_use]
    pub fn new(label: CandidateLabel, value: impl Into<String>) -> Self {
        Self {
            label,
            value: value.into(),
        }
    }

    /// Shorthand for a `published`-labeled candidate.
    #[must_use]
    pub fn published(value: impl Into<String>) -> Self {
        Self::new(CandidateLabel::Published, value)
    }

    /// Shorthand for a `dt`-labeled candidate.
    #[must_use]
    pub fn dt(value: impl Into<String>) -> Self {
        Self::new(CandidateLabel::Dt, value)
    }

    /// Shorthand for an unlabeled candidate.
    #[must_use]
    pub fn other(value: impl Into<String>) -> Self {
        Self::new(CandidateLabel::Other, value)
    }

    /// Returns the candidate's label.
    #[must_use]
    pub fn label(&self) -> CandidateLabel {
        self.label
    }

    /// Returns the raw candidate text.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Resolves record timestamps for one source file.
#[derive(Debug, Clone, Default)]
pub struct TimestampResolver {
    source: Option<PathBuf>,
}

impl TimestampResolver {
    /// Creates a resolver with no file-time fallback.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver that falls back to `source`'s modification time.
    #[must_use]
    pub fn for_file(source: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(source.into()),
        }
    }

    /// Resolves a Unix-millisecond timestamp from the candidates.
    ///
    /// Candidates are consulted in label priority order (`Published`, `Dt`,
    /// `Other`), preserving relative order within a label. The first value
    /// that parses as an in-window instant wins. Otherwise the source file's
    /// modification time is used, clamped to the window, and failing that
    /// the current time. Zero and out-of-window values are never returned.
    #[must_use]
    pub fn resolve(&self, candidates: &[TimestampCandidate]) -> i64 {
        for label in [
            CandidateLabel::Published,
            CandidateLabel::Dt,
            CandidateLabel::Other,
        ] {
            for candidate in candidates.iter().filter(|c| c.label == label) {
                if let Some(ms) = parse_instant(&candidate.value) {
                    return ms;
                }
            }
        }
        self.fallback()
    }

    fn fallback(&self) -> i64 {
        self.source
            .as_deref()
            .and_then(file_mtime_ms)
            .map_or_else(now_ms, clamp_to_window)
    }
}

/// Parses an ISO-8601 instant with explicit offset into Unix milliseconds.
///
/// Returns `None` for anything unparseable or outside the plausible window,
/// including duration strings like `(00:01:23)`.
#[must_use]
pub fn parse_instant(value: &str) -> Option<i64> {
    let parsed = DateTime::parse_from_rfc3339(value.trim()).ok()?;
    let ms = parsed.timestamp_millis();
    if (MIN_TIMESTAMP_MS..=MAX_TIMESTAMP_MS).contains(&ms) {
        Some(ms)
    } else {
        None
    }
}

/// Clamps a millisecond value into the plausible window.
#[must_use]
pub fn clamp_to_window(ms: i64) -> i64 {
    ms.clamp(MIN_TIMESTAMP_MS, MAX_TIMESTAMP_MS)
}

/// Returns the current time in Unix milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Reads a file's modification time as Unix milliseconds.
fn file_mtime_ms(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(since_epoch.as_millis()).ok()
}
