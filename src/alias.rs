//! Persistent identity-to-alias mapping.
//!
//! [`AliasStore`] maps phone identities to human-readable display names used
//! in conversation keys and output file names. Additions land in memory
//! immediately and reach disk in batches: every
//! [`FLUSH_INTERVAL`] mutations, and once more on the final explicit flush.
//! A crash therefore loses at most one unflushed batch.
//!
//! The on-disk form is line-oriented: `identity|alias` with an optional
//! third `|spam` column for identities flagged by the commercial classifier,
//! and `#`-prefixed comment lines.
//!
//! # Example
//!
//! ```
//! use voicepack::alias::AliasStore;
//! use voicepack::phone::PhoneIdentity;
//!
//! let store = AliasStore::in_memory();
//! let id = PhoneIdentity::Number("+12125551234".to_string());
//!
//! store.add_alias(&id, "Susan Tang");
//! assert_eq!(store.get_alias(&id, None), "Susan_Tang");
//!
//! // A stored alias always beats a context hint.
//! assert_eq!(store.get_alias(&id, Some("Other Person")), "Susan_Tang");
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::phone::PhoneIdentity;

/// Number of mutations between automatic disk flushes.
pub const FLUSH_INTERVAL: usize = 50;

/// Marker stored in the third column for classifier-flagged identities.
const FILTER_MARKER: &str = "spam";

/// Boilerplate phrases that must never be mistaken for a contact name.
const BOILERPLATE_PHRASES: [&str; 7] = [
    "me",
    "placed call to",
    "received call from",
    "missed call from",
    "voicemail from",
    "group conversation",
    "transcript",
];

/// Prefixes stripped from context hints before name extraction.
const BOILERPLATE_PREFIXES: [&str; 5] = [
    "placed call to ",
    "received call from ",
    "missed call from ",
    "voicemail from ",
    "transcript: ",
];

#[derive(Debug, Default)]
struct Inner {
    aliases: HashMap<String, String>,
    filtered: HashSet<String>,
    unflushed: usize,
    flush_failures: usize,
}

/// Thread-safe alias store with batched persistence.
///
/// All mutating operations serialize behind an internal lock, so a single
/// store can be shared by reference across worker threads.
#[derive(Debug)]
pub struct AliasStore {
    path: Option<PathBuf>,
    inner: Mutex<Inner>,
}

impl AliasStore {
    /// Opens a store backed by `path`, loading any existing alias file.
    ///
    /// A missing file yields an empty store. Malformed lines and comments
    /// are skipped during load.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut inner = Inner::default();

        match fs::read_to_string(&path) {
            Ok(contents) => {
                for line in contents.lines() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    let mut parts = line.splitn(3, '|');
                    let (Some(identity), Some(alias)) = (parts.next(), parts.next()) else {
                        continue;
                    };
                    if identity.is_empty() || alias.is_empty() {
                        continue;
                    }
                    inner
                        .aliases
                        .insert(identity.to_string(), alias.to_string());
                    if parts.next() == Some(FILTER_MARKER) {
                        inner.filtered.insert(identity.to_string());
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path: Some(path),
            inner: Mutex::new(inner),
        })
    }

    /// Creates a store that never touches disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores an alias for an identity, sanitized for filename use.
    ///
    /// Last writer wins. Empty names (after sanitization) are ignored.
    pub fn add_alias(&self, identity: &PhoneIdentity, name: &str) {
        let sanitized = sanitize_alias(name);
        if sanitized.is_empty() {
            return;
        }

        let mut inner = self.lock();
        inner
            .aliases
            .insert(identity.as_str().to_string(), sanitized);
        self.touch(&mut inner);
    }

    /// Resolves a display alias for an identity.
    ///
    /// Priority: stored alias, then a human name extracted from the context
    /// hint (boilerplate phrases rejected), then the sanitized identity
    /// itself. Hint-derived names are not stored; only [`add_alias`]
    /// registers durable aliases.
    ///
    /// [`add_alias`]: AliasStore::add_alias
    #[must_use]
    pub fn get_alias(&self, identity: &PhoneIdentity, hint: Option<&str>) -> String {
        if let Some(stored) = self.lock().aliases.get(identity.as_str()) {
            return stored.clone();
        }

        if let Some(name) = hint.and_then(extract_hint_name) {
            return name;
        }

        sanitize_alias(identity.as_str())
    }

    /// Returns `true` if the identity has a stored alias.
    #[must_use]
    pub fn has_alias(&self, identity: &PhoneIdentity) -> bool {
        self.lock().aliases.contains_key(identity.as_str())
    }

    /// Flags an identity as commercially filtered.
    ///
    /// The flag persists as the third column of the alias line and feeds
    /// the `is_spam` column of the unknown-identity report.
    pub fn mark_filtered(&self, identity: &PhoneIdentity) {
        let mut inner = self.lock();
        let key = identity.as_str().to_string();
        // A marker needs an alias line to ride on.
        inner
            .aliases
            .entry(key.clone())
            .or_insert_with(|| sanitize_alias(&key));
        if inner.filtered.insert(key) {
            self.touch(&mut inner);
        }
    }

    /// Returns `true` if the identity was flagged by [`mark_filtered`].
    ///
    /// [`mark_filtered`]: AliasStore::mark_filtered
    #[must_use]
    pub fn is_filtered(&self, identity: &PhoneIdentity) -> bool {
        self.lock().filtered.contains(identity.as_str())
    }

    /// Returns a snapshot of all stored aliases.
    #[must_use]
    pub fn all_aliases(&self) -> HashMap<String, String> {
        self.lock().aliases.clone()
    }

    /// Returns the number of stored aliases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().aliases.len()
    }

    /// Returns `true` if no aliases are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().aliases.is_empty()
    }

    /// Returns how many automatic flushes failed so far.
    ///
    /// Failed flushes never interrupt in-memory operation; callers surface
    /// the count in the run report.
    #[must_use]
    pub fn flush_failures(&self) -> usize {
        self.lock().flush_failures
    }

    /// Counts a mutation and auto-flushes when the batch is full.
    fn touch(&self, inner: &mut Inner) {
        inner.unflushed += 1;
        if inner.unflushed >= FLUSH_INTERVAL {
            if Self::write_file(self.path.as_deref(), inner).is_err() {
                inner.flush_failures += 1;
            }
            inner.unflushed = 0;
        }
    }

    /// Writes all aliases to disk immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the alias file cannot be written. In-memory
    /// state is unaffected by a failed flush.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.lock();
        Self::write_file(self.path.as_deref(), &inner)?;
        inner.unflushed = 0;
        Ok(())
    }

    fn write_file(path: Option<&Path>, inner: &Inner) -> Result<()> {
        let Some(path) = path else {
            return Ok(());
        };

        let mut lines: Vec<String> = inner
            .aliases
            .iter()
            .map(|(identity, alias)| {
                if inner.filtered.contains(identity) {
                    format!("{identity}|{alias}|{FILTER_MARKER}")
                } else {
                    format!("{identity}|{alias}")
                }
            })
            .collect();
        lines.sort();

        let mut contents = String::from("# voicepack aliases: identity|alias[|spam]\n");
        for line in &lines {
            contents.push_str(line);
            contents.push('\n');
        }

        fs::write(path, contents)?;
        Ok(())
    }
}

/// Sanitizes a display name for use as a filename component.
///
/// Whitespace and parentheses become underscores; path separators, the
/// alias-file delimiter, and other filename-unsafe characters are dropped.
#[must_use]
pub fn sanitize_alias(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        match ch {
            c if c.is_whitespace() => out.push('_'),
            '(' | ')' => out.push('_'),
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => {}
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out.trim_matches('_').to_string()
}

/// Extracts a usable human name from surrounding-markup text.
///
/// Strips known boilerplate prefixes, rejects pure boilerplate and anything
/// containing digits, and sanitizes the survivor.
fn extract_hint_name(hint: &str) -> Option<String> {
    let trimmed = hint.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lowered = trimmed.to_lowercase();
    if BOILERPLATE_PHRASES.contains(&lowered.as_str()) {
        return None;
    }

    let mut candidate = trimmed;
    for prefix in BOILERPLATE_PREFIXES {
        let head = trimmed.get(..prefix.len());
        if head.is_some_and(|h| h.eq_ignore_ascii_case(prefix)) {
            candidate = &trimmed[prefix.len()..];
            break;
        }
    }

    let shape_ok = !candidate.is_empty()
        && candidate.chars().any(|c| c.is_ascii_alphabetic())
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphabetic() || matches!(c, ' ' | '.' | '-' | '\''));
    if !shape_ok {
        return None;
    }

    let candidate_lower = candidate.trim().to_lowercase();
    if BOILERPLATE_PHRASES.contains(&candidate_lower.as_str()) {
        return None;
    }

    let sanitized = sanitize_alias(candidate);
    if sanitized.is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(s: &str) -> PhoneIdentity {
        PhoneIdentity::Number(s.to_string())
    }

    // =========================================================================
    // Resolution priority
    // =========================================================================

    #[test]
    fn test_stored_alias_beats_hint() {
        let store = AliasStore::in_memory();
        let id = number("+12125551234");

        store.add_alias(&id, "Susan Tang");
        assert_eq!(store.get_alias(&id, None), "Susan_Tang");
        assert_eq!(store.get_alias(&id, Some("Freshly Extracted")), "Susan_Tang");
        assert_eq!(store.get_alias(&id, Some("Another Hint")), "Susan_Tang");
    }

    #[test]
    fn test_hint_used_when_no_stored_alias() {
        let store = AliasStore::in_memory();
        let id = number("+12125551234");

        assert_eq!(store.get_alias(&id, Some("Aniella Tang")), "Aniella_Tang");
        // Hint-derived names are not stored.
        assert!(!store.has_alias(&id));
    }

    #[test]
    fn test_boilerplate_hints_rejected() {
        let store = AliasStore::in_memory();
        let id = number("+12125551234");

        for hint in ["Placed call to", "Me", "Group Conversation", ""] {
            assert_eq!(store.get_alias(&id, Some(hint)), "+12125551234", "hint {hint:?}");
        }
        // Digits disqualify a hint.
        assert_eq!(store.get_alias(&id, Some("+1 212 555 1234")), "+12125551234");
    }

    #[test]
    fn test_boilerplate_prefix_stripped() {
        let store = AliasStore::in_memory();
        let id = number("+12125551234");

        assert_eq!(
            store.get_alias(&id, Some("Placed call to Susan Tang")),
            "Susan_Tang"
        );
        assert_eq!(
            store.get_alias(&id, Some("Voicemail from Inessa Tang")),
            "Inessa_Tang"
        );
    }

    #[test]
    fn test_fallback_to_identity() {
        let store = AliasStore::in_memory();
        assert_eq!(store.get_alias(&number("+12125551234"), None), "+12125551234");
    }

    #[test]
    fn test_last_writer_wins() {
        let store = AliasStore::in_memory();
        let id = number("+12125551234");

        store.add_alias(&id, "Old Name");
        store.add_alias(&id, "New Name");
        assert_eq!(store.get_alias(&id, None), "New_Name");
        assert_eq!(store.len(), 1);
    }

    // =========================================================================
    // Sanitization
    // =========================================================================

    #[test]
    fn test_sanitize_alias() {
        assert_eq!(sanitize_alias("Susan Tang"), "Susan_Tang");
        assert_eq!(sanitize_alias("Bob (Work)"), "Bob__Work");
        assert_eq!(sanitize_alias("a/b\\c:d*e?f\"g<h>i|j"), "abcdefghij");
        assert_eq!(sanitize_alias("  padded  "), "padded");
        assert_eq!(sanitize_alias("tab\tname"), "tab_name");
    }

    #[test]
    fn test_empty_alias_ignored() {
        let store = AliasStore::in_memory();
        let id = number("+12125551234");

        store.add_alias(&id, "   ");
        store.add_alias(&id, "///");
        assert!(!store.has_alias(&id));
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    #[test]
    fn test_flush_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.txt");

        let store = AliasStore::open(&path).unwrap();
        store.add_alias(&number("+12125551234"), "Susan Tang");
        store.add_alias(&number("+13105556789"), "Bob Jones");
        store.mark_filtered(&number("+18005550000"));
        store.flush().unwrap();

        let reloaded = AliasStore::open(&path).unwrap();
        assert_eq!(reloaded.get_alias(&number("+12125551234"), None), "Susan_Tang");
        assert_eq!(reloaded.get_alias(&number("+13105556789"), None), "Bob_Jones");
        assert!(reloaded.is_filtered(&number("+18005550000")));
        assert!(!reloaded.is_filtered(&number("+12125551234")));
    }

    #[test]
    fn test_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.txt");

        let store = AliasStore::open(&path).unwrap();
        store.add_alias(&number("+12125551234"), "Susan Tang");
        store.mark_filtered(&number("+12125551234"));
        store.flush().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with('#'));
        assert!(contents.contains("+12125551234|Susan_Tang|spam\n"));
    }

    #[test]
    fn test_load_skips_comments_and_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.txt");
        fs::write(
            &path,
            "# comment\n+12125551234|Susan_Tang\nno-delimiter-line\n|empty_identity\n+13105556789|\n",
        )
        .unwrap();

        let store = AliasStore::open(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_alias(&number("+12125551234"), None), "Susan_Tang");
    }

    #[test]
    fn test_missing_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = AliasStore::open(dir.path().join("absent.txt")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_auto_flush_after_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.txt");
        let store = AliasStore::open(&path).unwrap();

        for i in 0..FLUSH_INTERVAL - 1 {
            store.add_alias(&number(&format!("+1212555{i:04}")), &format!("Person {i}"));
        }
        assert!(!path.exists(), "no flush before the batch fills");

        store.add_alias(&number("+13105550000"), "Batch Filler");
        assert!(path.exists(), "batch boundary triggers a flush");

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Batch_Filler"));
    }

    #[test]
    fn test_in_memory_store_never_writes() {
        let store = AliasStore::in_memory();
        for i in 0..FLUSH_INTERVAL * 2 {
            store.add_alias(&number(&format!("+1212555{i:04}")), &format!("Person {i}"));
        }
        assert_eq!(store.flush_failures(), 0);
        store.flush().unwrap();
    }

    #[test]
    fn test_mark_filtered_without_alias_creates_line() {
        let store = AliasStore::in_memory();
        let id = number("+18005550000");

        store.mark_filtered(&id);
        assert!(store.is_filtered(&id));
        // The synthesized alias line falls back to the identity itself.
        assert_eq!(store.get_alias(&id, None), "+18005550000");
    }
}
