//! Stable conversation identity derivation.
//!
//! Every record routes to a conversation stream named by a
//! [`ConversationKey`]: a filename-safe string derived from the participant
//! set. Keys are stable across runs so re-conversions append to the same
//! logical conversations, and bounded in length so group conversations with
//! many participants cannot produce unusable file names.
//!
//! Group keys join participant aliases in first-seen order. Once the join
//! exceeds [`MAX_KEY_LENGTH`], the key keeps the longest alias prefix fitting
//! [`TRUNCATED_ALIAS_BUDGET`] and appends `and_{N-K}_more_{hash}`, where the
//! hash digests the full sorted participant set. Two oversized groups that
//! share a visible prefix therefore still get distinct keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::alias::AliasStore;
use crate::phone::{PhoneIdentity, UNKNOWN_PREFIX, short_hash};

/// Maximum length (in characters) of a verbatim group key.
pub const MAX_KEY_LENGTH: usize = 80;

/// Alias-prefix budget for truncated group keys.
const TRUNCATED_ALIAS_BUDGET: usize = 60;

/// A stable, filename-safe conversation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key, returning the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConversationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConversationKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for ConversationKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Derives conversation keys from participant sets.
///
/// Alias resolution goes through the shared [`AliasStore`], so a stored
/// alias always wins over the raw identity in the visible key.
#[derive(Debug)]
pub struct ConversationResolver<'a> {
    aliases: &'a AliasStore,
}

impl<'a> ConversationResolver<'a> {
    /// Creates a resolver backed by the shared alias store.
    #[must_use]
    pub fn new(aliases: &'a AliasStore) -> Self {
        Self { aliases }
    }

    /// Resolves the conversation key for a participant set.
    ///
    /// A single participant (outside a group) keys by its alias, or by the
    /// identity itself when no alias is stored. Groups join aliases in the
    /// given first-seen order; the order is never re-sorted, only the
    /// collision hash uses a sorted view. An empty participant set falls
    /// back to a stable `unknown_` key.
    #[must_use]
    pub fn resolve_key(&self, participants: &[PhoneIdentity], is_group: bool) -> ConversationKey {
        match participants {
            [] => ConversationKey(format!("{UNKNOWN_PREFIX}{}", short_hash("no-participants"))),
            [single] if !is_group => ConversationKey(self.aliases.get_alias(single, None)),
            _ => self.group_key(participants),
        }
    }

    fn group_key(&self, participants: &[PhoneIdentity]) -> ConversationKey {
        let aliases: Vec<String> = participants
            .iter()
            .map(|p| self.aliases.get_alias(p, None))
            .collect();

        let joined = aliases.join("_");
        if joined.chars().count() <= MAX_KEY_LENGTH {
            return ConversationKey(joined);
        }

        let mut prefix = String::new();
        let mut prefix_len = 0;
        let mut kept = 0;
        for alias in &aliases {
            let alias_len = alias.chars().count();
            let extra = if kept == 0 { alias_len } else { alias_len + 1 };
            if prefix_len + extra > TRUNCATED_ALIAS_BUDGET {
                break;
            }
            if kept > 0 {
                prefix.push('_');
            }
            prefix.push_str(alias);
            prefix_len += extra;
            kept += 1;
        }

        // A first alias longer than the whole budget still contributes a
        // truncated fragment, so every key shows at least one participant.
        if kept == 0 {
            prefix = aliases[0].chars().take(TRUNCATED_ALIAS_BUDGET).collect();
            kept = 1;
        }

        let hash = participant_set_hash(participants);
        let omitted = aliases.len() - kept;
        ConversationKey(format!("{prefix}_and_{omitted}_more_{hash}"))
    }
}

/// Digests the full participant set, independent of first-seen order.
#[must_use]
pub fn participant_set_hash(participants: &[PhoneIdentity]) -> String {
    let mut ids: Vec<&str> = participants.iter().map(PhoneIdentity::as_str).collect();
    ids.sort_unstable();
    short_hash(&ids.join(","))
}
