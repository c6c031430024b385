//! Commercial conversation detection.
//!
//! [`is_commercial`] is a pure decision procedure over a fully assembled
//! conversation: it flags threads that consist solely of commercial traffic
//! answered by an opt-out keyword ("STOP" and friends), optionally followed
//! by an unsubscribe confirmation. Any sign of real dialogue disqualifies
//! the conversation.
//!
//! The function has no side effects; callers decide whether flagged
//! conversations are tagged in the index or dropped entirely.

use once_cell::sync::Lazy;
use regex::RegexSet;

/// Texts that count as an opt-out when they are the entire message
/// (after trimming and lowercasing).
const OPT_OUT_WORDS: [&str; 9] = [
    "stop",
    "unsubscribe",
    "cancel",
    "remove",
    "opt-out",
    "optout",
    "stop all",
    "end",
    "quit",
];

/// Confirmation phrases senders use after processing an opt-out.
/// Matched case-insensitively anywhere in the message.
static CONFIRMATION_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)you have been unsubscribed",
        r"(?i)you are unsubscribed",
        r"(?i)successfully unsubscribed",
        r"(?i)unsubscribed successfully",
        r"(?i)no longer receive",
        r"(?i)will no longer",
        r"(?i)opted out successfully",
        r"(?i)successfully opted out",
        r"(?i)you have been removed",
        r"(?i)your request has been processed",
    ])
    .unwrap()
});

/// One message of an assembled conversation, as seen by the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMessage {
    sender: String,
    text: String,
    timestamp_ms: i64,
}

impl ConversationMessage {
    /// Creates a classifier message.
    #[must_use]
    pub fn new(sender: impl Into<String>, text: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            timestamp_ms,
        }
    }

    /// Returns the sending identity.
    #[must_use]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Returns the message text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the Unix-millisecond timestamp.
    #[must_use]
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }
}

/// Returns `true` if a message is exactly an opt-out keyword.
#[must_use]
pub fn is_opt_out_word(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    OPT_OUT_WORDS.contains(&normalized.as_str())
}

/// Returns `true` if a message reads as an unsubscribe confirmation.
#[must_use]
pub fn is_confirmation(text: &str) -> bool {
    CONFIRMATION_PATTERNS.is_match(text)
}

/// Decides whether a finalized conversation is purely commercial.
///
/// The decision order, short-circuiting on the first disqualifier:
/// 1. Fewer than two messages: not commercial.
/// 2. No self-sent message that is exactly an opt-out keyword: not
///    commercial. The last such message anchors the remaining checks.
/// 3. Any self-sent message that is not an opt-out keyword: not commercial
///    (real dialogue).
/// 4. The opt-out must be preceded by at least one message, all of them
///    from the other party.
/// 5. Everything after the opt-out must be either a further self opt-out
///    or an other-party confirmation phrase.
/// 6. Otherwise: commercial.
#[must_use]
pub fn is_commercial(messages: &[ConversationMessage], self_identifier: &str) -> bool {
    if messages.len() < 2 {
        return false;
    }

    let mut ordered: Vec<&ConversationMessage> = messages.iter().collect();
    ordered.sort_by_key(|m| m.timestamp_ms);

    let Some(opt_out_idx) = ordered
        .iter()
        .rposition(|m| m.sender == self_identifier && is_opt_out_word(&m.text))
    else {
        return false;
    };

    if ordered
        .iter()
        .any(|m| m.sender == self_identifier && !is_opt_out_word(&m.text))
    {
        return false;
    }

    let before = &ordered[..opt_out_idx];
    if before.is_empty() || before.iter().any(|m| m.sender == self_identifier) {
        return false;
    }

    for message in &ordered[opt_out_idx + 1..] {
        if message.sender == self_identifier {
            if !is_opt_out_word(&message.text) {
                return false;
            }
        } else if !is_confirmation(&message.text) {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const ME: &str = "+19995550000";
    const SPAMMER: &str = "+18005551234";

    fn msg(sender: &str, text: &str, ts: i64) -> ConversationMessage {
        ConversationMessage::new(sender, text, ts)
    }

    // =========================================================================
    // Commercial conversations
    // =========================================================================

    #[test]
    fn test_spam_then_stop_is_commercial() {
        let messages = vec![
            msg(SPAMMER, "50% off everything this weekend!", 1_000),
            msg(ME, "STOP", 2_000),
        ];
        assert!(is_commercial(&messages, ME));
    }

    #[test]
    fn test_spam_stop_confirmation_is_commercial() {
        let messages = vec![
            msg(SPAMMER, "Flash sale! Reply STOP to opt out", 1_000),
            msg(ME, "stop", 2_000),
            msg(SPAMMER, "You have been unsubscribed and will no longer receive messages.", 3_000),
        ];
        assert!(is_commercial(&messages, ME));
    }

    #[test]
    fn test_multiple_spam_then_stop_is_commercial() {
        let messages = vec![
            msg(SPAMMER, "Deal 1", 1_000),
            msg(SPAMMER, "Deal 2", 2_000),
            msg(SPAMMER, "Deal 3", 3_000),
            msg(ME, "Unsubscribe", 4_000),
        ];
        assert!(is_commercial(&messages, ME));
    }

    #[test]
    fn test_every_opt_out_keyword_recognized() {
        for word in OPT_OUT_WORDS {
            let messages = vec![
                msg(SPAMMER, "Buy now!", 1_000),
                msg(ME, word, 2_000),
            ];
            assert!(is_commercial(&messages, ME), "keyword {word}");
        }
    }

    #[test]
    fn test_opt_out_with_padding_and_case() {
        let messages = vec![
            msg(SPAMMER, "Buy now!", 1_000),
            msg(ME, "  Stop All  ", 2_000),
        ];
        assert!(is_commercial(&messages, ME));
    }

    // =========================================================================
    // Non-commercial conversations
    // =========================================================================

    #[test]
    fn test_single_message_not_commercial() {
        let messages = vec![msg(SPAMMER, "Buy now!", 1_000)];
        assert!(!is_commercial(&messages, ME));
    }

    #[test]
    fn test_stop_then_non_confirmation_reply_not_commercial() {
        let messages = vec![
            msg(SPAMMER, "Sale today only", 1_000),
            msg(ME, "STOP", 2_000),
            msg(SPAMMER, "Why?", 3_000),
        ];
        assert!(!is_commercial(&messages, ME));
    }

    #[test]
    fn test_stop_inside_sentence_not_commercial() {
        let messages = vec![
            msg(SPAMMER, "Are you coming?", 1_000),
            msg(ME, "Can you stop by the store on the way?", 2_000),
        ];
        assert!(!is_commercial(&messages, ME));
    }

    #[test]
    fn test_stop_as_first_message_not_commercial() {
        let messages = vec![
            msg(ME, "STOP", 1_000),
            msg(SPAMMER, "You have been unsubscribed", 2_000),
        ];
        assert!(!is_commercial(&messages, ME));
    }

    #[test]
    fn test_real_dialogue_before_stop_not_commercial() {
        let messages = vec![
            msg(SPAMMER, "Hi, this is your dentist's office", 1_000),
            msg(ME, "Thanks, see you Tuesday", 2_000),
            msg(SPAMMER, "Reminder: appointment tomorrow", 3_000),
            msg(ME, "STOP", 4_000),
        ];
        assert!(!is_commercial(&messages, ME));
    }

    #[test]
    fn test_no_self_messages_not_commercial() {
        let messages = vec![
            msg(SPAMMER, "Deal 1", 1_000),
            msg(SPAMMER, "Deal 2", 2_000),
        ];
        assert!(!is_commercial(&messages, ME));
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        // Same as the commercial case but supplied out of order.
        let messages = vec![
            msg(ME, "STOP", 2_000),
            msg(SPAMMER, "Limited offer!", 1_000),
        ];
        assert!(is_commercial(&messages, ME));
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn test_is_opt_out_word() {
        assert!(is_opt_out_word("STOP"));
        assert!(is_opt_out_word("  stop  "));
        assert!(is_opt_out_word("Stop All"));
        assert!(!is_opt_out_word("stop it"));
        assert!(!is_opt_out_word("please stop"));
        assert!(!is_opt_out_word(""));
    }

    #[test]
    fn test_is_confirmation() {
        assert!(is_confirmation("You have been unsubscribed."));
        assert!(is_confirmation("you will no longer receive messages"));
        assert!(is_confirmation("OPTED OUT SUCCESSFULLY"));
        assert!(!is_confirmation("Why do you want to leave?"));
        assert!(!is_confirmation("Great deal inside!"));
    }
}
