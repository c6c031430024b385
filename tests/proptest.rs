//! Property-based tests for voicepack.
//!
//! These tests generate random inputs to probe the pure decision
//! procedures: number normalization, identity classification, alias
//! sanitization, conversation keying, and commercial detection.

use proptest::prelude::*;

use voicepack::alias::{AliasStore, sanitize_alias};
use voicepack::commercial::{ConversationMessage, is_commercial, is_opt_out_word};
use voicepack::conversation::{ConversationResolver, MAX_KEY_LENGTH, participant_set_hash};
use voicepack::phone::{self, FilterPolicy, NumberClassifier, PhoneIdentity};
use voicepack::timestamp::{self, MAX_TIMESTAMP_MS, MIN_TIMESTAMP_MS};

/// Sender label the pipeline uses for the account owner.
const ME: &str = "Me";

/// Generate a raw participant string using fast strategies (select, no regex)
fn arb_raw_participant() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "+12125550187".to_string(),
        "(212) 555-0187".to_string(),
        "212.555.0187".to_string(),
        "1-212-555-0187".to_string(),
        "12125550187".to_string(),
        "+18005550199".to_string(),
        "88202".to_string(),
        "+442071838750".to_string(),
        "Susan Tang".to_string(),
        "Anna-Marie Cole".to_string(),
        "uid_1a2b3c4d".to_string(),
        "unknown_9f8e7d6c".to_string(),
        String::new(),
        "   ".to_string(),
        "not a number 123".to_string(),
        "☎ call me".to_string(),
    ])
}

/// Generate alias text covering the characters sanitization cares about
fn arb_alias_text() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "Susan Tang".to_string(),
        "Mom (cell)".to_string(),
        "  padded  ".to_string(),
        "path/to\\file".to_string(),
        "a:b*c?d\"e<f>g|h".to_string(),
        "tab\there".to_string(),
        "Иван Петров".to_string(),
        "🎉 party crew".to_string(),
        String::new(),
        "___".to_string(),
        "+12125550187".to_string(),
    ])
}

/// Generate message text spanning promo, dialogue, and opt-out traffic
fn arb_message_text() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "50% off everything this weekend!".to_string(),
        "Your code is 482910".to_string(),
        "hey, lunch tomorrow?".to_string(),
        "STOP".to_string(),
        "stop all".to_string(),
        "You have been unsubscribed".to_string(),
        String::new(),
        "🎉🔥".to_string(),
    ])
}

fn number(raw: &str) -> PhoneIdentity {
    PhoneIdentity::Number(raw.to_string())
}

/// Roster of unaliased numbers, 12 visible characters each.
fn roster(len: usize) -> Vec<PhoneIdentity> {
    (0..len)
        .map(|i| number(&format!("+1212555{i:04}")))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ============================================
    // NORMALIZATION PROPERTIES
    // ============================================

    /// Normalization is idempotent for every input
    #[test]
    fn normalize_is_idempotent(raw in arb_raw_participant()) {
        let once = phone::normalize(&raw);
        let twice = phone::normalize(&once);
        prop_assert_eq!(once, twice);
    }

    /// Normalized output is digits with at most a leading plus
    #[test]
    fn normalize_output_shape(raw in arb_raw_participant()) {
        let normalized = phone::normalize(&raw);
        for (i, c) in normalized.chars().enumerate() {
            prop_assert!(
                c.is_ascii_digit() || (i == 0 && c == '+'),
                "unexpected char {:?} in {:?}", c, normalized
            );
        }
    }

    // ============================================
    // CLASSIFICATION PROPERTIES
    // ============================================

    /// Classification is stable over its own output
    #[test]
    fn classify_is_stable_over_own_output(raw in arb_raw_participant()) {
        let classifier = NumberClassifier::new();
        if let Some(identity) = classifier.classify(&raw) {
            let again = classifier.classify(identity.as_str());
            prop_assert_eq!(Some(identity), again);
        }
    }

    /// Everything the enhanced policy accepts, the default policy accepts too
    #[test]
    fn enhanced_accepts_subset_of_default(raw in arb_raw_participant()) {
        let default = NumberClassifier::new().classify(&raw);
        let enhanced = NumberClassifier::with_policy(FilterPolicy::Enhanced).classify(&raw);
        if let Some(identity) = enhanced {
            prop_assert_eq!(Some(identity), default);
        }
    }

    /// Classification never panics on arbitrary input
    #[test]
    fn classify_never_panics(chars in prop::collection::vec(any::<char>(), 0..40)) {
        let raw: String = chars.into_iter().collect();
        let _ = NumberClassifier::new().classify(&raw);
        let _ = NumberClassifier::with_policy(FilterPolicy::Enhanced).classify(&raw);
    }

    // ============================================
    // ALIAS SANITIZATION PROPERTIES
    // ============================================

    /// Sanitization is idempotent
    #[test]
    fn sanitize_is_idempotent(name in arb_alias_text()) {
        let once = sanitize_alias(&name);
        let twice = sanitize_alias(&once);
        prop_assert_eq!(once, twice);
    }

    /// Sanitized aliases are filename safe
    #[test]
    fn sanitize_output_is_filename_safe(chars in prop::collection::vec(any::<char>(), 0..30)) {
        let name: String = chars.into_iter().collect();
        let sanitized = sanitize_alias(&name);
        for c in sanitized.chars() {
            prop_assert!(!c.is_whitespace() && !c.is_control(), "kept {:?}", c);
            prop_assert!(!"/\\:*?\"<>|()".contains(c), "kept {:?}", c);
        }
        prop_assert!(!sanitized.starts_with('_'));
        prop_assert!(!sanitized.ends_with('_'));
    }

    // ============================================
    // CONVERSATION KEY PROPERTIES
    // ============================================

    /// Key derivation is deterministic
    #[test]
    fn key_is_deterministic(len in 1usize..20) {
        let store = AliasStore::in_memory();
        let resolver = ConversationResolver::new(&store);
        let participants = roster(len);
        let first = resolver.resolve_key(&participants, true);
        let second = resolver.resolve_key(&participants, true);
        prop_assert_eq!(first, second);
    }

    /// Small rosters join verbatim in roster order
    #[test]
    fn small_roster_joins_in_order(len in 1usize..=6) {
        let store = AliasStore::in_memory();
        let resolver = ConversationResolver::new(&store);
        let participants = roster(len);
        let key = resolver.resolve_key(&participants, true);

        let joined: Vec<&str> = participants.iter().map(PhoneIdentity::as_str).collect();
        let expected = joined.join("_");
        prop_assert_eq!(key.as_str(), expected.as_str());
    }

    /// Oversized rosters truncate to a bounded key with a hash tail
    #[test]
    fn oversized_roster_truncates(len in 8usize..40) {
        let store = AliasStore::in_memory();
        let resolver = ConversationResolver::new(&store);
        let participants = roster(len);
        let key = resolver.resolve_key(&participants, true);

        // Truncated keys carry the alias budget plus an `_and_N_more_`
        // tail ending in 8 hash chars.
        let visible = key.as_str().chars().count();
        prop_assert!(visible <= MAX_KEY_LENGTH + 8, "key too long: {}", key);
        prop_assert!(key.as_str().contains("_more_"), "missing tail: {}", key);
        let tail: String = key.as_str().chars().rev().take(8).collect();
        prop_assert!(tail.chars().all(|c| c.is_ascii_hexdigit()), "bad tail: {}", key);
    }

    /// Changing one participant changes the truncated key
    #[test]
    fn truncated_keys_stay_distinct(len in 8usize..40) {
        let store = AliasStore::in_memory();
        let resolver = ConversationResolver::new(&store);
        let original = roster(len);
        let mut changed = roster(len);
        changed[len - 1] = number("+19995550000");

        let key_original = resolver.resolve_key(&original, true);
        let key_changed = resolver.resolve_key(&changed, true);
        prop_assert_ne!(key_original, key_changed);
    }

    /// The participant set hash ignores roster order
    #[test]
    fn set_hash_ignores_order(len in 2usize..20) {
        let forward = roster(len);
        let mut reversed = roster(len);
        reversed.reverse();
        prop_assert_eq!(participant_set_hash(&forward), participant_set_hash(&reversed));
    }

    // ============================================
    // COMMERCIAL DETECTION PROPERTIES
    // ============================================

    /// A single message is never commercial
    #[test]
    fn single_message_never_commercial(text in arb_message_text()) {
        let messages = vec![ConversationMessage::new(ME, text, 1_650_000_000_000)];
        prop_assert!(!is_commercial(&messages, ME));
    }

    /// Real dialogue from the account owner disqualifies a thread
    #[test]
    fn self_dialogue_never_commercial(promos in 1usize..5, with_stop in any::<bool>()) {
        let mut messages = Vec::new();
        let mut ts = 1_650_000_000_000i64;
        for _ in 0..promos {
            messages.push(ConversationMessage::new("+18885550199", "Flash sale today!", ts));
            ts += 1_000;
        }
        messages.push(ConversationMessage::new(ME, "who is this?", ts));
        ts += 1_000;
        if with_stop {
            messages.push(ConversationMessage::new(ME, "STOP", ts));
        }
        prop_assert!(!is_commercial(&messages, ME));
    }

    /// Promo traffic answered by a lone opt-out is always commercial
    #[test]
    fn promo_then_opt_out_is_commercial(
        promos in 1usize..5,
        word in prop::sample::select(vec![
            "STOP", "stop", "Unsubscribe", "END", "quit", "Cancel", "OPT-OUT", "stop all", "Remove",
        ]),
    ) {
        let mut messages = Vec::new();
        let mut ts = 1_650_000_000_000i64;
        for _ in 0..promos {
            messages.push(ConversationMessage::new("+18885550199", "Flash sale today!", ts));
            ts += 1_000;
        }
        messages.push(ConversationMessage::new(ME, word, ts));
        prop_assert!(is_commercial(&messages, ME));
    }

    /// An opt-out with no preceding traffic is not commercial
    #[test]
    fn unprompted_opt_out_not_commercial(word in prop::sample::select(vec!["STOP", "end"])) {
        let messages = vec![
            ConversationMessage::new(ME, word, 1_650_000_000_000),
            ConversationMessage::new("+18885550199", "Deals!", 1_650_000_001_000),
        ];
        prop_assert!(!is_commercial(&messages, ME));
    }

    /// A confirmation tail keeps the thread commercial
    #[test]
    fn confirmation_tail_stays_commercial(
        confirmation in prop::sample::select(vec![
            "You have been unsubscribed.",
            "You will no longer receive messages.",
            "Your request has been processed.",
        ]),
    ) {
        let messages = vec![
            ConversationMessage::new("+18885550199", "Flash sale today!", 1_650_000_000_000),
            ConversationMessage::new(ME, "STOP", 1_650_000_001_000),
            ConversationMessage::new("+18885550199", confirmation, 1_650_000_002_000),
        ];
        prop_assert!(is_commercial(&messages, ME));
    }

    /// The verdict does not depend on slice order
    #[test]
    fn verdict_ignores_slice_order(
        pairs in prop::collection::vec(
            (prop::sample::select(vec![ME, "+18885550199"]), arb_message_text()),
            0..12,
        ),
    ) {
        let messages: Vec<ConversationMessage> = pairs
            .iter()
            .enumerate()
            .map(|(i, (sender, text))| {
                ConversationMessage::new(*sender, text.clone(), 1_650_000_000_000 + i as i64 * 1_000)
            })
            .collect();
        let mut reversed = messages.clone();
        reversed.reverse();
        prop_assert_eq!(is_commercial(&messages, ME), is_commercial(&reversed, ME));
    }

    // ============================================
    // TIMESTAMP PROPERTIES
    // ============================================

    /// Well-formed export instants parse inside the sanity window
    #[test]
    fn iso_instants_parse_in_window(
        year in 2001i32..2099,
        month in 1u32..=12,
        day in 1u32..=28,
        hour in 0u32..24,
        minute in 0u32..60,
        second in 0u32..60,
    ) {
        let value =
            format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}Z");
        let ms = timestamp::parse_instant(&value);
        prop_assert!(ms.is_some(), "failed to parse {}", value);

        let ms = ms.unwrap();
        prop_assert!((MIN_TIMESTAMP_MS..=MAX_TIMESTAMP_MS).contains(&ms));
        prop_assert_eq!(timestamp::clamp_to_window(ms), ms);
    }

    /// Clamping always lands inside the window and is idempotent
    #[test]
    fn clamp_is_idempotent(ms in any::<i64>()) {
        let clamped = timestamp::clamp_to_window(ms);
        prop_assert!((MIN_TIMESTAMP_MS..=MAX_TIMESTAMP_MS).contains(&clamped));
        prop_assert_eq!(timestamp::clamp_to_window(clamped), clamped);
    }
}

// ============================================
// NON-PROPTEST EDGE CASE TESTS
// ============================================

#[cfg(test)]
mod edge_cases {
    use super::*;

    #[test]
    fn normalize_formatted_us_number() {
        assert_eq!(phone::normalize("(212) 555-0187"), "+12125550187");
        assert_eq!(phone::normalize("1 212 555 0187"), "+12125550187");
    }

    #[test]
    fn sanitize_keeps_plus_and_digits() {
        assert_eq!(sanitize_alias("+12125550187"), "+12125550187");
    }

    #[test]
    fn sanitize_maps_spaces_and_parens() {
        assert_eq!(sanitize_alias("Mom (cell)"), "Mom__cell");
    }

    #[test]
    fn hashed_tokens_pass_through() {
        let classifier = NumberClassifier::new();
        assert_eq!(
            classifier.classify("uid_1a2b3c4d"),
            Some(PhoneIdentity::Hashed("uid_1a2b3c4d".to_string()))
        );
    }

    #[test]
    fn opt_out_requires_exact_word() {
        assert!(is_opt_out_word("  Stop  "));
        assert!(is_opt_out_word("STOP ALL"));
        assert!(!is_opt_out_word("please stop"));
        assert!(!is_opt_out_word("stopped"));
    }

    #[test]
    fn empty_roster_key_is_stable() {
        let store = AliasStore::in_memory();
        let resolver = ConversationResolver::new(&store);
        let direct = resolver.resolve_key(&[], false);
        let group = resolver.resolve_key(&[], true);
        assert_eq!(direct, group);
        assert!(direct.as_str().starts_with("unknown_"));
    }
}
