//! Participant identity classification and normalization.
//!
//! This module turns raw participant strings from an export (phone numbers in
//! assorted formats, bare contact names, placeholder tokens) into
//! [`PhoneIdentity`] values, the normalized identifier used everywhere
//! downstream: alias lookups, conversation keys, and output rendering.
//!
//! Number handling is delegated to [`nanp`], with a digit-count heuristic as
//! the fallback for strings the strict parser rejects. Normalization is
//! idempotent: normalizing an already-normalized identity yields the same
//! value.
//!
//! # Example
//!
//! ```
//! use voicepack::phone::{NumberClassifier, PhoneIdentity, normalize};
//!
//! let classifier = NumberClassifier::new();
//!
//! assert_eq!(
//!     classifier.classify("(212) 555-1234"),
//!     Some(PhoneIdentity::Number("+12125551234".to_string()))
//! );
//! assert_eq!(
//!     classifier.classify("Susan Tang"),
//!     Some(PhoneIdentity::Name("Susan Tang".to_string()))
//! );
//! assert_eq!(classifier.classify("garbage123"), None);
//!
//! // Idempotent normalization.
//! assert_eq!(normalize("2125551234"), "+12125551234");
//! assert_eq!(normalize("+12125551234"), "+12125551234");
//! ```

pub mod nanp;

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::phone::nanp::NumberKind;

/// Prefix marking conversation keys whose participants could not be resolved.
pub const UNKNOWN_PREFIX: &str = "unknown_";

/// Prefix marking hash-derived identity tokens.
pub const HASHED_PREFIX: &str = "uid_";

/// Toll-free prefixes reserved by the NANP but not yet active, so the parser
/// tables do not know them.
const RESERVED_TOLL_FREE_PREFIXES: [&str; 10] = [
    "822", "880", "881", "882", "883", "884", "885", "886", "887", "889",
];

/// Fictitious area codes (media/testing use) rejected under enhanced filtering.
const FICTITIOUS_AREA_CODES: [&str; 2] = ["555", "456"];

/// A normalized participant identifier.
///
/// Exactly one of three shapes:
/// - [`Number`](PhoneIdentity::Number): an E.164 phone number (or bare short
///   code digits),
/// - [`Name`](PhoneIdentity::Name): a human name standing in for a number,
/// - [`Hashed`](PhoneIdentity::Hashed): a stable token derived from source
///   markup when no usable number or name exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PhoneIdentity {
    /// E.164 number such as `+12125551234`, or short-code digits.
    Number(String),
    /// Contact name used in place of a number.
    Name(String),
    /// Hash-derived token, `uid_`-prefixed.
    Hashed(String),
}

impl PhoneIdentity {
    /// Derives a stable hashed identity from arbitrary seed text.
    ///
    /// The token is `uid_` plus the first 8 hex characters of the SHA-256
    /// digest, so the same markup always produces the same identity.
    #[must_use]
    pub fn hashed(seed: &str) -> Self {
        Self::Hashed(format!("{HASHED_PREFIX}{}", short_hash(seed)))
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Number(s) | Self::Name(s) | Self::Hashed(s) => s,
        }
    }

    /// Returns `true` for phone-number identities.
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Number(_))
    }

    /// Returns `true` for name identities.
    #[must_use]
    pub fn is_name(&self) -> bool {
        matches!(self, Self::Name(_))
    }

    /// Returns `true` for hash-derived identities.
    #[must_use]
    pub fn is_hashed(&self) -> bool {
        matches!(self, Self::Hashed(_))
    }
}

impl fmt::Display for PhoneIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computes the first 8 hex characters of a SHA-256 digest.
///
/// Shared by hashed identities and oversized group-key suffixes.
#[must_use]
pub fn short_hash(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    let mut out = String::with_capacity(8);
    for byte in &digest[..4] {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Filtering strictness applied by [`NumberClassifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterPolicy {
    /// Accept every identity that looks like a deliverable number or a name.
    #[default]
    Standard,
    /// Additionally reject short codes, toll-free, non-domestic, premium-rate
    /// numbers, and fictitious or all-same-digit area codes.
    Enhanced,
}

/// Classifies raw participant strings into [`PhoneIdentity`] values.
///
/// # Example
///
/// ```
/// use voicepack::phone::{FilterPolicy, NumberClassifier};
///
/// let standard = NumberClassifier::new();
/// let enhanced = NumberClassifier::with_policy(FilterPolicy::Enhanced);
///
/// // Short codes survive standard filtering but not enhanced.
/// assert!(standard.classify("22000").is_some());
/// assert!(enhanced.classify("22000").is_none());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberClassifier {
    policy: FilterPolicy,
}

impl NumberClassifier {
    /// Creates a classifier with the standard policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a classifier with an explicit policy.
    #[must_use]
    pub fn with_policy(policy: FilterPolicy) -> Self {
        Self { policy }
    }

    /// Returns the active policy.
    #[must_use]
    pub fn policy(&self) -> FilterPolicy {
        self.policy
    }

    /// Classifies a raw participant string.
    ///
    /// Returns `None` for strings that cannot serve as an identity under the
    /// active policy. Decision order:
    /// 1. `unknown_`/`uid_`-prefixed tokens pass through unchanged.
    /// 2. Alphabetic strings with an internal space (letters, spaces, `.`,
    ///    `-` only) become [`PhoneIdentity::Name`].
    /// 3. Any other string containing a letter is rejected.
    /// 4. Everything else goes through the number parser, then the
    ///    digit-count heuristic for strings the parser rejects.
    #[must_use]
    pub fn classify(&self, raw: &str) -> Option<PhoneIdentity> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if trimmed.starts_with(UNKNOWN_PREFIX) || trimmed.starts_with(HASHED_PREFIX) {
            return Some(PhoneIdentity::Hashed(trimmed.to_string()));
        }

        if is_name_identifier(trimmed) {
            return Some(PhoneIdentity::Name(trimmed.to_string()));
        }

        if trimmed.chars().any(|c| c.is_ascii_alphabetic()) {
            return None;
        }

        if let Some(parsed) = nanp::parse(trimmed) {
            if self.policy == FilterPolicy::Enhanced && !passes_enhanced(&parsed) {
                return None;
            }
            return Some(PhoneIdentity::Number(parsed.e164()));
        }

        self.classify_by_digits(trimmed)
    }

    /// Digit-count fallback for strings the strict parser rejects.
    fn classify_by_digits(&self, raw: &str) -> Option<PhoneIdentity> {
        let digits = digits_of(raw);

        let national = match digits.len() {
            10 => &digits[..],
            11 if digits.starts_with('1') => &digits[1..],
            n if n >= 12 && digits.starts_with('1') => {
                // Over-long leading-1 numbers are accepted as-is; the strict
                // parser already rejected them so no area code to check.
                return Some(PhoneIdentity::Number(normalize(&digits)));
            }
            _ => return None,
        };

        let area = &national[..3];
        if is_repeated_triple(area) {
            return None;
        }
        if self.policy == FilterPolicy::Enhanced
            && (FICTITIOUS_AREA_CODES.contains(&area) || is_reserved_toll_free(national))
        {
            return None;
        }

        Some(PhoneIdentity::Number(normalize(&digits)))
    }
}

/// Policy checks applied on top of a successful strict parse.
fn passes_enhanced(parsed: &nanp::ParsedNumber) -> bool {
    match parsed.kind() {
        NumberKind::ShortCode
        | NumberKind::TollFree
        | NumberKind::PremiumRate
        | NumberKind::International => false,
        NumberKind::Standard => {
            let national = parsed.national_digits();
            let area = &national[..3];
            !FICTITIOUS_AREA_CODES.contains(&area)
                && !is_repeated_triple(area)
                && !is_reserved_toll_free(national)
        }
    }
}

/// Recognizes a human name acting as an identifier: letters, spaces, dots,
/// and hyphens only, with at least one internal space.
fn is_name_identifier(s: &str) -> bool {
    let shape_ok = s
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c == ' ' || c == '.' || c == '-');
    shape_ok && s.contains(' ') && s.chars().any(|c| c.is_ascii_alphabetic())
}

/// Extracts the ASCII digits of a string, dropping everything else.
fn digits_of(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Returns `true` for the repeated-digit triples 000, 111, ... 999.
fn is_repeated_triple(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => s.len() == 3 && chars.all(|c| c == first),
        None => false,
    }
}

/// Returns `true` if a 10-digit national number starts with a reserved
/// future toll-free prefix.
fn is_reserved_toll_free(national: &str) -> bool {
    national.len() == 10
        && RESERVED_TOLL_FREE_PREFIXES
            .iter()
            .any(|p| national.starts_with(p))
}

/// Strips the country code from a number string, leaving national digits.
fn national_digits(number: &str) -> String {
    let digits = digits_of(number);
    if digits.len() == 11 && digits.starts_with('1') {
        digits[1..].to_string()
    } else {
        digits
    }
}

/// Returns `true` if a number is toll-free.
///
/// Checks the parser's classification first, then falls back to the reserved
/// prefix set the parser tables do not cover yet.
///
/// # Example
///
/// ```
/// use voicepack::phone::is_toll_free;
///
/// assert!(is_toll_free("+18005551234")); // active toll-free area code
/// assert!(is_toll_free("+18225551234")); // reserved prefix
/// assert!(!is_toll_free("+12125551234"));
/// ```
#[must_use]
pub fn is_toll_free(number: &str) -> bool {
    if let Some(parsed) = nanp::parse(number) {
        if parsed.kind() == NumberKind::TollFree {
            return true;
        }
    }
    is_reserved_toll_free(&national_digits(number))
}

/// Returns `true` if a number is a 4-6 digit short code.
#[must_use]
pub fn is_short_code(number: &str) -> bool {
    let digits = digits_of(number);
    !number.starts_with('+')
        && (4..=6).contains(&digits.len())
        && digits.len() == number.trim().len()
}

/// Normalizes a number string to E.164.
///
/// Delegates to the strict parser; for strings it rejects, applies the
/// manual US rules (10 digits get a `+1` prefix, 11 digits with a leading
/// `1` get a `+`). Anything else is returned digit-stripped but otherwise
/// unchanged, which keeps the function idempotent for every input.
#[must_use]
pub fn normalize(raw: &str) -> String {
    if let Some(parsed) = nanp::parse(raw) {
        return parsed.e164();
    }

    let digits = digits_of(raw);
    match digits.len() {
        10 => format!("+1{digits}"),
        11 if digits.starts_with('1') => format!("+{digits}"),
        _ if raw.trim().starts_with('+') => format!("+{digits}"),
        _ => digits,
    }
}
