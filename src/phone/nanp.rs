//! North American Numbering Plan rules.
//!
//! This is the number-parsing collaborator behind [`crate::phone`]: a small
//! region-aware parse/validate/format/classify surface over NANP numbers,
//! SMS short codes, and generic international numbers. The rest of the crate
//! never inspects digits directly; it goes through [`parse`] and the
//! [`ParsedNumber`] accessors, so a heavier number library could be swapped
//! in behind the same seam.
//!
//! Classification here is a prefix-table policy, not worldwide metadata:
//! toll-free and premium area codes are the canonical NANP sets, short codes
//! are recognized by length, and everything with a foreign country code is
//! classified [`NumberKind::International`].

/// Canonical NANP toll-free area codes.
const TOLL_FREE_AREA_CODES: [&str; 7] = ["800", "833", "844", "855", "866", "877", "888"];

/// Premium-rate area codes (caller-pays).
const PREMIUM_AREA_CODES: [&str; 2] = ["900", "976"];

/// Line-type classification for a parsed number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    /// Ordinary geographic NANP number.
    Standard,
    /// Toll-free NANP number (800/833/844/855/866/877/888).
    TollFree,
    /// Premium-rate NANP number (900/976).
    PremiumRate,
    /// SMS short code (4-6 digits, no country code).
    ShortCode,
    /// Valid number outside the NANP (country code != 1).
    International,
}

/// A successfully parsed phone number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNumber {
    country_code: u16,
    /// National significant digits (no country code, no formatting).
    national: String,
    kind: NumberKind,
}

impl ParsedNumber {
    /// Returns the line-type classification.
    pub fn kind(&self) -> NumberKind {
        self.kind
    }

    /// Returns the country code (1 for NANP, 0 for short codes).
    pub fn country_code(&self) -> u16 {
        self.country_code
    }

    /// Returns `true` if this number belongs to the NANP.
    pub fn is_domestic(&self) -> bool {
        self.country_code == 1
    }

    /// Returns the national significant digits.
    pub fn national_digits(&self) -> &str {
        &self.national
    }

    /// Returns the three-digit area code for NANP numbers.
    pub fn area_code(&self) -> Option<&str> {
        if self.is_domestic() && self.national.len() == 10 {
            Some(&self.national[..3])
        } else {
            None
        }
    }

    /// Formats the number in E.164.
    ///
    /// Short codes have no E.164 representation; they format as their bare
    /// digits, which keeps formatting idempotent for every parseable input.
    pub fn e164(&self) -> String {
        if self.kind == NumberKind::ShortCode {
            self.national.clone()
        } else {
            format!("+{}{}", self.country_code, self.national)
        }
    }
}

/// Extracts digits from a raw string, noting whether it had a `+` prefix.
///
/// Formatting characters `( ) - . space` are dropped; any other
/// non-digit makes the input unparseable.
fn strip_formatting(raw: &str) -> Option<(String, bool)> {
    let trimmed = raw.trim();
    let (body, has_plus) = match trimmed.strip_prefix('+') {
        Some(rest) => (rest, true),
        None => (trimmed, false),
    };

    let mut digits = String::with_capacity(body.len());
    for ch in body.chars() {
        match ch {
            '0'..='9' => digits.push(ch),
            '(' | ')' | '-' | '.' | ' ' | '\t' => {}
            _ => return None,
        }
    }

    if digits.is_empty() {
        None
    } else {
        Some((digits, has_plus))
    }
}

/// Validates a 10-digit NANP national number.
///
/// Area code and exchange must start with 2-9, and the area code must not
/// be an N11 service code.
fn valid_nanp_national(digits: &str) -> bool {
    if digits.len() != 10 {
        return false;
    }
    let bytes = digits.as_bytes();
    if !(b'2'..=b'9').contains(&bytes[0]) {
        return false;
    }
    // N11 service codes (211, 311, ... 911) are not dialable area codes.
    if bytes[1] == b'1' && bytes[2] == b'1' {
        return false;
    }
    if !(b'2'..=b'9').contains(&bytes[3]) {
        return false;
    }
    true
}

/// Classifies a validated NANP national number by area code.
fn classify_nanp(digits: &str) -> NumberKind {
    let area = &digits[..3];
    if TOLL_FREE_AREA_CODES.contains(&area) {
        NumberKind::TollFree
    } else if PREMIUM_AREA_CODES.contains(&area) {
        NumberKind::PremiumRate
    } else {
        NumberKind::Standard
    }
}

/// Parses a phone-number-like string, defaulting to the US region.
///
/// Accepted inputs:
/// - `+1` plus 10 NANP digits, or bare 10/11-digit NANP forms
/// - `+` plus 8-15 digits with a foreign country code
/// - bare 4-6 digit SMS short codes
///
/// Returns `None` for anything else; callers fall back to their own
/// digit-count heuristics.
pub fn parse(raw: &str) -> Option<ParsedNumber> {
    let (digits, has_plus) = strip_formatting(raw)?;

    // Explicit international prefix.
    if has_plus {
        if let Some(national) = digits.strip_prefix('1') {
            if valid_nanp_national(national) {
                return Some(ParsedNumber {
                    country_code: 1,
                    kind: classify_nanp(national),
                    national: national.to_string(),
                });
            }
            return None;
        }
        if (8..=15).contains(&digits.len()) {
            // Country code extraction beyond the NANP is approximate; only
            // the non-domestic distinction matters downstream.
            let cc: u16 = digits[..2.min(digits.len())].parse().ok()?;
            return Some(ParsedNumber {
                country_code: cc,
                national: digits[2.min(digits.len())..].to_string(),
                kind: NumberKind::International,
            });
        }
        return None;
    }

    // Bare national forms.
    match digits.len() {
        10 if valid_nanp_national(&digits) => Some(ParsedNumber {
            country_code: 1,
            kind: classify_nanp(&digits),
            national: digits,
        }),
        11 if digits.starts_with('1') && valid_nanp_national(&digits[1..]) => {
            let national = digits[1..].to_string();
            Some(ParsedNumber {
                country_code: 1,
                kind: classify_nanp(&national),
                national,
            })
        }
        4..=6 => Some(ParsedNumber {
            country_code: 0,
            national: digits,
            kind: NumberKind::ShortCode,
        }),
        _ => None,
    }
}
