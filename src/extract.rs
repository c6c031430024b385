//! Google Voice takeout HTML extraction.
//!
//! Takeout writes one HTML file per message thread, call, or voicemail
//! under `Calls/`. The file name carries the counterparty and the record
//! kind:
//!
//! - `Susan Tang - Text - 2022-04-15T06_40_00Z.html` (message thread)
//! - `+12125550000 - Placed - ...` / `- Received -` / `- Missed -` (calls)
//! - `Susan Tang - Voicemail - ...`
//! - `Group Conversation - 2022-04-15T06_40_00Z.html`
//!
//! Inside, records are `message` / `haudio` microformat blocks: `tel:`
//! anchors with `fn` display names, `dt`/`published` timestamp titles,
//! `<q>` bodies, `duration` abbreviations, image and vCard references.
//! Markup varies across export vintages, so extraction is regex-over-text
//! rather than a full DOM walk; anything unrecognized degrades to a
//! fallback value instead of failing the file.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::alias::{AliasStore, sanitize_alias};
use crate::error::{Result, VoicepackError};
use crate::phone::{self, NumberClassifier, PhoneIdentity};
use crate::record::{Attachment, AttachmentKind, CallDirection, MessageRecord, RecordKind};
use crate::timestamp::{TimestampCandidate, TimestampResolver};

static TEL_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<a[^>]*href="tel:([^"]+)"[^>]*>(.*?)</a>"#).unwrap());
static DT_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<abbr class="dt" title="([^"]+)""#).unwrap());
static PUBLISHED_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<abbr class="published" title="([^"]+)""#).unwrap());
static MESSAGE_BODY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<q>(.*?)</q>").unwrap());
static IMAGE_SRC: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<img[^>]*src="([^"]+)""#).unwrap());
static VCARD_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a[^>]*href="([^"]+\.vcf)""#).unwrap());
static DURATION_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<abbr class="duration"[^>]*>\s*(\([0-9:]+\))"#).unwrap());
static FULL_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<span class="full-text">(.*?)</span>"#).unwrap());
static PARTICIPANTS_DIV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<div class="participants">(.*?)</div>"#).unwrap());
static FN_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<span class="fn"[^>]*>(.*?)</span>"#).unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Record category derived from an export file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// SMS/MMS thread, including group conversations.
    MessageThread,
    /// Call log entry with its direction.
    Call(CallDirection),
    /// Voicemail with optional transcript.
    Voicemail,
}

/// Classifies an export file by the kind token in its name.
///
/// Returns `None` for files that are not conversation records (media
/// blobs, resource pages), which callers should skip silently.
///
/// # Example
///
/// ```rust
/// use voicepack::extract::{FileKind, detect_file_kind};
/// use voicepack::record::CallDirection;
///
/// let kind = detect_file_kind("Susan Tang - Text - 2022-04-15T06_40_00Z.html");
/// assert_eq!(kind, Some(FileKind::MessageThread));
///
/// let kind = detect_file_kind("+12125550000 - Missed - 2022-04-15T06_40_00Z.html");
/// assert_eq!(kind, Some(FileKind::Call(CallDirection::Missed)));
/// ```
#[must_use]
pub fn detect_file_kind(file_name: &str) -> Option<FileKind> {
    if !file_name.ends_with(".html") {
        return None;
    }
    if file_name.contains(" - Text - ") || file_name.starts_with("Group Conversation") {
        return Some(FileKind::MessageThread);
    }
    if file_name.contains(" - Placed - ") {
        return Some(FileKind::Call(CallDirection::Placed));
    }
    if file_name.contains(" - Received - ") {
        return Some(FileKind::Call(CallDirection::Received));
    }
    if file_name.contains(" - Missed - ") {
        return Some(FileKind::Call(CallDirection::Missed));
    }
    if file_name.contains(" - Voicemail - ") {
        return Some(FileKind::Voicemail);
    }
    None
}

/// A `tel:` anchor resolved to an identity.
struct TelLink {
    identity: PhoneIdentity,
    name: String,
    number: String,
}

/// Extracts [`MessageRecord`]s from takeout HTML files.
///
/// Display names observed next to numbers feed the shared [`AliasStore`];
/// a stored alias always wins over anything freshly extracted.
pub struct HtmlExtractor<'a> {
    classifier: &'a NumberClassifier,
    aliases: &'a AliasStore,
    own_number: Option<String>,
}

impl<'a> HtmlExtractor<'a> {
    /// Creates an extractor over the shared classifier and alias store.
    pub fn new(classifier: &'a NumberClassifier, aliases: &'a AliasStore) -> Self {
        Self {
            classifier,
            aliases,
            own_number: None,
        }
    }

    /// Sets the export owner's number, so their records are recognized as
    /// self-originated even when the markup does not label them `Me`.
    #[must_use]
    pub fn with_own_number(mut self, number: &str) -> Self {
        self.own_number = Some(phone::normalize(number));
        self
    }

    /// Reads and extracts one export file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the file cannot be read, or a parse error
    /// when its name carries no recognizable kind token.
    pub fn extract_file(&self, path: &Path) -> Result<Vec<MessageRecord>> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let Some(kind) = detect_file_kind(file_name) else {
            return Err(VoicepackError::html_parse(
                format!("no record kind token in file name {file_name:?}"),
                Some(path.to_path_buf()),
            ));
        };
        let content = fs::read_to_string(path)?;
        Ok(self.extract_content(&content, kind, path))
    }

    /// Extracts records from already-loaded HTML.
    ///
    /// Never fails: malformed fields are substituted per-record (timestamps
    /// fall back to the source file's modification time, missing senders to
    /// the thread counterparty, an empty file to a hash-derived identity).
    #[must_use]
    pub fn extract_content(&self, content: &str, kind: FileKind, path: &Path) -> Vec<MessageRecord> {
        match kind {
            FileKind::MessageThread => self.extract_messages(content, path),
            FileKind::Call(direction) => self.extract_call(content, direction, path),
            FileKind::Voicemail => self.extract_voicemail(content, path),
        }
    }

    fn extract_messages(&self, content: &str, path: &Path) -> Vec<MessageRecord> {
        let resolver = TimestampResolver::for_file(path);

        // Thread roster first: the participants block (group threads), then
        // every sender cite, first-seen order, self excluded.
        let mut roster: Vec<PhoneIdentity> = Vec::new();
        if let Some(block) = PARTICIPANTS_DIV.captures(content).and_then(|c| c.get(1)) {
            for link in self.tel_links(block.as_str()) {
                self.note_roster(&mut roster, &link, "");
            }
        }
        let blocks = message_blocks(content);
        for block in &blocks {
            if let Some(link) = self.tel_links(block).into_iter().next() {
                self.note_roster(&mut roster, &link, "");
            }
        }
        if roster.is_empty() {
            roster.push(PhoneIdentity::hashed(file_stem(path)));
        }

        let mut records = Vec::with_capacity(blocks.len());
        for block in &blocks {
            let sender_link = self.tel_links(block).into_iter().next();
            let (sender, is_self) = match sender_link {
                Some(ref link) if self.is_self_link(link) => {
                    let identity = self
                        .classifier
                        .classify(&link.number)
                        .unwrap_or_else(|| roster[0].clone());
                    (identity, true)
                }
                Some(link) => (link.identity, false),
                None => (roster[0].clone(), false),
            };

            let timestamp_ms = resolver.resolve(&timestamp_candidates(block));
            let text = MESSAGE_BODY
                .captures(block)
                .map(|c| unescape_html(c[1].trim()))
                .unwrap_or_default();
            let attachments = block_attachments(block);

            let kind = if attachments.is_empty() && roster.len() < 2 {
                RecordKind::Sms
            } else {
                RecordKind::Mms
            };

            let mut record = MessageRecord::new(sender, kind, timestamp_ms)
                .with_participants(roster.clone())
                .from_self(is_self);
            if !text.is_empty() {
                record = record.with_text(text);
            }
            for attachment in attachments {
                record = record.with_attachment(attachment);
            }
            records.push(record);
        }
        records
    }

    fn extract_call(&self, content: &str, direction: CallDirection, path: &Path) -> Vec<MessageRecord> {
        let (counterparty, timestamp_ms) = self.haudio_fields(content, path);

        let mut record = MessageRecord::new(counterparty.clone(), RecordKind::Call, timestamp_ms)
            .with_participants(vec![counterparty])
            .from_self(direction == CallDirection::Placed)
            .with_call_direction(direction);
        if let Some(duration) = DURATION_TEXT.captures(content) {
            record = record.with_duration(&duration[1]);
        }
        vec![record]
    }

    fn extract_voicemail(&self, content: &str, path: &Path) -> Vec<MessageRecord> {
        let (counterparty, timestamp_ms) = self.haudio_fields(content, path);

        let mut record = MessageRecord::new(counterparty.clone(), RecordKind::Voicemail, timestamp_ms)
            .with_participants(vec![counterparty])
            .from_self(false);
        if let Some(transcript) = FULL_TEXT.captures(content) {
            let text = unescape_html(strip_tags(&transcript[1]).trim());
            if !text.is_empty() {
                record = record.with_text(text);
            }
        }
        if let Some(duration) = DURATION_TEXT.captures(content) {
            record = record.with_duration(&duration[1]);
        }
        vec![record]
    }

    /// Counterparty identity and resolved timestamp shared by call and
    /// voicemail blocks.
    fn haudio_fields(&self, content: &str, path: &Path) -> (PhoneIdentity, i64) {
        // The leading fn span is the block title ("Voicemail from Susan
        // Tang"), which doubles as a naming hint for number-only contacts.
        let title = FN_SPAN
            .captures(content)
            .map(|c| unescape_html(strip_tags(&c[1]).trim()))
            .unwrap_or_default();

        let counterparty = self
            .tel_links(content)
            .into_iter()
            .find(|link| !self.is_self_link(link))
            .map_or_else(
                || PhoneIdentity::hashed(file_stem(path)),
                |link| {
                    self.note_name(&link.identity, &link.name, &title);
                    link.identity
                },
            );

        let resolver = TimestampResolver::for_file(path);
        let timestamp_ms = resolver.resolve(&timestamp_candidates(content));
        (counterparty, timestamp_ms)
    }

    /// Adds a link's identity to the roster (deduplicated, self excluded)
    /// and records its display name.
    fn note_roster(&self, roster: &mut Vec<PhoneIdentity>, link: &TelLink, context: &str) {
        if self.is_self_link(link) {
            return;
        }
        self.note_name(&link.identity, &link.name, context);
        if !roster.contains(&link.identity) {
            roster.push(link.identity.clone());
        }
    }

    /// Records a display name for an identity. A stored alias always wins
    /// over markup; without one, an authoritative `fn` name is stored
    /// directly and free-form context goes through hint extraction.
    fn note_name(&self, identity: &PhoneIdentity, name: &str, context: &str) {
        // A placeholder entry (alias == identity) does not count as stored.
        let stored = self.aliases.get_alias(identity, None);
        if stored != sanitize_alias(identity.as_str()) {
            return;
        }
        if is_display_name(name) {
            self.aliases.add_alias(identity, name);
            return;
        }
        if !context.is_empty() {
            let hinted = self.aliases.get_alias(identity, Some(context));
            if hinted != sanitize_alias(identity.as_str()) {
                self.aliases.add_alias(identity, &hinted);
            }
        }
    }

    /// Resolves every `tel:` anchor in a fragment to an identity.
    fn tel_links(&self, fragment: &str) -> Vec<TelLink> {
        let mut links = Vec::new();
        for caps in TEL_LINK.captures_iter(fragment) {
            let raw = unescape_html(caps[1].trim());
            let name = unescape_html(strip_tags(&caps[2]).trim());
            let identity = self
                .classifier
                .classify(&raw)
                .or_else(|| self.classifier.classify(&name));
            if let Some(identity) = identity {
                links.push(TelLink {
                    identity,
                    number: phone::normalize(&raw),
                    name,
                });
            }
        }
        links
    }

    fn is_self_link(&self, link: &TelLink) -> bool {
        link.name == "Me" || self.own_number.as_deref() == Some(link.number.as_str())
    }
}

impl std::fmt::Debug for HtmlExtractor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlExtractor")
            .field("own_number", &self.own_number)
            .finish_non_exhaustive()
    }
}

/// Seeds the alias store from a takeout `Phones.vcf` contact file.
///
/// Reads `FN` and `TEL` properties per card; every number resolves to the
/// card's formatted name. Malformed cards are skipped.
///
/// # Errors
///
/// Returns an I/O error when the file cannot be read.
pub fn seed_aliases_from_vcf(
    path: &Path,
    classifier: &NumberClassifier,
    aliases: &AliasStore,
) -> Result<usize> {
    let content = fs::read_to_string(path)?;
    let mut seeded = 0;
    let mut name: Option<String> = None;
    let mut numbers: Vec<String> = Vec::new();

    for line in content.lines() {
        let line = line.trim_end();
        if line.eq_ignore_ascii_case("BEGIN:VCARD") {
            name = None;
            numbers.clear();
        } else if line.eq_ignore_ascii_case("END:VCARD") {
            if let Some(card_name) = name.take() {
                for raw in numbers.drain(..) {
                    if let Some(identity) = classifier.classify(&raw) {
                        aliases.add_alias(&identity, &card_name);
                        seeded += 1;
                    }
                }
            }
            numbers.clear();
        } else if let Some(value) = line.strip_prefix("FN:") {
            let value = value.trim();
            if is_display_name(value) {
                name = Some(value.to_string());
            }
        } else if let Some((property, value)) = line.split_once(':') {
            // TEL may carry grouping and type parameters: item1.TEL;TYPE=CELL.
            let base = property.rsplit('.').next().unwrap_or(property);
            if base == "TEL" || base.starts_with("TEL;") {
                numbers.push(value.trim().to_string());
            }
        }
    }
    Ok(seeded)
}

/// Splits thread HTML into per-message slices, each starting at a message
/// div and running to the next one.
fn message_blocks(content: &str) -> Vec<&str> {
    const MARKER: &str = "<div class=\"message\">";
    let starts: Vec<usize> = content.match_indices(MARKER).map(|(i, _)| i).collect();
    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(content.len());
            &content[start..end]
        })
        .collect()
}

fn timestamp_candidates(block: &str) -> Vec<TimestampCandidate> {
    let mut candidates = Vec::new();
    if let Some(caps) = PUBLISHED_TITLE.captures(block) {
        candidates.push(TimestampCandidate::published(unescape_html(&caps[1])));
    }
    if let Some(caps) = DT_TITLE.captures(block) {
        candidates.push(TimestampCandidate::dt(unescape_html(&caps[1])));
    }
    candidates
}

fn block_attachments(block: &str) -> Vec<Attachment> {
    let mut attachments = Vec::new();
    for caps in IMAGE_SRC.captures_iter(block) {
        attachments.push(Attachment::new(
            AttachmentKind::Image,
            unescape_html(&caps[1]),
        ));
    }
    for caps in VCARD_HREF.captures_iter(block) {
        attachments.push(Attachment::new(
            AttachmentKind::VCard,
            unescape_html(&caps[1]),
        ));
    }
    attachments
}

/// A name worth storing: non-empty, not the self marker, and not just a
/// formatted rendering of the number itself.
fn is_display_name(name: &str) -> bool {
    !name.is_empty()
        && name != "Me"
        && !name
            .chars()
            .all(|c| c.is_ascii_digit() || "+()-. \u{a0}".contains(c))
}

fn strip_tags(fragment: &str) -> String {
    TAG.replace_all(fragment, "").to_string()
}

fn unescape_html(text: &str) -> String {
    // &amp; last, so double-escaped entities stay escaped once.
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn file_stem(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("export")
}
