//! Normalized record type for all export entries.
//!
//! This module provides [`MessageRecord`], the value type the extraction
//! layer produces for every message, call, and voicemail in an export.
//! Downstream components (conversation routing, rendering, classification)
//! consume these records read-only and never touch markup types.
//!
//! # Example
//!
//! ```
//! use voicepack::phone::PhoneIdentity;
//! use voicepack::record::{MessageRecord, RecordKind};
//!
//! let sender = PhoneIdentity::Number("+12125551234".to_string());
//! let record = MessageRecord::new(sender.clone(), RecordKind::Sms, 1_650_000_000_000)
//!     .with_text("Hello!")
//!     .with_participants(vec![sender]);
//!
//! assert_eq!(record.text(), "Hello!");
//! assert!(!record.is_group());
//! ```

use serde::{Deserialize, Serialize};

use crate::phone::PhoneIdentity;

/// The kind of export entry a record was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Plain text message.
    Sms,
    /// Multimedia or group message.
    Mms,
    /// Phone call log entry.
    Call,
    /// Voicemail with optional transcript.
    Voicemail,
}

impl RecordKind {
    /// Returns `true` for call-log kinds (calls and voicemails).
    #[must_use]
    pub fn is_call_like(self) -> bool {
        matches!(self, Self::Call | Self::Voicemail)
    }
}

/// Direction of a call-log entry, taken from the export file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    /// Outgoing call.
    Placed,
    /// Answered incoming call.
    Received,
    /// Unanswered incoming call.
    Missed,
}

/// Attachment category, detected from the source markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// Inline or linked image.
    Image,
    /// Contact card.
    VCard,
    /// Audio clip (voicemail recordings, MMS audio).
    Audio,
}

/// A single attachment reference carried by a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    kind: AttachmentKind,
    src: String,
}

impl Attachment {
    /// Creates an attachment reference.
    #[must_use]
    pub fn new(kind: AttachmentKind, src: impl Into<String>) -> Self {
        Self {
            kind,
            src: src.into(),
        }
    }

    /// Returns the attachment category.
    #[must_use]
    pub fn kind(&self) -> AttachmentKind {
        self.kind
    }

    /// Returns the source reference (file name or URL) from the markup.
    #[must_use]
    pub fn src(&self) -> &str {
        &self.src
    }
}

/// A normalized export entry.
///
/// `participants` holds the conversation counterparties in first-seen order,
/// deduplicated, never including the export owner. The sender is the owner
/// when `sender_is_self` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    participants: Vec<PhoneIdentity>,
    sender: PhoneIdentity,
    sender_is_self: bool,
    timestamp_ms: i64,
    kind: RecordKind,
    #[serde(default)]
    text: String,
    #[serde(default)]
    attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    call_direction: Option<CallDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<String>,
}

impl MessageRecord {
    /// Creates a record with empty text and no participants.
    ///
    /// Builder methods fill in the rest; see the module example.
    #[must_use]
    pub fn new(sender: PhoneIdentity, kind: RecordKind, timestamp_ms: i64) -> Self {
        Self {
            participants: Vec::new(),
            sender,
            sender_is_self: false,
            timestamp_ms,
            kind,
            text: String::new(),
            attachments: Vec::new(),
            call_direction: None,
            duration: None,
        }
    }

    /// Sets the message text or voicemail transcript.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Sets the counterparty list (first-seen order, deduplicated).
    #[must_use]
    pub fn with_participants(mut self, participants: Vec<PhoneIdentity>) -> Self {
        self.participants = participants;
        self
    }

    /// Marks the record as sent by the export owner.
    #[must_use]
    pub fn from_self(mut self, sender_is_self: bool) -> Self {
        self.sender_is_self = sender_is_self;
        self
    }

    /// Adds one attachment reference.
    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Sets the call direction (call-log kinds only).
    #[must_use]
    pub fn with_call_direction(mut self, direction: CallDirection) -> Self {
        self.call_direction = Some(direction);
        self
    }

    /// Sets the call or voicemail duration string, e.g. `(00:01:23)`.
    #[must_use]
    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    /// Returns the conversation counterparties.
    #[must_use]
    pub fn participants(&self) -> &[PhoneIdentity] {
        &self.participants
    }

    /// Returns the sending identity.
    #[must_use]
    pub fn sender(&self) -> &PhoneIdentity {
        &self.sender
    }

    /// Returns `true` if the export owner sent this record.
    #[must_use]
    pub fn is_from_self(&self) -> bool {
        self.sender_is_self
    }

    /// Returns the resolved Unix-millisecond timestamp.
    #[must_use]
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// Returns the record kind.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Returns the message text (empty for most calls).
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the attachment references.
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Returns the call direction, if any.
    #[must_use]
    pub fn call_direction(&self) -> Option<CallDirection> {
        self.call_direction
    }

    /// Returns the duration string, if any.
    #[must_use]
    pub fn duration(&self) -> Option<&str> {
        self.duration.as_deref()
    }

    /// Returns `true` when the record belongs to a group conversation.
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.participants.len() >= 2
    }

    /// Returns `true` if the record carries attachments.
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Counts attachments of one category.
    #[must_use]
    pub fn attachment_count(&self, kind: AttachmentKind) -> usize {
        self.attachments.iter().filter(|a| a.kind() == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(s: &str) -> PhoneIdentity {
        PhoneIdentity::Number(s.to_string())
    }

    #[test]
    fn test_new_defaults() {
        let record = MessageRecord::new(number("+12125551234"), RecordKind::Sms, 1_000);
        assert_eq!(record.timestamp_ms(), 1_000);
        assert_eq!(record.kind(), RecordKind::Sms);
        assert_eq!(record.text(), "");
        assert!(record.participants().is_empty());
        assert!(!record.is_from_self());
        assert!(!record.has_attachments());
        assert!(record.duration().is_none());
    }

    #[test]
    fn test_builder_chain() {
        let record = MessageRecord::new(number("+12125551234"), RecordKind::Mms, 2_000)
            .with_text("photo attached")
            .with_participants(vec![number("+12125551234"), number("+13105556789")])
            .from_self(true)
            .with_attachment(Attachment::new(AttachmentKind::Image, "IMG_001.jpg"));

        assert_eq!(record.text(), "photo attached");
        assert!(record.is_from_self());
        assert!(record.is_group());
        assert_eq!(record.attachments().len(), 1);
        assert_eq!(record.attachments()[0].src(), "IMG_001.jpg");
        assert_eq!(record.attachment_count(AttachmentKind::Image), 1);
        assert_eq!(record.attachment_count(AttachmentKind::VCard), 0);
    }

    #[test]
    fn test_call_record() {
        let record = MessageRecord::new(number("+12125551234"), RecordKind::Call, 3_000)
            .with_call_direction(CallDirection::Missed)
            .with_duration("(00:00:00)");

        assert!(record.kind().is_call_like());
        assert_eq!(record.call_direction(), Some(CallDirection::Missed));
        assert_eq!(record.duration(), Some("(00:00:00)"));
    }

    #[test]
    fn test_kind_predicates() {
        assert!(RecordKind::Call.is_call_like());
        assert!(RecordKind::Voicemail.is_call_like());
        assert!(!RecordKind::Sms.is_call_like());
        assert!(!RecordKind::Mms.is_call_like());
    }

    #[test]
    fn test_serde_roundtrip() {
        let record = MessageRecord::new(number("+12125551234"), RecordKind::Voicemail, 4_000)
            .with_text("transcript text")
            .with_participants(vec![number("+12125551234")])
            .with_duration("(00:01:23)");

        let json = serde_json::to_string(&record).unwrap();
        let parsed: MessageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, parsed);
    }

    #[test]
    fn test_serde_omits_empty_optionals() {
        let record = MessageRecord::new(number("+12125551234"), RecordKind::Sms, 5_000);
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("duration"));
        assert!(!json.contains("call_direction"));
    }
}
