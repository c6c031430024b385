//! SMS-backup-schema XML rendering.
//!
//! Each record renders as one element: flat self-closing `<sms>` for plain
//! messages, composite `<mms>` with nested part/addr elements for group and
//! attachment-bearing messages, and `<call>` for call-log entries. Voicemail
//! renders as a `<call>` with type code 4, carrying its transcript in the
//! `body` attribute so no text is lost.
//!
//! A conversation document is the standard backup envelope: an XML
//! declaration and one `<smses count="...">` root wrapping every fragment,
//! calls included.

use crate::record::{Attachment, AttachmentKind, CallDirection, MessageRecord, RecordKind};

/// Received message type code.
const SMS_TYPE_RECEIVED: u32 = 1;
/// Sent message type code.
const SMS_TYPE_SENT: u32 = 2;

/// MMS message box codes (received / sent).
const MMS_BOX_RECEIVED: u32 = 1;
const MMS_BOX_SENT: u32 = 2;
/// M-Retrieve.conf: an MMS received by the owner.
const MMS_TYPE_RETRIEVE: u32 = 132;
/// M-Send.req: an MMS sent by the owner.
const MMS_TYPE_SEND: u32 = 128;

/// Call type codes.
const CALL_TYPE_RECEIVED: u32 = 1;
const CALL_TYPE_PLACED: u32 = 2;
const CALL_TYPE_MISSED: u32 = 3;
const CALL_TYPE_VOICEMAIL: u32 = 4;

/// PDU address roles for MMS addr elements.
const ADDR_TYPE_FROM: u32 = 137;
const ADDR_TYPE_TO: u32 = 151;

/// Renders one record as an XML fragment.
///
/// Plain single-recipient texts render as `<sms>`; anything with multiple
/// counterparties or attachments becomes `<mms>`; calls and voicemails
/// become `<call>`.
#[must_use]
pub fn render_record(record: &MessageRecord) -> String {
    match record.kind() {
        RecordKind::Sms if !record.is_group() && !record.has_attachments() => render_sms(record),
        RecordKind::Sms | RecordKind::Mms => render_mms(record),
        RecordKind::Call => render_call(record),
        RecordKind::Voicemail => render_voicemail(record),
    }
}

/// Wraps rendered fragments in the backup document envelope.
#[must_use]
pub fn document(fragments: &[String]) -> String {
    let mut out = String::with_capacity(128 + fragments.iter().map(String::len).sum::<usize>());
    out.push_str("<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>\n");
    out.push_str(&format!("<smses count=\"{}\">\n", fragments.len()));
    for fragment in fragments {
        out.push_str("  ");
        out.push_str(fragment);
        out.push('\n');
    }
    out.push_str("</smses>\n");
    out
}

fn render_sms(record: &MessageRecord) -> String {
    let direction = if record.is_from_self() {
        SMS_TYPE_SENT
    } else {
        SMS_TYPE_RECEIVED
    };
    format!(
        "<sms protocol=\"0\" address=\"{}\" date=\"{}\" type=\"{}\" body=\"{}\" read=\"1\" />",
        escape_xml(primary_address(record)),
        record.timestamp_ms(),
        direction,
        escape_xml(record.text()),
    )
}

fn render_mms(record: &MessageRecord) -> String {
    let (msg_box, m_type) = if record.is_from_self() {
        (MMS_BOX_SENT, MMS_TYPE_SEND)
    } else {
        (MMS_BOX_RECEIVED, MMS_TYPE_RETRIEVE)
    };

    let addresses: Vec<&str> = record
        .participants()
        .iter()
        .map(|p| p.as_str())
        .collect();
    let joined = addresses.join("~");

    let mut out = format!(
        "<mms address=\"{}\" date=\"{}\" msg_box=\"{}\" m_type=\"{}\">",
        escape_xml(&joined),
        record.timestamp_ms(),
        msg_box,
        m_type,
    );

    out.push_str("<parts>");
    let mut seq = 0;
    if !record.text().is_empty() {
        out.push_str(&format!(
            "<part seq=\"{seq}\" ct=\"text/plain\" text=\"{}\" />",
            escape_xml(record.text())
        ));
        seq += 1;
    }
    for attachment in record.attachments() {
        out.push_str(&format!(
            "<part seq=\"{seq}\" ct=\"{}\" cl=\"{}\" />",
            content_type(attachment),
            escape_xml(attachment.src()),
        ));
        seq += 1;
    }
    out.push_str("</parts>");

    out.push_str("<addrs>");
    for participant in record.participants() {
        let role = if !record.is_from_self() && participant == record.sender() {
            ADDR_TYPE_FROM
        } else {
            ADDR_TYPE_TO
        };
        out.push_str(&format!(
            "<addr address=\"{}\" type=\"{role}\" charset=\"106\" />",
            escape_xml(participant.as_str()),
        ));
    }
    out.push_str("</addrs>");

    out.push_str("</mms>");
    out
}

fn render_call(record: &MessageRecord) -> String {
    let type_code = match record.call_direction() {
        Some(CallDirection::Placed) => CALL_TYPE_PLACED,
        Some(CallDirection::Missed) => CALL_TYPE_MISSED,
        Some(CallDirection::Received) | None => CALL_TYPE_RECEIVED,
    };
    format!(
        "<call number=\"{}\" date=\"{}\" type=\"{type_code}\" duration=\"{}\" />",
        escape_xml(primary_address(record)),
        record.timestamp_ms(),
        duration_seconds(record.duration().unwrap_or("")),
    )
}

fn render_voicemail(record: &MessageRecord) -> String {
    let mut out = format!(
        "<call number=\"{}\" date=\"{}\" type=\"{CALL_TYPE_VOICEMAIL}\" duration=\"{}\"",
        escape_xml(primary_address(record)),
        record.timestamp_ms(),
        duration_seconds(record.duration().unwrap_or("")),
    );
    if !record.text().is_empty() {
        out.push_str(&format!(" body=\"{}\"", escape_xml(record.text())));
    }
    out.push_str(" />");
    out
}

/// Returns the counterparty address for single-recipient elements.
fn primary_address(record: &MessageRecord) -> &str {
    record
        .participants()
        .first()
        .map_or_else(|| record.sender().as_str(), |p| p.as_str())
}

/// Maps an attachment to an MMS part content type.
fn content_type(attachment: &Attachment) -> &'static str {
    match attachment.kind() {
        AttachmentKind::Image => {
            let src = attachment.src().to_lowercase();
            if src.ends_with(".png") {
                "image/png"
            } else if src.ends_with(".gif") {
                "image/gif"
            } else {
                "image/jpeg"
            }
        }
        AttachmentKind::VCard => "text/x-vCard",
        AttachmentKind::Audio => "audio/mpeg",
    }
}

/// Parses `(HH:MM:SS)`-style duration text into whole seconds.
///
/// Unparseable input yields zero; the call element still renders.
#[must_use]
pub fn duration_seconds(raw: &str) -> u64 {
    let cleaned = raw.trim().trim_start_matches('(').trim_end_matches(')');
    if cleaned.is_empty() {
        return 0;
    }

    let mut total: u64 = 0;
    for part in cleaned.split(':') {
        let Ok(value) = part.trim().parse::<u64>() else {
            return 0;
        };
        total = total * 60 + value;
    }
    total
}

/// Escapes text for use inside an XML attribute value.
#[must_use]
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
