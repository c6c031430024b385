//! Unknown-identity CSV report.
//!
//! After a run, every identity that never resolved to a human-readable
//! alias (no contact card entry, no usable display name in the markup)
//! lands in a CSV for manual review. Columns: `phone_number`,
//! `display_name`, `is_spam`, `notes`.

use std::fs::File;
use std::path::Path;

use crate::alias::{AliasStore, sanitize_alias};
use crate::error::Result;
use crate::phone::{self, PhoneIdentity};

/// Writes the unknown-identity report.
///
/// `encountered` is every identity seen during the run; only those whose
/// display alias is still just the identity itself are reported. Rows are
/// sorted and deduplicated. Returns the number of rows written.
///
/// # Errors
///
/// Returns an error when the report file cannot be created or written.
pub fn write_unknown_report(
    encountered: &[PhoneIdentity],
    aliases: &AliasStore,
    path: &Path,
) -> Result<usize> {
    let mut unknown: Vec<&PhoneIdentity> = encountered
        .iter()
        .filter(|identity| is_unknown(identity, aliases))
        .collect();
    unknown.sort_unstable();
    unknown.dedup();

    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(["phone_number", "display_name", "is_spam", "notes"])?;

    for identity in &unknown {
        let display = aliases.get_alias(identity, None);
        let spam = if aliases.is_filtered(identity) { "true" } else { "false" };
        let notes = identity_notes(identity);
        writer.write_record([identity.as_str(), display.as_str(), spam, notes.as_str()])?;
    }
    writer.flush()?;
    Ok(unknown.len())
}

/// An identity is unknown while its resolved alias is nothing more than
/// the (sanitized) identity string. Placeholder entries synthesized for
/// spam markers still count as unknown.
fn is_unknown(identity: &PhoneIdentity, aliases: &AliasStore) -> bool {
    aliases.get_alias(identity, None) == sanitize_alias(identity.as_str())
}

/// Flags worth a manual look before assigning a name.
fn identity_notes(identity: &PhoneIdentity) -> String {
    let mut notes: Vec<&str> = Vec::new();
    if identity.is_hashed() {
        notes.push("no caller id");
    }
    if identity.is_number() {
        if phone::is_toll_free(identity.as_str()) {
            notes.push("toll-free");
        }
        if phone::is_short_code(identity.as_str()) {
            notes.push("short code");
        }
    }
    notes.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn number(s: &str) -> PhoneIdentity {
        PhoneIdentity::Number(s.to_string())
    }

    fn report_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_reports_only_unaliased_identities() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unknown.csv");
        let aliases = AliasStore::in_memory();

        let susan = number("+12125550000");
        aliases.add_alias(&susan, "Susan Tang");
        let stranger = number("+13475550101");

        let rows =
            write_unknown_report(&[susan, stranger.clone()], &aliases, &path).unwrap();
        assert_eq!(rows, 1);

        let lines = report_lines(&path);
        assert_eq!(lines[0], "phone_number,display_name,is_spam,notes");
        assert!(lines[1].starts_with("+13475550101,"));
        assert!(!fs::read_to_string(&path).unwrap().contains("+12125550000"));
    }

    #[test]
    fn test_spam_marked_identity_stays_in_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unknown.csv");
        let aliases = AliasStore::in_memory();

        let spammer = number("+18885550199");
        aliases.mark_filtered(&spammer);

        let rows = write_unknown_report(&[spammer], &aliases, &path).unwrap();
        assert_eq!(rows, 1);

        let lines = report_lines(&path);
        assert!(lines[1].contains(",true,"));
        assert!(lines[1].contains("toll-free"));
    }

    #[test]
    fn test_notes_flag_short_codes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unknown.csv");
        let aliases = AliasStore::in_memory();

        write_unknown_report(&[number("88202")], &aliases, &path).unwrap();
        let lines = report_lines(&path);
        assert!(lines[1].contains("short code"));
    }

    #[test]
    fn test_notes_flag_synthesized_identities() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unknown.csv");
        let aliases = AliasStore::in_memory();

        let unknown = PhoneIdentity::hashed("some export file");
        write_unknown_report(&[unknown], &aliases, &path).unwrap();
        let lines = report_lines(&path);
        assert!(lines[1].contains("no caller id"));
    }

    #[test]
    fn test_duplicates_collapse_to_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unknown.csv");
        let aliases = AliasStore::in_memory();

        let id = number("+13475550101");
        let rows = write_unknown_report(&[id.clone(), id.clone(), id], &aliases, &path).unwrap();
        assert_eq!(rows, 1);
        assert_eq!(report_lines(&path).len(), 2);
    }

    #[test]
    fn test_empty_run_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unknown.csv");
        let aliases = AliasStore::in_memory();

        let rows = write_unknown_report(&[], &aliases, &path).unwrap();
        assert_eq!(rows, 0);
        assert_eq!(report_lines(&path).len(), 1);
    }
}
