//! Run orchestration.
//!
//! [`PipelineContext`] wires the number classifier, alias store,
//! conversation manager, and optional metadata cache together for a single
//! run; nothing lives in global state. [`run`] drives the whole
//! conversion: discover export files, parse them on a worker pool, route
//! records into conversation streams, finalize, classify commercial
//! conversations, and write the index and the unknown-identity report.
//!
//! Failure policy follows the rest of the crate: per-record problems are
//! substituted inline, a failing input file is skipped and reported, cache
//! and alias persistence degrade without stopping the run. Only output
//! directory creation is fatal up front.
//!
//! [`run`]: PipelineContext::run

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::alias::{AliasStore, sanitize_alias};
use crate::cache::MetadataCache;
use crate::commercial::{self, ConversationMessage};
use crate::config::ConvertConfig;
use crate::conversation::ConversationResolver;
use crate::error::Result;
use crate::extract::{self, HtmlExtractor, detect_file_kind};
use crate::manager::{BufferedMessage, ConversationManager, FinalizedConversation};
use crate::output::{ConversionStats, IndexEntry};
use crate::output::xml;
use crate::phone::{NumberClassifier, PhoneIdentity};
use crate::record::MessageRecord;
use crate::report;

/// Sender label standing in for the export owner during classification.
const SELF_IDENTIFIER: &str = "Me";

/// An input file the run could not process, with the reason.
#[derive(Debug)]
pub struct SkippedFile {
    /// Path of the skipped file.
    pub path: PathBuf,
    /// Human-readable failure description.
    pub reason: String,
}

/// Summary of one completed run.
#[derive(Debug)]
pub struct RunReport {
    /// Input files successfully processed.
    pub files_processed: usize,
    /// Input files skipped after errors.
    pub skipped: Vec<SkippedFile>,
    /// Files served from the metadata cache.
    pub cache_hits: usize,
    /// Finalized conversations (before any commercial drop).
    pub conversations: usize,
    /// Conversations the classifier flagged as commercial.
    pub commercial: usize,
    /// Flagged conversation artifacts deleted from the output directory.
    pub dropped: usize,
    /// Rows in the unknown-identity report.
    pub unknown_identities: usize,
    /// Aggregated record and attachment totals.
    pub stats: ConversionStats,
    /// Wall time for the whole run.
    pub elapsed: Duration,
    /// Path of the generated index.
    pub index_path: PathBuf,
    /// Non-fatal problems worth surfacing (flush failures and the like).
    pub warnings: Vec<String>,
}

impl RunReport {
    /// Total records across all conversations.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.stats.total_records()
    }
}

/// What the cache remembers per input file: the parsed records plus the
/// display names observed while parsing, so warm runs still feed the
/// alias store.
#[derive(Debug, Serialize, Deserialize)]
struct CachedFile {
    records: Vec<MessageRecord>,
    names: HashMap<String, String>,
}

struct FileSummary {
    cache_hit: bool,
    encountered: Vec<PhoneIdentity>,
}

struct FileOutcome {
    path: PathBuf,
    result: Result<FileSummary>,
}

/// All shared state for one conversion run.
pub struct PipelineContext {
    config: ConvertConfig,
    classifier: NumberClassifier,
    aliases: AliasStore,
    manager: ConversationManager,
    cache: Option<MetadataCache>,
    setup_warnings: Vec<String>,
}

impl PipelineContext {
    /// Builds the run context: creates the output directory, opens the
    /// alias store and (if enabled) the metadata cache.
    ///
    /// # Errors
    ///
    /// Returns a fatal error when the output directory cannot be created.
    /// An unreadable alias store degrades to in-memory operation with a
    /// warning instead of failing.
    pub fn new(config: ConvertConfig) -> Result<Self> {
        let manager = ConversationManager::new(config.output_dir.clone(), config.format)?
            .with_max_open_handles(config.max_open_handles)
            .with_spill_threshold(config.spill_threshold);

        let mut setup_warnings = Vec::new();
        let aliases = match AliasStore::open(config.alias_path()) {
            Ok(store) => store,
            Err(e) => {
                setup_warnings.push(format!(
                    "alias store {} unreadable ({e}), continuing in memory",
                    config.alias_path().display()
                ));
                AliasStore::in_memory()
            }
        };

        let cache = config.use_cache.then(|| {
            let cache = MetadataCache::open(config.cache_path(), config.input_dir.clone());
            cache.invalidate_stale(config.cache_max_age_days);
            cache
        });

        Ok(Self {
            classifier: NumberClassifier::with_policy(config.filter_policy),
            config,
            aliases,
            manager,
            cache,
            setup_warnings,
        })
    }

    /// Returns the run configuration.
    #[must_use]
    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Executes the whole conversion.
    ///
    /// The alias store and cache are flushed on every exit path, including
    /// failures partway through.
    ///
    /// # Errors
    ///
    /// Returns an error when input discovery fails or output artifacts
    /// cannot be written.
    pub fn run(&self) -> Result<RunReport> {
        let started = Instant::now();
        let result = self.run_inner(started);

        let mut flush_warnings = Vec::new();
        self.flush_stores(&mut flush_warnings);

        match result {
            Ok(mut report) => {
                report.warnings.extend(flush_warnings);
                report.elapsed = started.elapsed();
                Ok(report)
            }
            Err(e) => Err(e),
        }
    }

    fn run_inner(&self, started: Instant) -> Result<RunReport> {
        let mut warnings = self.setup_warnings.clone();

        let input = discover_input(&self.config.input_dir)?;
        for contacts in &input.contact_files {
            if let Err(e) = extract::seed_aliases_from_vcf(contacts, &self.classifier, &self.aliases)
            {
                warnings.push(format!("contact file {} skipped: {e}", contacts.display()));
            }
        }

        let outcomes: Vec<FileOutcome> = input
            .export_files
            .par_iter()
            .map(|path| self.process_file(path))
            .collect();

        let mut skipped = Vec::new();
        let mut encountered: HashSet<PhoneIdentity> = HashSet::new();
        let mut files_processed = 0;
        let mut cache_hits = 0;
        for outcome in outcomes {
            match outcome.result {
                Ok(summary) => {
                    files_processed += 1;
                    cache_hits += usize::from(summary.cache_hit);
                    encountered.extend(summary.encountered);
                }
                Err(e) => skipped.push(SkippedFile {
                    path: outcome.path,
                    reason: e.to_string(),
                }),
            }
        }

        let conversations = self.manager.finalize()?;
        let conversation_count = conversations.len();

        let mut stats = ConversionStats::default();
        let mut entries = Vec::with_capacity(conversation_count);
        let mut commercial = 0;
        let mut dropped = 0;
        for conversation in &conversations {
            stats.merge(&conversation.stats());
            let flagged = self.classify_conversation(conversation);
            if flagged {
                commercial += 1;
                self.mark_conversation_filtered(conversation);
                if self.config.drop_commercial {
                    if let Err(e) = fs::remove_file(conversation.path()) {
                        warnings.push(format!(
                            "could not delete {}: {e}",
                            conversation.path().display()
                        ));
                    }
                    dropped += 1;
                    continue;
                }
            }
            entries.push(IndexEntry {
                key: conversation.key().to_string(),
                file_name: conversation.file_name().to_string(),
                message_count: conversation.message_count(),
                commercial: flagged,
            });
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        let index_path = self.manager.generate_index(&entries, &stats, started.elapsed())?;

        let encountered: Vec<PhoneIdentity> = encountered.into_iter().collect();
        let unknown_identities =
            report::write_unknown_report(&encountered, &self.aliases, &self.config.report_path())?;

        Ok(RunReport {
            files_processed,
            skipped,
            cache_hits,
            conversations: conversation_count,
            commercial,
            dropped,
            unknown_identities,
            stats,
            elapsed: started.elapsed(),
            index_path,
            warnings,
        })
    }

    /// Parses (or cache-loads) one input file and routes its records.
    fn process_file(&self, path: &Path) -> FileOutcome {
        let outcome = self.process_file_inner(path);
        FileOutcome {
            path: path.to_path_buf(),
            result: outcome,
        }
    }

    fn process_file_inner(&self, path: &Path) -> Result<FileSummary> {
        let key = relative_key(path, &self.config.input_dir);
        let (records, cache_hit) = self.load_records(path, &key)?;

        let resolver = ConversationResolver::new(&self.aliases);
        let mut summary = FileSummary {
            cache_hit,
            encountered: Vec::new(),
        };
        for record in &records {
            for participant in record.participants() {
                if !summary.encountered.contains(participant) {
                    summary.encountered.push(participant.clone());
                }
            }

            let conversation = resolver.resolve_key(record.participants(), record.is_group());
            let fragment = xml::render_record(record);
            let sender_alias = self.aliases.get_alias(record.sender(), None);
            let message = BufferedMessage::from_record(record, sender_alias, fragment);
            self.manager.write_message(&conversation, message)?;
        }
        Ok(summary)
    }

    /// Loads records through the cache when possible, re-parsing on miss.
    fn load_records(&self, path: &Path, key: &str) -> Result<(Vec<MessageRecord>, bool)> {
        if let Some(cache) = &self.cache {
            if let Some(value) = cache.get(key) {
                if let Ok(cached) = serde_json::from_value::<CachedFile>(value) {
                    self.replay_names(&cached.names);
                    return Ok((cached.records, true));
                }
                // An undecodable payload is just a miss; re-parse below.
            }
        }

        let mut extractor = HtmlExtractor::new(&self.classifier, &self.aliases);
        if let Some(own) = &self.config.own_number {
            extractor = extractor.with_own_number(own);
        }
        let records = extractor.extract_file(path)?;

        if let Some(cache) = &self.cache {
            let names = self.snapshot_names(&records);
            if let Ok(value) = serde_json::to_value(CachedFile {
                records: records.clone(),
                names,
            }) {
                cache.put(key, value);
            }
        }
        Ok((records, false))
    }

    /// Captures the resolved display names for a file's identities, so a
    /// later cache hit can restore them without re-parsing markup.
    fn snapshot_names(&self, records: &[MessageRecord]) -> HashMap<String, String> {
        let mut names = HashMap::new();
        for record in records {
            for participant in record.participants() {
                let alias = self.aliases.get_alias(participant, None);
                if alias != sanitize_alias(participant.as_str()) {
                    names.insert(participant.as_str().to_string(), alias);
                }
            }
        }
        names
    }

    /// Re-registers cached display names, never overriding a real stored
    /// alias.
    fn replay_names(&self, names: &HashMap<String, String>) {
        for (identity, name) in names {
            if let Some(identity) = self.classifier.classify(identity) {
                let stored = self.aliases.get_alias(&identity, None);
                if stored == sanitize_alias(identity.as_str()) {
                    self.aliases.add_alias(&identity, name);
                }
            }
        }
    }

    /// Runs the commercial classifier over a finalized conversation.
    fn classify_conversation(&self, conversation: &FinalizedConversation) -> bool {
        let messages: Vec<ConversationMessage> = conversation
            .messages()
            .iter()
            .map(|m| {
                let sender = if m.is_self() { SELF_IDENTIFIER } else { m.sender() };
                ConversationMessage::new(sender, m.text(), m.timestamp_ms())
            })
            .collect();
        commercial::is_commercial(&messages, SELF_IDENTIFIER)
    }

    /// Flags every counterparty of a commercial conversation in the alias
    /// store, feeding the report's `is_spam` column and future runs.
    fn mark_conversation_filtered(&self, conversation: &FinalizedConversation) {
        let mut seen = HashSet::new();
        for message in conversation.messages() {
            if message.is_self() || !seen.insert(message.sender().to_string()) {
                continue;
            }
            if let Some(identity) = self.classifier.classify(message.sender()) {
                self.aliases.mark_filtered(&identity);
            }
        }
    }

    fn flush_stores(&self, warnings: &mut Vec<String>) {
        if let Err(e) = self.aliases.flush() {
            warnings.push(format!("alias store flush failed: {e}"));
        }
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.flush() {
                warnings.push(format!("cache flush failed: {e}"));
            }
        }
    }
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct DiscoveredInput {
    export_files: Vec<PathBuf>,
    contact_files: Vec<PathBuf>,
}

/// Walks the input directory for export HTML files and contact cards.
fn discover_input(dir: &Path) -> Result<DiscoveredInput> {
    let mut input = DiscoveredInput {
        export_files: Vec::new(),
        contact_files: Vec::new(),
    };
    collect_input(dir, &mut input)?;
    input.export_files.sort();
    input.contact_files.sort();
    Ok(input)
}

fn collect_input(dir: &Path, input: &mut DiscoveredInput) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_input(&path, input)?;
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.eq_ignore_ascii_case("Phones.vcf") {
            input.contact_files.push(path);
        } else if detect_file_kind(name).is_some() {
            input.export_files.push(path);
        }
    }
    Ok(())
}

/// Cache key for an input file: its path relative to the input directory.
fn relative_key(path: &Path, input_dir: &Path) -> String {
    path.strip_prefix(input_dir)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
