//! Conversation stream lifecycle management.
//!
//! [`ConversationManager`] owns every per-conversation output stream for a
//! run. Records buffer in memory per conversation; once a buffer crosses the
//! spill threshold it flushes to an on-disk JSON-lines spill file through a
//! bounded pool of append-mode handles, evicting the least-recently-used
//! open stream when the pool is full. Thousands of conversations therefore
//! never translate into thousands of simultaneously open files, and nothing
//! is lost on eviction: the spill file is reopened in append mode on the
//! next flush.
//!
//! [`finalize`] closes each stream exactly once: it merges the spill with
//! the in-memory tail, sorts by timestamp, renders the whole conversation in
//! the configured format, writes the artifact in a single pass, and deletes
//! the spill. A second call is a no-op. Writes after finalization fail with
//! a stream-closed error.
//!
//! All mutating operations serialize behind one internal lock, and
//! existence checks share the critical section with stream creation, so
//! concurrent workers can never race a conversation into two streams.
//!
//! [`finalize`]: ConversationManager::finalize

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::conversation::ConversationKey;
use crate::error::{Result, VoicepackError};
use crate::output::html;
use crate::output::xml;
use crate::output::{ConversionStats, IndexEntry, OutputFormat};
use crate::record::{MessageRecord, RecordKind};

/// Default bound on simultaneously open spill handles.
pub const DEFAULT_MAX_OPEN_HANDLES: usize = 32;

/// Default per-conversation buffer size before spilling to disk.
pub const DEFAULT_SPILL_THRESHOLD: usize = 512;

/// Subdirectory of the output directory holding spill files.
const SPILL_DIR: &str = ".spill";

/// One record as buffered inside a conversation stream.
///
/// Carries the rendered XML fragment plus the fields the table renderer and
/// the commercial classifier need after the source record is gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferedMessage {
    timestamp_ms: i64,
    kind: RecordKind,
    sender: String,
    sender_label: String,
    is_self: bool,
    text: String,
    fragment: String,
}

impl BufferedMessage {
    /// Builds a buffered message from a record, its resolved sender alias,
    /// and its rendered fragment.
    #[must_use]
    pub fn from_record(
        record: &MessageRecord,
        sender_label: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        Self {
            timestamp_ms: record.timestamp_ms(),
            kind: record.kind(),
            sender: record.sender().as_str().to_string(),
            sender_label: sender_label.into(),
            is_self: record.is_from_self(),
            text: record.text().to_string(),
            fragment: fragment.into(),
        }
    }

    /// Returns the Unix-millisecond timestamp.
    #[must_use]
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// Returns the record kind.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Returns the sender identity string.
    #[must_use]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Returns `true` for records sent by the export owner.
    #[must_use]
    pub fn is_self(&self) -> bool {
        self.is_self
    }

    /// Returns the message text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the rendered XML fragment.
    #[must_use]
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Returns the sender cell label: `Me` for self-originated records,
    /// the resolved alias otherwise.
    #[must_use]
    pub fn display_sender(&self) -> &str {
        if self.is_self { "Me" } else { &self.sender_label }
    }
}

/// Stream lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Open,
    Finalizing,
    Closed,
}

#[derive(Debug)]
struct ConversationStream {
    key: ConversationKey,
    state: StreamState,
    buffer: Vec<BufferedMessage>,
    spilled: usize,
    spill_path: PathBuf,
    handle: Option<BufWriter<File>>,
    last_used: u64,
}

impl ConversationStream {
    fn new(key: ConversationKey, spill_dir: &Path) -> Self {
        let spill_path = spill_dir.join(format!("{key}.jsonl"));
        Self {
            key,
            state: StreamState::Open,
            buffer: Vec::new(),
            spilled: 0,
            spill_path,
            handle: None,
            last_used: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<ConversationKey, ConversationStream>,
    open_handles: usize,
    tick: u64,
    finalized: bool,
}

/// A conversation after its stream has been closed and rendered.
#[derive(Debug)]
pub struct FinalizedConversation {
    key: ConversationKey,
    file_name: String,
    path: PathBuf,
    messages: Vec<BufferedMessage>,
}

impl FinalizedConversation {
    /// Returns the conversation key.
    #[must_use]
    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// Returns the artifact file name relative to the output directory.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the artifact path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the assembled messages, sorted by timestamp.
    #[must_use]
    pub fn messages(&self) -> &[BufferedMessage] {
        &self.messages
    }

    /// Returns the record count.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Aggregates record-kind and attachment counts for this conversation.
    #[must_use]
    pub fn stats(&self) -> ConversionStats {
        let mut stats = ConversionStats::default();
        for message in &self.messages {
            match message.kind() {
                RecordKind::Sms => stats.sms += 1,
                RecordKind::Mms => stats.mms += 1,
                RecordKind::Call => stats.calls += 1,
                RecordKind::Voicemail => stats.voicemails += 1,
            }
            let (images, vcards) = html::count_attachment_markers(message.fragment());
            stats.images += images;
            stats.vcards += vcards;
        }
        stats
    }
}

/// Owns and finalizes all per-conversation output streams.
pub struct ConversationManager {
    output_dir: PathBuf,
    format: OutputFormat,
    max_open_handles: usize,
    spill_threshold: usize,
    inner: Mutex<Inner>,
}

impl ConversationManager {
    /// Creates a manager writing `format` artifacts under `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns a fatal error when the output directory cannot be created.
    pub fn new(output_dir: impl Into<PathBuf>, format: OutputFormat) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)
            .map_err(|e| VoicepackError::output_dir(output_dir.clone(), e))?;

        Ok(Self {
            output_dir,
            format,
            max_open_handles: DEFAULT_MAX_OPEN_HANDLES,
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            inner: Mutex::new(Inner::default()),
        })
    }

    /// Sets the open-handle bound (minimum 1).
    #[must_use]
    pub fn with_max_open_handles(mut self, max: usize) -> Self {
        self.max_open_handles = max.max(1);
        self
    }

    /// Sets the per-conversation spill threshold (minimum 1).
    #[must_use]
    pub fn with_spill_threshold(mut self, threshold: usize) -> Self {
        self.spill_threshold = threshold.max(1);
        self
    }

    /// Returns the output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Returns the configured output format.
    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spill_dir(&self) -> PathBuf {
        self.output_dir.join(SPILL_DIR)
    }

    /// Routes one message into its conversation stream.
    ///
    /// Creates the stream on first contact; creation and append share one
    /// critical section. Crossing the spill threshold flushes the buffer to
    /// the stream's spill file through the bounded handle pool.
    ///
    /// # Errors
    ///
    /// Returns [`VoicepackError::StreamClosed`] after finalization, or an
    /// I/O error when spilling fails.
    pub fn write_message(&self, key: &ConversationKey, message: BufferedMessage) -> Result<()> {
        let mut inner = self.lock();
        if inner.finalized {
            return Err(VoicepackError::stream_closed(key.as_str()));
        }

        inner.tick += 1;
        let tick = inner.tick;
        let spill_dir = self.spill_dir();

        let stream = inner
            .streams
            .entry(key.clone())
            .or_insert_with(|| ConversationStream::new(key.clone(), &spill_dir));
        if stream.state != StreamState::Open {
            return Err(VoicepackError::stream_closed(key.as_str()));
        }
        stream.last_used = tick;
        stream.buffer.push(message);
        let needs_spill = stream.buffer.len() >= self.spill_threshold;

        if needs_spill {
            self.spill_locked(&mut inner, key)?;
        }
        Ok(())
    }

    /// Flushes a stream's buffer to its spill file, acquiring a pooled
    /// handle (and evicting the least-recently-used one) as needed.
    fn spill_locked(&self, inner: &mut Inner, key: &ConversationKey) -> Result<()> {
        let needs_handle = inner
            .streams
            .get(key)
            .is_some_and(|s| s.handle.is_none());
        if needs_handle && inner.open_handles >= self.max_open_handles {
            Self::evict_lru(inner, key)?;
        }

        let mut opened = false;
        let Some(stream) = inner.streams.get_mut(key) else {
            return Err(VoicepackError::stream_closed(key.as_str()));
        };

        if stream.handle.is_none() {
            fs::create_dir_all(self.spill_dir())?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&stream.spill_path)?;
            stream.handle = Some(BufWriter::new(file));
            opened = true;
        }

        let count = stream.buffer.len();
        if let Some(handle) = stream.handle.as_mut() {
            for message in stream.buffer.drain(..) {
                let line = serde_json::to_string(&message)?;
                writeln!(handle, "{line}")?;
            }
            handle.flush()?;
        }
        stream.spilled += count;

        if opened {
            inner.open_handles += 1;
        }
        Ok(())
    }

    /// Flushes and closes the least-recently-used open handle.
    fn evict_lru(inner: &mut Inner, keep: &ConversationKey) -> Result<()> {
        let victim = inner
            .streams
            .iter()
            .filter(|(k, s)| s.handle.is_some() && *k != keep)
            .min_by_key(|(_, s)| s.last_used)
            .map(|(k, _)| k.clone());

        let Some(victim) = victim else {
            return Ok(());
        };
        if let Some(stream) = inner.streams.get_mut(&victim) {
            if let Some(mut handle) = stream.handle.take() {
                handle.flush()?;
            }
        }
        inner.open_handles = inner.open_handles.saturating_sub(1);
        Ok(())
    }

    /// Closes every stream, rendering and writing each conversation once.
    ///
    /// Per stream: the spill file (if any) is read back, the in-memory tail
    /// appended, the whole list sorted by timestamp ascending, rendered in
    /// the configured format, and written in a single pass; the spill file
    /// is then deleted. Calling `finalize` again returns an empty list
    /// without touching anything.
    ///
    /// # Errors
    ///
    /// Returns an error when a spill cannot be read back or an artifact
    /// cannot be written.
    pub fn finalize(&self) -> Result<Vec<FinalizedConversation>> {
        let mut inner = self.lock();
        if inner.finalized {
            return Ok(Vec::new());
        }
        inner.finalized = true;

        let mut keys: Vec<ConversationKey> = inner.streams.keys().cloned().collect();
        keys.sort();

        let mut finalized = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(mut stream) = inner.streams.remove(&key) else {
                continue;
            };
            if stream.state != StreamState::Open {
                inner.streams.insert(key, stream);
                continue;
            }
            stream.state = StreamState::Finalizing;

            if let Some(mut handle) = stream.handle.take() {
                handle.flush()?;
                inner.open_handles = inner.open_handles.saturating_sub(1);
            }

            let mut messages = if stream.spilled > 0 {
                read_spill(&stream.spill_path)?
            } else {
                Vec::new()
            };
            messages.append(&mut stream.buffer);
            messages.sort_by_key(BufferedMessage::timestamp_ms);

            let document = self.render_document(&stream.key, &messages);
            let file_name = format!("{}.{}", stream.key, self.format.extension());
            let path = self.output_dir.join(&file_name);
            fs::write(&path, document)?;

            if stream.spilled > 0 {
                let _ = fs::remove_file(&stream.spill_path);
            }
            stream.state = StreamState::Closed;

            finalized.push(FinalizedConversation {
                key: stream.key.clone(),
                file_name,
                path,
                messages,
            });
            inner.streams.insert(key, stream);
        }

        // The spill directory disappears with its last file.
        let _ = fs::remove_dir(self.spill_dir());
        Ok(finalized)
    }

    fn render_document(&self, key: &ConversationKey, messages: &[BufferedMessage]) -> String {
        match self.format {
            OutputFormat::Xml => {
                let fragments: Vec<String> =
                    messages.iter().map(|m| m.fragment().to_string()).collect();
                xml::document(&fragments)
            }
            OutputFormat::Html => {
                let rows: Vec<String> = messages
                    .iter()
                    .map(|m| {
                        html::row(
                            m.timestamp_ms(),
                            m.display_sender(),
                            m.text(),
                            &html::attachments_cell(m.fragment()),
                        )
                    })
                    .collect();
                html::document(key.as_str(), &rows)
            }
        }
    }

    /// Writes the run-wide `index.html` from per-conversation entries and
    /// global totals.
    ///
    /// # Errors
    ///
    /// Returns an error when the index cannot be written.
    pub fn generate_index(
        &self,
        entries: &[IndexEntry],
        stats: &ConversionStats,
        elapsed: Duration,
    ) -> Result<PathBuf> {
        let path = self.output_dir.join("index.html");
        fs::write(&path, html::index_document(entries, stats, elapsed))?;
        Ok(path)
    }

    /// Returns the number of known conversation streams.
    #[must_use]
    pub fn conversation_count(&self) -> usize {
        self.lock().streams.len()
    }

    /// Returns the number of currently open spill handles.
    #[must_use]
    pub fn open_handle_count(&self) -> usize {
        self.lock().open_handles
    }
}

impl std::fmt::Debug for ConversationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationManager")
            .field("output_dir", &self.output_dir)
            .field("format", &self.format)
            .field("max_open_handles", &self.max_open_handles)
            .field("spill_threshold", &self.spill_threshold)
            .finish_non_exhaustive()
    }
}

/// Reads a spill file back into buffered messages.
fn read_spill(path: &Path) -> Result<Vec<BufferedMessage>> {
    let contents = fs::read_to_string(path)?;
    let mut messages = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        messages.push(serde_json::from_str(line)?);
    }
    Ok(messages)
}
