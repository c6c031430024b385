//! # Voicepack
//!
//! A Rust library for converting Google Voice takeout exports into
//! per-conversation archives.
//!
//! ## Overview
//!
//! A takeout export scatters every conversation across per-message HTML
//! files (text threads, placed/received/missed calls, voicemails).
//! Voicepack reassembles them: it classifies participant identities,
//! resolves display names against a persistent alias store, groups records
//! into conversations, and writes one artifact per conversation as either
//! SMS-backup-schema XML (restorable by backup tools) or readable HTML
//! tables, together with a run-wide `index.html` and a CSV report of
//! identities that never received a name.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use voicepack::config::ConvertConfig;
//! use voicepack::pipeline::PipelineContext;
//!
//! fn main() -> voicepack::Result<()> {
//!     let config = ConvertConfig::new("Takeout/Voice/Calls", "converted")
//!         .with_own_number("+19175551111");
//!
//!     let report = PipelineContext::new(config)?.run()?;
//!     println!(
//!         "{} conversations from {} files",
//!         report.conversations, report.files_processed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Module Structure
//!
//! - [`pipeline`] — **Run orchestration** (recommended entry point)
//!   - [`PipelineContext`](pipeline::PipelineContext) — one run's shared state
//!   - [`RunReport`](pipeline::RunReport) — totals, skips, and timings
//! - [`config`] — [`ConvertConfig`](config::ConvertConfig) run configuration
//! - [`extract`] — takeout HTML and `Phones.vcf` extraction
//!   - [`HtmlExtractor`](extract::HtmlExtractor), [`detect_file_kind`](extract::detect_file_kind)
//! - [`phone`] — identity classification
//!   - [`PhoneIdentity`](phone::PhoneIdentity), [`NumberClassifier`](phone::NumberClassifier), [`FilterPolicy`](phone::FilterPolicy)
//! - [`alias`] — [`AliasStore`](alias::AliasStore), the persistent number-to-name map
//! - [`conversation`] — [`ConversationKey`](conversation::ConversationKey) derivation
//! - [`manager`] — [`ConversationManager`](manager::ConversationManager), buffered streams with disk spill
//! - [`output`] — XML and HTML rendering ([`OutputFormat`](output::OutputFormat))
//! - [`commercial`] — opt-out based spam conversation detection
//! - [`cache`] — [`MetadataCache`](cache::MetadataCache), skip re-parsing unchanged files
//! - [`report`] — the unknown-identity CSV report
//! - [`timestamp`] — timestamp candidate resolution and clamping
//! - [`record`] — [`MessageRecord`](record::MessageRecord), the normalized export entry
//! - [`cli`] — CLI types (binary only, behind the `cli` feature)
//! - [`error`] — unified error types ([`VoicepackError`], [`Result`])
//! - [`prelude`] — convenient re-exports

pub mod alias;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod commercial;
pub mod config;
pub mod conversation;
pub mod error;
pub mod extract;
pub mod manager;
pub mod output;
pub mod phone;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod timestamp;

// Re-export the main types at the crate root for convenience
pub use error::{Result, VoicepackError};
pub use record::MessageRecord;

/// Convenient re-exports for common usage.
///
/// Import everything you need with a single line:
///
/// ```rust
/// use voicepack::prelude::*;
/// ```
pub mod prelude {
    // Error types
    pub use crate::error::{Result, VoicepackError};

    // Run configuration and orchestration
    pub use crate::config::ConvertConfig;
    pub use crate::pipeline::{PipelineContext, RunReport};

    // Records and identities
    pub use crate::phone::{FilterPolicy, NumberClassifier, PhoneIdentity};
    pub use crate::record::{
        Attachment, AttachmentKind, CallDirection, MessageRecord, RecordKind,
    };

    // Names and conversation grouping
    pub use crate::alias::AliasStore;
    pub use crate::conversation::{ConversationKey, ConversationResolver};
    pub use crate::manager::{BufferedMessage, ConversationManager, FinalizedConversation};

    // Extraction and output
    pub use crate::extract::HtmlExtractor;
    pub use crate::output::{ConversionStats, IndexEntry, OutputFormat};

    // Caching
    pub use crate::cache::MetadataCache;
}
