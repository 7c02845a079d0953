//! Core data types and error definitions for the enrichment pipeline.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::bill::IdentifierError;
use crate::index::IndexError;
use crate::markup::MarkupError;
use crate::processing::retry::RetryPolicy;
use crate::source::FetchError;
use crate::storage::StoreError;
use crate::summarization::SummarizationClientError;

/// Default target chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 2000;
/// Default overlap between adjacent chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
/// Default number of documents processed concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;
/// Default distance the stored watermark is moved back from the minute a pass started in.
pub const DEFAULT_WATERMARK_MARGIN: Duration = Duration::from_secs(60);

/// Errors produced while splitting bill text into chunks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible chunk size.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave room for the window to advance.
    #[error("chunk overlap {overlap} must be smaller than chunk size {chunk_size}")]
    InvalidOverlap {
        /// Requested overlap.
        overlap: usize,
        /// Requested chunk size.
        chunk_size: usize,
    },
}

/// Character budget for the text chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSettings {
    /// Target window length in characters.
    pub chunk_size: usize,
    /// Characters repeated at the start of the following window.
    pub overlap: usize,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkSettings {
    /// Reject budgets the chunker cannot make progress with.
    pub fn validate(&self) -> Result<(), ChunkingError> {
        if self.chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        if self.overlap >= self.chunk_size {
            return Err(ChunkingError::InvalidOverlap {
                overlap: self.overlap,
                chunk_size: self.chunk_size,
            });
        }
        Ok(())
    }
}

/// Everything an enrichment pass needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Congress whose manifests are scanned.
    pub congress: u32,
    /// Sessions whose manifests are scanned.
    pub sessions: Vec<u32>,
    /// Bill types whose manifests are scanned.
    pub bill_types: Vec<String>,
    /// Documents processed concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches.
    pub batch_pause: Duration,
    /// Retry policy for the transient steps.
    pub retry: RetryPolicy,
    /// Chunk budget for indexing.
    pub chunking: ChunkSettings,
    /// Safety margin subtracted from the minute-floored pass start before it is stored.
    pub watermark_margin: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            congress: 119,
            sessions: vec![1, 2],
            bill_types: ["hr", "s", "hjres", "sjres", "hconres", "sconres", "hres", "sres"]
                .into_iter()
                .map(String::from)
                .collect(),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_pause: Duration::ZERO,
            retry: RetryPolicy::default(),
            chunking: ChunkSettings::default(),
            watermark_margin: DEFAULT_WATERMARK_MARGIN,
        }
    }
}

/// Steps of the per-document state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Reading manifests.
    Discovering,
    /// Running the ingestion decision gate.
    Deciding,
    /// Downloading the document.
    Fetching,
    /// Parsing markup and deriving the identifier.
    Extracting,
    /// Calling the summarization service.
    Summarizing,
    /// Checking the summary.
    QualityGating,
    /// Writing chunks to the semantic index.
    Indexing,
    /// Writing the concept and version records.
    Persisting,
    /// Finished.
    Done,
}

impl PipelineStage {
    /// Stable lowercase label used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Discovering => "discovering",
            PipelineStage::Deciding => "deciding",
            PipelineStage::Fetching => "fetching",
            PipelineStage::Extracting => "extracting",
            PipelineStage::Summarizing => "summarizing",
            PipelineStage::QualityGating => "quality_gating",
            PipelineStage::Indexing => "indexing",
            PipelineStage::Persisting => "persisting",
            PipelineStage::Done => "done",
        }
    }

    /// Whether transient failures of this step are retried. Deterministic steps never are.
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            PipelineStage::Discovering
                | PipelineStage::Fetching
                | PipelineStage::Summarizing
                | PipelineStage::Indexing
                | PipelineStage::Persisting
        )
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a failed step should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Environmental fault; retried, then the document is abandoned for this pass.
    Transient,
    /// Data problem with this one document; skipped without retry.
    Fatal,
    /// Logic bug; surfaced loudly.
    Invariant,
}

impl FailureKind {
    /// Stable lowercase label used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            FailureKind::Transient => "transient",
            FailureKind::Fatal => "fatal",
            FailureKind::Invariant => "invariant",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying cause of a failed step.
#[derive(Debug, Error)]
pub enum StepError {
    /// Manifest or document download failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Bill identity could not be derived.
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    /// Markup could not be parsed.
    #[error(transparent)]
    Markup(#[from] MarkupError),
    /// Summarization service call failed.
    #[error(transparent)]
    Summarization(#[from] SummarizationClientError),
    /// Chunk budget was invalid.
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
    /// Semantic index call failed.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// Local store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StepError {
    /// Classify the cause.
    pub fn kind(&self) -> FailureKind {
        match self {
            StepError::Fetch(error) if error.is_transient() => FailureKind::Transient,
            StepError::Fetch(_) => FailureKind::Fatal,
            StepError::Identifier(_) | StepError::Markup(_) | StepError::Chunking(_) => {
                FailureKind::Fatal
            }
            StepError::Summarization(_) | StepError::Index(_) => FailureKind::Transient,
            StepError::Store(StoreError::MissingConcept(_)) => FailureKind::Invariant,
            StepError::Store(StoreError::Sqlite(_)) => FailureKind::Transient,
            StepError::Store(_) => FailureKind::Fatal,
        }
    }
}

/// A document's pipeline run ended in the `Failed` state.
#[derive(Debug, Error)]
#[error("{stage} step failed ({kind}): {source}")]
pub struct ProcessingError {
    /// Step that failed.
    pub stage: PipelineStage,
    /// Classification of the failure.
    pub kind: FailureKind,
    /// Underlying cause.
    #[source]
    pub source: StepError,
}

impl ProcessingError {
    /// Wrap a cause, classifying it.
    pub fn new(stage: PipelineStage, source: impl Into<StepError>) -> Self {
        let source = source.into();
        Self {
            stage,
            kind: source.kind(),
            source,
        }
    }
}

/// Terminal state of one document that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// The decision gate declined the document.
    Skipped {
        /// Gate reason.
        reason: String,
    },
    /// The summary failed the quality gate and was diverted to the audit trail.
    Rejected {
        /// Rejection reason.
        reason: String,
    },
    /// The document was indexed and persisted.
    Enriched {
        /// Concept row id.
        bill_id: i64,
        /// Semantic index entry id.
        entry_id: String,
        /// A new version record was written.
        version_inserted: bool,
    },
}

/// Tally of one `discover_and_enrich` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Distinct candidate documents found in the manifests.
    pub discovered: usize,
    /// Candidates declined by the decision gate.
    pub skipped: usize,
    /// Documents indexed and persisted.
    pub enriched: usize,
    /// Documents whose summary was rejected.
    pub rejected: usize,
    /// Documents that failed fatally or hit an invariant violation.
    pub failed: usize,
    /// Documents abandoned after exhausting retries.
    pub abandoned: usize,
    /// Manifests that could not be read.
    pub manifest_failures: usize,
    /// The pass stopped early on request.
    pub cancelled: bool,
    /// The watermark was moved forward.
    pub watermark_advanced: bool,
}

impl PassReport {
    /// Number of store writes this pass performed.
    pub fn writes(&self) -> usize {
        self.enriched + self.rejected
    }
}
