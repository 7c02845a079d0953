//! Enrichment pipeline: decision gate, chunking, quality gate, retries, and orchestration.

pub mod chunking;
pub mod gate;
pub mod pipeline;
pub mod quality;
pub mod retry;
pub mod types;

pub use chunking::{ChunkSpan, chunk_spans, chunk_text};
pub use gate::{IngestionDecision, decide};
pub use pipeline::{CancellationHandle, EnrichmentPipeline};
pub use quality::{MIN_SUMMARY_CHARS, RejectionReason, evaluate};
pub use retry::RetryPolicy;
pub use types::{
    ChunkSettings, ChunkingError, DEFAULT_WATERMARK_MARGIN, DocumentOutcome, FailureKind,
    PassReport, PipelineSettings, PipelineStage, ProcessingError, StepError,
};
