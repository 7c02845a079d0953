//! Enrichment orchestrator: discovery, batching, and the per-document state machine.
//!
//! A pass reads every configured manifest, keeps the entries modified after the stored
//! watermark, and runs each candidate through
//! `Deciding → Fetching → Extracting → Summarizing → QualityGating → Indexing → Persisting`.
//! Candidates are grouped by bill. Bills within a batch run concurrently, while the versions of
//! one bill run one after another in ascending priority so the highest version is both persisted
//! and indexed last. Batches run one after another. All external calls happen before the single
//! local write in `Persisting`, so a document is either fully applied or not applied at all.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::join_all;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use tracing::Instrument;

use crate::bill::{
    BillIdentifier, BillKey, UNKNOWN_PRIORITY, parse_document_fields, parse_source_url, priority,
    stage,
};
use crate::index::{BILL_NAMESPACE, SemanticIndex, bill_filter_values};
use crate::markup::{BillDocument, TextExtractor};
use crate::processing::chunking::chunk_text;
use crate::processing::gate::decide;
use crate::processing::quality::evaluate;
use crate::processing::types::{
    DocumentOutcome, FailureKind, PassReport, PipelineSettings, PipelineStage, ProcessingError,
    StepError,
};
use crate::source::{GovInfoClient, ManifestFile, manifest_watermark};
use crate::storage::{BillStore, EnrichedDocument, NewSummaryAttempt};
use crate::summarization::{BillSummary, SummaryRequest, Summarizer};

/// Requests that a running pass stop at the next batch boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    flag: Arc<AtomicBool>,
}

impl CancellationHandle {
    /// Ask the pass to stop before its next batch. In-flight documents finish.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Scheduler-invoked enrichment pipeline.
pub struct EnrichmentPipeline {
    source: GovInfoClient,
    store: BillStore,
    summarizer: Arc<dyn Summarizer>,
    index: Arc<dyn SemanticIndex>,
    extractor: TextExtractor,
    settings: PipelineSettings,
    cancellation: CancellationHandle,
}

/// Document fields gathered during `Extracting`.
struct ExtractedDocument {
    identifier: BillIdentifier,
    document: BillDocument,
    title: String,
    full_text: String,
}

impl EnrichmentPipeline {
    /// Wire a pipeline from its collaborators.
    pub fn new(
        source: GovInfoClient,
        store: BillStore,
        summarizer: Arc<dyn Summarizer>,
        index: Arc<dyn SemanticIndex>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            store,
            summarizer,
            index,
            extractor: TextExtractor::default(),
            settings,
            cancellation: CancellationHandle::default(),
        }
    }

    /// Replace the prose extractor.
    pub fn with_extractor(mut self, extractor: TextExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Handle that cancels this pipeline's passes between batches.
    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancellation.clone()
    }

    /// Store the pipeline writes to.
    pub fn store(&self) -> &BillStore {
        &self.store
    }

    /// Run one full discovery and enrichment pass.
    ///
    /// The watermark moves to the pass start time, floored to the minute and moved back by the
    /// configured margin, once every dispatched batch has settled. It stays put when the pass is cancelled, when a manifest could not be read, or when a
    /// document was abandoned after exhausting its retries, so the next pass sees those files
    /// again. Re-processing is harmless because the decision gate skips exact URLs.
    pub async fn discover_and_enrich(&self) -> Result<PassReport, ProcessingError> {
        let pass_started = OffsetDateTime::now_utc();
        let watermark = self
            .store
            .watermark()
            .map_err(|error| ProcessingError::new(PipelineStage::Discovering, error))?;
        tracing::info!(
            congress = self.settings.congress,
            watermark = ?watermark,
            "Starting enrichment pass"
        );

        let mut report = PassReport::default();
        let candidates = self.discover(watermark, &mut report).await;
        report.discovered = candidates.len();

        let bills = group_by_bill(candidates);
        let batch_size = self.settings.batch_size.max(1);
        let batch_count = bills.len().div_ceil(batch_size);
        for (batch_index, batch) in bills.chunks(batch_size).enumerate() {
            if self.cancellation.is_cancelled() {
                tracing::info!(
                    completed_batches = batch_index,
                    batch_count,
                    "Enrichment pass cancelled"
                );
                report.cancelled = true;
                break;
            }

            tracing::debug!(batch = batch_index + 1, batch_count, bills = batch.len(), "Dispatching batch");
            let outcomes = join_all(batch.iter().map(|urls| self.process_bill(urls))).await;

            for (url, outcome) in outcomes.into_iter().flatten() {
                tally(&mut report, url, outcome);
            }

            let more_batches = batch_index + 1 < batch_count;
            if more_batches && !self.settings.batch_pause.is_zero() {
                tokio::time::sleep(self.settings.batch_pause).await;
            }
        }

        if report.cancelled || report.manifest_failures > 0 || report.abandoned > 0 {
            tracing::info!(
                cancelled = report.cancelled,
                manifest_failures = report.manifest_failures,
                abandoned = report.abandoned,
                "Watermark not advanced"
            );
        } else {
            let watermark = manifest_watermark(pass_started, self.settings.watermark_margin);
            self.store
                .set_watermark(watermark)
                .map_err(|error| ProcessingError::new(PipelineStage::Done, error))?;
            report.watermark_advanced = true;
            tracing::info!(watermark = %watermark, "Watermark advanced");
        }

        tracing::info!(
            discovered = report.discovered,
            skipped = report.skipped,
            enriched = report.enriched,
            rejected = report.rejected,
            failed = report.failed,
            abandoned = report.abandoned,
            "Enrichment pass finished"
        );
        Ok(report)
    }

    /// Read every manifest and return the distinct candidate URLs in manifest order.
    async fn discover(
        &self,
        watermark: Option<OffsetDateTime>,
        report: &mut PassReport,
    ) -> Vec<String> {
        let congress = self.settings.congress;
        let targets: Vec<(u32, &str)> = self
            .settings
            .sessions
            .iter()
            .flat_map(|session| {
                self.settings
                    .bill_types
                    .iter()
                    .map(move |bill_type| (*session, bill_type.as_str()))
            })
            .collect();

        let source = &self.source;
        let retry = self.settings.retry;
        let manifests = join_all(targets.iter().map(|&(session, bill_type)| async move {
            let files = retry
                .run(PipelineStage::Discovering, || async move {
                    source
                        .fetch_manifest(congress, session, bill_type)
                        .await
                        .map_err(StepError::from)
                })
                .await;
            (session, bill_type, files)
        }))
        .await;

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for (session, bill_type, files) in manifests {
            let files: Vec<ManifestFile> = match files {
                Ok(files) => files,
                Err(error) => {
                    report.manifest_failures += 1;
                    tracing::warn!(session, bill_type, error = %error, "Manifest unavailable for this pass");
                    continue;
                }
            };
            let before = candidates.len();
            for file in files {
                if file.is_candidate(watermark) && seen.insert(file.link.clone()) {
                    candidates.push(file.link);
                }
            }
            tracing::info!(
                session,
                bill_type,
                candidates = candidates.len() - before,
                "Manifest fetched"
            );
        }
        candidates
    }

    /// Run the candidate versions of one bill in order.
    async fn process_bill<'a>(
        &self,
        urls: &'a [String],
    ) -> Vec<(&'a str, Result<DocumentOutcome, ProcessingError>)> {
        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls {
            let outcome = self
                .process_document(url)
                .instrument(tracing::info_span!("document", url = %url))
                .await;
            outcomes.push((url.as_str(), outcome));
        }
        outcomes
    }

    /// Run one document through the state machine.
    pub async fn process_document(
        &self,
        source_url: &str,
    ) -> Result<DocumentOutcome, ProcessingError> {
        enter(PipelineStage::Deciding);
        let decision = decide(&self.store, source_url)
            .map_err(|error| ProcessingError::new(PipelineStage::Deciding, error))?;
        tracing::info!(
            should_process = decision.should_process,
            reason = %decision.reason,
            existing_bill_id = decision.existing_bill_id,
            "Ingestion decision"
        );
        if !decision.should_process {
            return Ok(DocumentOutcome::Skipped {
                reason: decision.reason,
            });
        }

        enter(PipelineStage::Fetching);
        let source = &self.source;
        let bytes = self
            .settings
            .retry
            .run(PipelineStage::Fetching, || async move {
                source
                    .fetch_document(source_url)
                    .await
                    .map_err(StepError::from)
            })
            .await?;

        enter(PipelineStage::Extracting);
        let extracted = self.extract(&bytes, source_url)?;
        let key = &extracted.identifier.key;
        let version_code = &extracted.identifier.version_code;

        enter(PipelineStage::Summarizing);
        let request = SummaryRequest {
            bill: key.clone(),
            version_code: version_code.clone(),
            title: extracted.title.clone(),
            sponsor: extracted
                .document
                .sponsor
                .as_ref()
                .map(|sponsor| sponsor.name.clone()),
            committees: extracted
                .document
                .committees
                .iter()
                .map(|committee| committee.name.clone())
                .collect(),
            action_date: extracted.document.action_date.clone(),
            full_text: extracted.full_text.clone(),
        };
        let summarizer = &self.summarizer;
        let request_ref = &request;
        let summary = self
            .settings
            .retry
            .run(PipelineStage::Summarizing, || async move {
                summarizer
                    .summarize(request_ref)
                    .await
                    .map_err(StepError::from)
            })
            .await?;

        enter(PipelineStage::QualityGating);
        if let Err(rejection) = evaluate(&summary) {
            let reason = rejection.to_string();
            self.store
                .record_summary_attempt(&NewSummaryAttempt {
                    bill: key,
                    version_code,
                    source_url,
                    reason: &reason,
                    summary: &summary,
                })
                .map_err(|error| ProcessingError::new(PipelineStage::QualityGating, error))?;
            tracing::warn!(bill = %key, version_code = %version_code, reason = %reason, "Summary rejected by quality gate");
            return Ok(DocumentOutcome::Rejected { reason });
        }

        enter(PipelineStage::Indexing);
        let entry_id = self.index_document(&extracted, &summary, source_url).await?;

        enter(PipelineStage::Persisting);
        let enriched = EnrichedDocument {
            key: key.clone(),
            version_code: version_code.clone(),
            title: extracted.title.clone(),
            short_title: extracted.document.short_title.clone(),
            sponsor: extracted.document.sponsor.clone(),
            committees: extracted.document.committees.clone(),
            action_date: extracted.document.action_date.clone(),
            full_text: extracted.full_text.clone(),
            source_url: source_url.to_string(),
            summary,
        };
        let store = &self.store;
        let enriched_ref = &enriched;
        let outcome = self
            .settings
            .retry
            .run(PipelineStage::Persisting, || async move {
                store
                    .persist_enrichment(enriched_ref)
                    .map_err(StepError::from)
            })
            .await?;

        enter(PipelineStage::Done);
        tracing::info!(
            bill = %key,
            version_code = %version_code,
            bill_id = outcome.bill_id,
            concept_created = outcome.concept_created,
            concept_updated = outcome.concept_updated,
            version_inserted = outcome.version_inserted,
            "Document enriched"
        );
        Ok(DocumentOutcome::Enriched {
            bill_id: outcome.bill_id,
            entry_id,
            version_inserted: outcome.version_inserted,
        })
    }

    fn extract(
        &self,
        bytes: &[u8],
        source_url: &str,
    ) -> Result<ExtractedDocument, ProcessingError> {
        let fail = |error: StepError| ProcessingError::new(PipelineStage::Extracting, error);
        let document = BillDocument::from_xml(bytes).map_err(|error| fail(error.into()))?;
        let identifier =
            parse_document_fields(&document.legislative_number, &document.congress, source_url)
                .map_err(|error| fail(error.into()))?;
        let title = document.title();
        let full_text = document.full_text(&self.extractor);
        tracing::debug!(
            identifier = %identifier,
            text_length = full_text.chars().count(),
            "Extracted document"
        );
        Ok(ExtractedDocument {
            identifier,
            document,
            title,
            full_text,
        })
    }

    async fn index_document(
        &self,
        extracted: &ExtractedDocument,
        summary: &BillSummary,
        source_url: &str,
    ) -> Result<String, ProcessingError> {
        let key = &extracted.identifier.key;
        let mut chunks = chunk_text(&extracted.full_text, self.settings.chunking)
            .map_err(|error| ProcessingError::new(PipelineStage::Indexing, error))?;
        if chunks.is_empty() {
            chunks.push(extracted.title.clone());
        }

        let mut metadata = Map::new();
        metadata.insert("title".into(), Value::String(extracted.title.clone()));
        metadata.insert("label".into(), Value::String(key.label()));
        metadata.insert(
            "versionCode".into(),
            Value::String(extracted.identifier.version_code.clone()),
        );
        metadata.insert(
            "status".into(),
            Value::String(stage(&extracted.identifier.version_code).status().into()),
        );
        metadata.insert("sourceUrl".into(), Value::String(source_url.to_string()));
        metadata.insert("tagline".into(), json!(summary.tagline));
        metadata.insert("impactAreas".into(), json!(summary.impact_areas));

        let filters = bill_filter_values(key);
        let entry_key = key.index_key();
        tracing::debug!(bill = %key, chunks = chunks.len(), "Indexing chunks");

        let index = &self.index;
        let (entry_key, chunks, metadata, filters) = (&entry_key, &chunks, &metadata, &filters);
        self.settings
            .retry
            .run(PipelineStage::Indexing, || async move {
                index
                    .add(BILL_NAMESPACE, entry_key, chunks, metadata, filters)
                    .await
                    .map_err(StepError::from)
            })
            .await
    }
}

/// Group candidate URLs by the bill named in their file name, in first-seen order.
///
/// Each group is sorted by ascending version priority (stable for ties). URLs whose file name
/// does not identify a bill form groups of their own.
fn group_by_bill(candidates: Vec<String>) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<(i32, String)>> = Vec::new();
    let mut positions: HashMap<BillKey, usize> = HashMap::new();
    for url in candidates {
        let Ok(identifier) = parse_source_url(&url) else {
            groups.push(vec![(UNKNOWN_PRIORITY, url)]);
            continue;
        };
        let rank = priority(&identifier.version_code);
        match positions.get(&identifier.key) {
            Some(&position) => groups[position].push((rank, url)),
            None => {
                positions.insert(identifier.key, groups.len());
                groups.push(vec![(rank, url)]);
            }
        }
    }

    groups
        .into_iter()
        .map(|mut group| {
            group.sort_by_key(|(rank, _)| *rank);
            group.into_iter().map(|(_, url)| url).collect()
        })
        .collect()
}

fn enter(stage: PipelineStage) {
    tracing::debug!(stage = %stage, "Entering stage");
}

fn tally(
    report: &mut PassReport,
    url: &str,
    outcome: Result<DocumentOutcome, ProcessingError>,
) {
    match outcome {
        Ok(DocumentOutcome::Skipped { .. }) => report.skipped += 1,
        Ok(DocumentOutcome::Rejected { .. }) => report.rejected += 1,
        Ok(DocumentOutcome::Enriched { .. }) => report.enriched += 1,
        Err(error) => match error.kind {
            FailureKind::Transient => {
                report.abandoned += 1;
                tracing::warn!(url, stage = %error.stage, error = %error.source, "Document abandoned for this pass");
            }
            FailureKind::Fatal => {
                report.failed += 1;
                tracing::warn!(url, stage = %error.stage, error = %error.source, "Document failed; skipping");
            }
            FailureKind::Invariant => {
                report.failed += 1;
                tracing::error!(url, stage = %error.stage, error = %error.source, "Invariant violated while processing document");
            }
        },
    }
}
