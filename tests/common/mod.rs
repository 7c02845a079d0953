#![allow(dead_code)]

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use billwatch::index::{FilterValue, IndexEntry, IndexError, IndexPage, SearchHit, SemanticIndex};
use billwatch::processing::{ChunkSettings, EnrichmentPipeline, PipelineSettings, RetryPolicy};
use billwatch::qdrant::compute_entry_id;
use billwatch::source::GovInfoClient;
use billwatch::storage::BillStore;
use billwatch::summarization::{
    BillSummary, Citation, SummarizationClientError, SummaryRequest, SummarySection, Summarizer,
};
use httpmock::MockServer;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;

pub const FUTURE_TIME: &str = "2099-01-01T00:00:00Z";
pub const PAST_TIME: &str = "03-Jan-2025 14:05";

/// Path of a bulk data document on the mock server.
pub fn document_path(file_name: &str) -> String {
    let package = file_name.trim_end_matches(".xml");
    format!("/content/pkg/{package}/xml/{file_name}")
}

/// Manifest body listing `(link, modified)` pairs as XML files.
pub fn manifest_body(files: &[(String, &str)]) -> Value {
    let files: Vec<Value> = files
        .iter()
        .map(|(link, modified)| {
            let name = link.rsplit('/').next().unwrap_or(link);
            json!({
                "link": link,
                "formattedLastModifiedTime": modified,
                "fileExtension": "xml",
                "justFileName": name.trim_end_matches(".xml"),
                "folder": false
            })
        })
        .collect();
    json!({ "files": files })
}

/// Minimal bill XML for `legis_num` such as `H. R. 1`.
pub fn bill_xml(legis_num: &str, official_title: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<bill public-private="public">
  <metadata><dublinCore><dc:title>{official_title}</dc:title></dublinCore></metadata>
  <form>
    <congress>119th CONGRESS</congress>
    <session>1st Session</session>
    <legis-num>{legis_num}</legis-num>
    <current-chamber>IN THE HOUSE OF REPRESENTATIVES</current-chamber>
    <action>
      <action-date date="20250103">January 3, 2025</action-date>
      <action-desc><sponsor name-id="S000001">Mr. Smith</sponsor> introduced the following bill; which was referred to the <committee-name committee-id="HWM00">Committee on Ways and Means</committee-name></action-desc>
    </action>
    <official-title>{official_title}</official-title>
  </form>
  <legis-body>
    <section id="S1"><enum>1.</enum><header>Short title</header>
      <text>This Act may be cited as the <short-title>Example Act</short-title>.</text>
    </section>
    <section id="S2"><enum>2.</enum><header>Reports</header>
      <text>The Secretary shall submit an annual report to Congress on the program.</text>
    </section>
  </legis-body>
</bill>"#
    )
}

/// Summary that passes the quality gate.
pub fn good_summary() -> BillSummary {
    BillSummary {
        summary: "This bill requires the Secretary to report annually to Congress on the program."
            .into(),
        tagline: "Annual program reports".into(),
        impact_areas: vec!["Government oversight".into()],
        structured_summary: vec![SummarySection {
            title: "Sec. 2. Reports".into(),
            text: "Requires an annual report.".into(),
            citations: vec![Citation {
                label: "Sec. 2".into(),
                section_id: "S2".into(),
            }],
        }],
        ..BillSummary::default()
    }
}

/// Summarizer returning canned results and counting calls.
pub struct FakeSummarizer {
    result: Result<BillSummary, String>,
    calls: AtomicUsize,
}

impl FakeSummarizer {
    pub fn returning(summary: BillSummary) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(summary),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(
        &self,
        _request: &SummaryRequest,
    ) -> Result<BillSummary, SummarizationClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .map_err(SummarizationClientError::ProviderUnavailable)
    }
}

#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub entry: IndexEntry,
    pub chunks: Vec<String>,
}

/// Semantic index kept in memory, ordered by entry id so listing cursors stay stable.
#[derive(Default)]
pub struct MemoryIndex {
    entries: Mutex<BTreeMap<String, StoredEntry>>,
    adds: AtomicUsize,
}

impl MemoryIndex {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .values()
            .map(|stored| stored.entry.key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn get(&self, key: &str) -> Option<StoredEntry> {
        self.entries
            .lock()
            .values()
            .find(|stored| stored.entry.key == key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn adds(&self) -> usize {
        self.adds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SemanticIndex for MemoryIndex {
    async fn add(
        &self,
        namespace: &str,
        key: &str,
        chunks: &[String],
        metadata: &Map<String, Value>,
        filter_values: &[FilterValue],
    ) -> Result<String, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::InvalidRequest("no chunks".into()));
        }
        self.adds.fetch_add(1, Ordering::SeqCst);
        let entry_id = compute_entry_id(namespace, key);
        let entry = IndexEntry {
            entry_id: entry_id.clone(),
            namespace: namespace.to_string(),
            key: key.to_string(),
            filter_values: filter_values.to_vec(),
            metadata: metadata.clone(),
            updated_at: Some(OffsetDateTime::now_utc()),
        };
        self.entries.lock().insert(
            entry_id.clone(),
            StoredEntry {
                entry,
                chunks: chunks.to_vec(),
            },
        );
        Ok(entry_id)
    }

    async fn list_entries(
        &self,
        namespace: &str,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<IndexPage, IndexError> {
        let entries = self.entries.lock();
        let lower = match cursor.as_ref() {
            Some(cursor) => Bound::Excluded(cursor.clone()),
            None => Bound::Unbounded,
        };
        let page: Vec<IndexEntry> = entries
            .range((lower, Bound::Unbounded))
            .map(|(_, stored)| stored.entry.clone())
            .filter(|entry| entry.namespace == namespace)
            .take(limit)
            .collect();
        let next_cursor = if page.len() == limit {
            page.last().map(|entry| entry.entry_id.clone())
        } else {
            None
        };
        Ok(IndexPage {
            entries: page,
            next_cursor,
        })
    }

    async fn delete(&self, _namespace: &str, entry_id: &str) -> Result<(), IndexError> {
        self.entries.lock().remove(entry_id);
        Ok(())
    }

    async fn search(
        &self,
        namespace: &str,
        query: &str,
        filter_values: &[FilterValue],
        limit: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let entries = self.entries.lock();
        let hits = entries
            .values()
            .filter(|stored| stored.entry.namespace == namespace)
            .filter(|stored| {
                filter_values.iter().all(|filter| {
                    stored.entry.filter_value(&filter.name) == Some(filter.value.as_str())
                })
            })
            .flat_map(|stored| {
                stored
                    .chunks
                    .iter()
                    .enumerate()
                    .filter(|(_, chunk)| chunk.contains(query))
                    .map(|(chunk_index, chunk)| SearchHit {
                        entry_id: stored.entry.entry_id.clone(),
                        key: stored.entry.key.clone(),
                        chunk_index,
                        text: chunk.clone(),
                        score: 1.0,
                    })
            })
            .take(limit)
            .collect();
        Ok(hits)
    }
}

/// Pipeline scanning only session 1 of `hr`, with immediate retries.
pub fn pipeline(
    server: &MockServer,
    store: &BillStore,
    summarizer: Arc<FakeSummarizer>,
    index: Arc<MemoryIndex>,
) -> EnrichmentPipeline {
    let source = GovInfoClient::new(&server.base_url(), None).expect("client");
    let settings = PipelineSettings {
        congress: 119,
        sessions: vec![1],
        bill_types: vec!["hr".into()],
        batch_size: 5,
        retry: RetryPolicy::immediate(2),
        chunking: ChunkSettings {
            chunk_size: 200,
            overlap: 20,
        },
        ..PipelineSettings::default()
    };
    EnrichmentPipeline::new(source, store.clone(), summarizer, index, settings)
}
