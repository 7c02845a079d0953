mod common;

use std::time::Duration;

use billwatch::bill::BillKey;
use billwatch::index::{BILL_NAMESPACE, SemanticIndex, bill_filter_values};
use billwatch::storage::{BillStore, EnrichedDocument};
use billwatch::sweeper::{DEFAULT_INDEX_GRACE, SweepReport, sweep_index, sweep_versions};
use common::{MemoryIndex, good_summary};
use serde_json::Map;

fn enriched(key: &BillKey, version_code: &str) -> EnrichedDocument {
    EnrichedDocument {
        key: key.clone(),
        version_code: version_code.into(),
        title: format!("A bill {}", key.label()),
        short_title: None,
        sponsor: None,
        committees: Vec::new(),
        action_date: Some("2025-01-03".into()),
        full_text: "Be it enacted by the Senate and House of Representatives.".into(),
        source_url: format!(
            "https://www.govinfo.gov/content/pkg/BILLS-{0}{1}{2}{3}/xml/BILLS-{0}{1}{2}{3}.xml",
            key.congress, key.bill_type, key.bill_number, version_code
        ),
        summary: good_summary(),
    }
}

async fn index_bill(index: &MemoryIndex, key: &BillKey) {
    index
        .add(
            BILL_NAMESPACE,
            &key.index_key(),
            &["Be it enacted.".to_string()],
            &Map::new(),
            &bill_filter_values(key),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn scenario_c_deletes_entry_without_concept() {
    let store = BillStore::in_memory().unwrap();
    let index = MemoryIndex::new();
    index_bill(&index, &BillKey::new(119, "hr", "999")).await;

    let report = sweep_index(index.as_ref(), &store, Duration::ZERO).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.orphaned, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(index.len(), 0);
}

#[tokio::test]
async fn index_sweep_keeps_entries_with_concepts_and_is_restartable() {
    let store = BillStore::in_memory().unwrap();
    let index = MemoryIndex::new();
    let kept = BillKey::new(119, "hr", "1");
    store.persist_enrichment(&enriched(&kept, "ih")).unwrap();
    index_bill(&index, &kept).await;
    index_bill(&index, &BillKey::new(119, "s", "42")).await;

    let first = sweep_index(index.as_ref(), &store, Duration::ZERO).await.unwrap();
    assert_eq!(first.scanned, 2);
    assert_eq!(first.deleted, 1);
    assert_eq!(index.keys(), vec!["119-hr-1".to_string()]);

    let second = sweep_index(index.as_ref(), &store, Duration::ZERO).await.unwrap();
    assert_eq!(
        second,
        SweepReport {
            scanned: 1,
            ..SweepReport::default()
        }
    );
}

#[tokio::test]
async fn index_sweep_spares_entries_written_within_the_grace_window() {
    let store = BillStore::in_memory().unwrap();
    let index = MemoryIndex::new();
    let key = BillKey::new(119, "hr", "77");
    // Indexed by an in-flight pass that has not persisted the bill yet.
    index_bill(&index, &key).await;

    let report = sweep_index(index.as_ref(), &store, DEFAULT_INDEX_GRACE).await.unwrap();
    assert_eq!(report.recent, 1);
    assert_eq!(report.deleted, 0);
    assert_eq!(index.len(), 1);

    store.persist_enrichment(&enriched(&key, "ih")).unwrap();
    let report = sweep_index(index.as_ref(), &store, DEFAULT_INDEX_GRACE).await.unwrap();
    assert_eq!(report.recent, 0);
    assert_eq!(index.keys(), vec!["119-hr-77".to_string()]);
}

#[tokio::test]
async fn index_sweep_pages_through_large_collections_while_deleting() {
    let store = BillStore::in_memory().unwrap();
    let index = MemoryIndex::new();
    for number in 1..=600 {
        index_bill(&index, &BillKey::new(118, "hr", number.to_string())).await;
    }

    let report = sweep_index(index.as_ref(), &store, Duration::ZERO).await.unwrap();
    assert_eq!(report.scanned, 600);
    assert_eq!(report.deleted, 600);
    assert_eq!(index.len(), 0);
}

#[tokio::test]
async fn index_sweep_leaves_unidentifiable_entries_alone() {
    let store = BillStore::in_memory().unwrap();
    let index = MemoryIndex::new();
    index
        .add(
            BILL_NAMESPACE,
            "not-a-bill",
            &["text".to_string()],
            &Map::new(),
            &[],
        )
        .await
        .unwrap();

    let report = sweep_index(index.as_ref(), &store, Duration::ZERO).await.unwrap();
    assert_eq!(report.unidentified, 1);
    assert_eq!(report.deleted, 0);
    assert_eq!(index.len(), 1);
}

#[test]
fn version_sweep_removes_versions_of_deleted_concepts() {
    let store = BillStore::in_memory().unwrap();
    let kept = BillKey::new(119, "hr", "1");
    let removed = BillKey::new(119, "s", "7");
    store.persist_enrichment(&enriched(&kept, "ih")).unwrap();
    store.persist_enrichment(&enriched(&kept, "rh")).unwrap();
    let removed_id = store
        .persist_enrichment(&enriched(&removed, "is"))
        .unwrap()
        .bill_id;
    store.persist_enrichment(&enriched(&removed, "rs")).unwrap();
    assert!(store.delete_concept(&removed).unwrap());

    let report = sweep_versions(&store).unwrap();
    assert_eq!(report.scanned, 4);
    assert_eq!(report.orphaned, 2);
    assert_eq!(report.deleted, 2);
    assert!(store.versions_for(removed_id).unwrap().is_empty());
    assert_eq!(store.count_versions().unwrap(), 2);

    let again = sweep_versions(&store).unwrap();
    assert_eq!(again.scanned, 2);
    assert_eq!(again.deleted, 0);
}
