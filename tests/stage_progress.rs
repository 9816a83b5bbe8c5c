//! Progress reporting and state transitions of the individual stages

mod common;

use std::sync::{Arc, Mutex};

use listing_sync::application::enrichment_stage::run_enrichment_stage;
use listing_sync::application::listing_stage::{ListingFetchStage, ListingState};
use listing_sync::application::record_book::RecordBook;
use listing_sync::domain::SyncProgress;
use listing_sync::domain::services::PageFailure;
use listing_sync::infrastructure::MemoryStore;

use common::{ScriptedClassifier, ScriptedListing, classified, entity, page};

fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(SyncProgress) + Send + Sync) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |p: SyncProgress| sink.lock().unwrap().push(p.message))
}

#[tokio::test]
async fn listing_reports_each_page() {
    let listing = ScriptedListing::new()
        .page(1, Ok(page(&[(1, "A")], Some(3))))
        .page(2, Ok(page(&[(2, "B")], Some(3))))
        .page(3, Ok(page(&[(3, "C")], Some(3))));
    let book = RecordBook::load(Arc::new(MemoryStore::default())).await.unwrap();
    let (seen, report) = recorder();

    let mut stage = ListingFetchStage::new(&listing, &book, 1);
    assert_eq!(stage.state(), ListingState::FetchingFirstPage);
    let outcome = stage.run(&report).await.unwrap();

    assert_eq!(stage.state(), ListingState::Done);
    assert_eq!(outcome.total_pages, 3);
    assert_eq!(outcome.new_records, 3);
    assert_eq!(*seen.lock().unwrap(), vec!["1 / 3", "2 / 3", "3 / 3"]);
    assert_eq!(listing.calls(), vec![1, 2, 3]);
}

#[tokio::test]
async fn listing_failure_on_first_page_commits_nothing() {
    let listing = ScriptedListing::new().page(1, Err(PageFailure::NotAuthenticated));
    let store = Arc::new(MemoryStore::with_records(vec![classified(9, "Kept", "x")]));
    let book = RecordBook::load(store.clone()).await.unwrap();
    let (seen, report) = recorder();

    let mut stage = ListingFetchStage::new(&listing, &book, 5);
    stage.run(&report).await.unwrap_err();

    assert_eq!(stage.state(), ListingState::Failed);
    assert!(!stage.first_page_committed());
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(store.record_saves(), 0);
    assert_eq!(book.snapshot().await, vec![classified(9, "Kept", "x")]);
}

#[tokio::test]
async fn listing_persists_every_page() {
    let listing = ScriptedListing::new()
        .page(1, Ok(page(&[(1, "A")], Some(2))))
        .page(2, Ok(page(&[(2, "B")], Some(2))));
    let store = Arc::new(MemoryStore::default());
    let book = RecordBook::load(store.clone()).await.unwrap();
    let (_seen, report) = recorder();

    ListingFetchStage::new(&listing, &book, 5)
        .run(&report)
        .await
        .unwrap();

    assert_eq!(store.record_saves(), 2);
    assert_eq!(store.records().len(), 2);
}

#[tokio::test]
async fn listing_writes_each_page_before_reporting_it() {
    let listing = ScriptedListing::new()
        .page(1, Ok(page(&[(1, "A"), (2, "B")], Some(4))))
        .page(2, Ok(page(&[(3, "C")], Some(4))))
        .page(3, Ok(page(&[(4, "D"), (5, "E")], Some(4))))
        .page(4, Ok(page(&[(6, "F")], Some(4))));
    let store = Arc::new(MemoryStore::default());
    let book = RecordBook::load(store.clone()).await.unwrap();

    // Each report must see at least as many stored pages as it counts
    let lagging = Arc::new(Mutex::new(Vec::new()));
    let checked = {
        let store = store.clone();
        let lagging = lagging.clone();
        move |p: SyncProgress| {
            let reported: usize = p.message.split(" / ").next().unwrap().parse().unwrap();
            if store.record_saves() < reported {
                lagging.lock().unwrap().push(p.message);
            }
        }
    };

    ListingFetchStage::new(&listing, &book, 2)
        .run(&checked)
        .await
        .unwrap();

    assert!(lagging.lock().unwrap().is_empty(), "{:?}", lagging.lock().unwrap());
    assert_eq!(store.records().len(), 6);
}

#[tokio::test]
async fn enrichment_writes_each_category_before_reporting_it() {
    let store = Arc::new(MemoryStore::with_records(vec![
        entity(1, "A"),
        entity(2, "B"),
        entity(3, "C"),
    ]));
    let book = RecordBook::load(store.clone()).await.unwrap();
    let classifier = ScriptedClassifier::new();

    let lagging = Arc::new(Mutex::new(Vec::new()));
    let checked = {
        let store = store.clone();
        let lagging = lagging.clone();
        move |p: SyncProgress| {
            let reported: usize = p.message.split(" / ").next().unwrap().parse().unwrap();
            let stored = store
                .records()
                .iter()
                .filter(|e| e.category.is_some())
                .count();
            if stored < reported {
                lagging.lock().unwrap().push(p.message);
            }
        }
    };

    let summary = run_enrichment_stage(&classifier, &book, 3, &checked).await;

    assert_eq!(summary.enriched, 3);
    assert!(lagging.lock().unwrap().is_empty(), "{:?}", lagging.lock().unwrap());
}

#[tokio::test]
async fn enrichment_reports_each_entity() {
    let store = Arc::new(MemoryStore::with_records(vec![entity(1, "A"), entity(2, "B")]));
    let book = RecordBook::load(store.clone()).await.unwrap();
    let classifier = ScriptedClassifier::new();
    let (seen, report) = recorder();

    let summary = run_enrichment_stage(&classifier, &book, 1, &report).await;

    assert_eq!(summary.enriched, 2);
    assert_eq!(*seen.lock().unwrap(), vec!["1 / 2", "2 / 2"]);
    assert_eq!(store.record_saves(), 2);
}

#[tokio::test]
async fn enrichment_with_nothing_pending_reports_nothing() {
    let book = RecordBook::load(Arc::new(MemoryStore::default())).await.unwrap();
    let classifier = ScriptedClassifier::new();
    let (seen, report) = recorder();

    let summary = run_enrichment_stage(&classifier, &book, 5, &report).await;

    assert_eq!(summary.attempted, 0);
    assert_eq!(classifier.calls(), 0);
    assert!(seen.lock().unwrap().is_empty());
}
