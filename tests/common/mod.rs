//! Scripted collaborators shared by the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use listing_sync::application::{SyncOptions, SyncPipeline};
use listing_sync::domain::entity::{Entity, EntityId, FetchedEntity};
use listing_sync::domain::services::{
    ClassificationError, ClassificationSource, ListingPage, ListingSource, PageFailure,
};
use listing_sync::infrastructure::MemoryStore;

pub fn entity(id: EntityId, name: &str) -> Entity {
    Entity {
        id,
        name: name.to_string(),
        category: None,
        favorite: false,
        bookmarked: false,
    }
}

pub fn classified(id: EntityId, name: &str, category: &str) -> Entity {
    Entity {
        category: Some(category.to_string()),
        ..entity(id, name)
    }
}

pub fn page(records: &[(EntityId, &str)], total_pages: Option<u32>) -> ListingPage {
    ListingPage::new(
        records
            .iter()
            .map(|(id, name)| FetchedEntity::new(*id, *name))
            .collect(),
        total_pages,
    )
}

/// Tracks how many operations are in flight and the highest value seen
#[derive(Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    pub fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Listing source answering from a fixed page table
#[derive(Default)]
pub struct ScriptedListing {
    pages: HashMap<u32, Result<ListingPage, PageFailure>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<u32>>,
    pub in_flight: Gauge,
}

impl ScriptedListing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, number: u32, result: Result<ListingPage, PageFailure>) -> Self {
        self.pages.insert(number, result);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingSource for ScriptedListing {
    async fn fetch_listing_page(&self, number: u32) -> Result<ListingPage, PageFailure> {
        self.calls.lock().unwrap().push(number);
        self.in_flight.enter();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.exit();
        self.pages
            .get(&number)
            .cloned()
            .unwrap_or_else(|| {
                Err(PageFailure::Unreachable {
                    page: number,
                    reason: "no scripted response".into(),
                })
            })
    }
}

/// Classification source answering `category-<id>` unless scripted otherwise
#[derive(Default)]
pub struct ScriptedClassifier {
    answers: HashMap<EntityId, Result<String, ClassificationError>>,
    calls: AtomicUsize,
    pub in_flight: Gauge,
    delay: Option<Duration>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, id: EntityId, result: Result<String, ClassificationError>) -> Self {
        self.answers.insert(id, result);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClassificationSource for ScriptedClassifier {
    async fn fetch_classification(&self, id: EntityId) -> Result<String, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.in_flight.enter();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.exit();
        self.answers
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Ok(format!("category-{id}")))
    }
}

pub struct Harness {
    pub pipeline: SyncPipeline,
    pub listing: Arc<ScriptedListing>,
    pub classifier: Arc<ScriptedClassifier>,
    pub store: Arc<MemoryStore>,
}

pub async fn harness(
    listing: ScriptedListing,
    classifier: ScriptedClassifier,
    store: MemoryStore,
) -> Harness {
    harness_with_options(listing, classifier, store, SyncOptions::default()).await
}

pub async fn harness_with_options(
    listing: ScriptedListing,
    classifier: ScriptedClassifier,
    store: MemoryStore,
    options: SyncOptions,
) -> Harness {
    let listing = Arc::new(listing);
    let classifier = Arc::new(classifier);
    let store = Arc::new(store);
    let pipeline = SyncPipeline::open(
        listing.clone(),
        classifier.clone(),
        store.clone(),
        store.clone(),
        options,
    )
    .await
    .unwrap();
    Harness {
        pipeline,
        listing,
        classifier,
        store,
    }
}

pub fn ids(records: &[Entity]) -> Vec<EntityId> {
    records.iter().map(|e| e.id).collect()
}
