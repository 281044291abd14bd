mod support;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dispatch_atoms::ambulances::Ambulance;
use dispatch_atoms::assignments;
use dispatch_atoms::store::{
    Collection, Document, DocumentStore, FieldFilter, MemoryStore, StoreError, Write,
};
use futures::stream::BoxStream;
use rstest::{fixture, rstest};
use support::*;

const FLEET: [&str; 6] = ["amb-1", "amb-2", "amb-3", "amb-4", "amb-5", "amb-6"];

#[fixture]
async fn fleet() -> MemoryStore {
    let store = MemoryStore::new();
    seed_driver(&store, "d1", true, true, &FLEET).await;
    for id in FLEET {
        seed_ambulance(&store, id, "available").await;
    }
    store
}

fn ambulance_ids(ambulances: &[Ambulance]) -> Vec<String> {
    ids(ambulances, |a| a.id.as_str())
}

/// Store whose next read fails once when armed.
struct FlakyStore {
    inner: MemoryStore,
    fail_next: AtomicBool,
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("connection reset".into()));
        }
        self.inner.get(collection, id).await
    }

    async fn query(
        &self,
        collection: Collection,
        filters: &[FieldFilter],
    ) -> Result<Vec<(String, Document)>, StoreError> {
        self.inner.query(collection, filters).await
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        self.inner.commit(writes).await
    }

    fn changes(&self, collection: Collection) -> BoxStream<'static, ()> {
        self.inner.changes(collection)
    }
}

#[rstest]
#[tokio::test]
async fn stream_recovers_after_a_failed_reload(#[future] fleet: MemoryStore) {
    let store = FlakyStore {
        inner: fleet.await,
        fail_next: AtomicBool::new(false),
    };
    let mut live = assignments::get_assigned_ambulances(&store, "d1");
    let first = next_snapshot(&mut live).await.unwrap();
    assert_eq!(first.len(), FLEET.len());

    store.fail_next.store(true, Ordering::SeqCst);
    seed_ambulance(&store.inner, "amb-1", "available").await;
    let err = next_snapshot(&mut live).await.unwrap_err();
    assert!(err.to_string().contains("connection reset"));

    // Same data as before the failure, but it replaces the error.
    seed_ambulance(&store.inner, "amb-1", "available").await;
    let recovered = next_snapshot(&mut live).await.unwrap();
    assert_eq!(recovered, first);
}

#[rstest]
#[tokio::test]
async fn deleted_ambulance_drops_out_of_the_stream(#[future] fleet: MemoryStore) {
    let store = fleet.await;
    let mut live = assignments::get_assigned_ambulances(&store, "d1");
    assert_eq!(next_snapshot(&mut live).await.unwrap().len(), FLEET.len());

    assert!(store.remove(Collection::Ambulances, "amb-2").await.is_some());

    let ambulances = next_snapshot(&mut live).await.unwrap();
    assert_eq!(ambulance_ids(&ambulances), ["amb-1", "amb-3", "amb-4", "amb-5", "amb-6"]);
    assert!(store.remove(Collection::Ambulances, "amb-2").await.is_none());
    assert_quiet(&mut live).await;
}

/// Store that records how many ambulance reads overlap.
struct GaugedStore {
    inner: MemoryStore,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl DocumentStore for GaugedStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        if collection != Collection::Ambulances {
            return self.inner.get(collection, id).await;
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let doc = self.inner.get(collection, id).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        doc
    }

    async fn query(
        &self,
        collection: Collection,
        filters: &[FieldFilter],
    ) -> Result<Vec<(String, Document)>, StoreError> {
        self.inner.query(collection, filters).await
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        self.inner.commit(writes).await
    }

    fn changes(&self, collection: Collection) -> BoxStream<'static, ()> {
        self.inner.changes(collection)
    }

    fn read_concurrency(&self) -> usize {
        2
    }
}

#[rstest]
#[tokio::test]
async fn ambulance_reads_respect_the_concurrency_limit(#[future] fleet: MemoryStore) {
    let store = GaugedStore {
        inner: fleet.await,
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    };

    let ambulances = assignments::assigned_ambulances(&store, "d1").await.unwrap();

    assert_eq!(ambulance_ids(&ambulances), FLEET);
    assert_eq!(store.peak.load(Ordering::SeqCst), 2);
    assert_eq!(store.in_flight.load(Ordering::SeqCst), 0);
}
