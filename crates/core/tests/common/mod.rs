//! Shared helpers for store integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bf_core::{
    Backend, BackendResult, Bucket, Entry, MemoryBackend, Object, Resource, ResourceId,
};
use bytes::Bytes;
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Counts WARN events seen by the thread-local subscriber
struct WarningCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for WarningCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Handle on the warnings logged while the guard is alive
pub struct Warnings {
    count: Arc<AtomicUsize>,
    _guard: DefaultGuard,
}

impl Warnings {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Install a warning counter for the current thread
///
/// `#[tokio::test]` runs on a current-thread runtime, so store calls made
/// by the test are seen by this subscriber.
pub fn capture_warnings() -> Warnings {
    let count = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarningCounter(count.clone()));
    Warnings {
        count,
        _guard: tracing::subscriber::set_default(subscriber),
    }
}

/// Memory backend that records every contract call as `"<op> <id>"`
///
/// Clones share both the tree and the call log.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    inner: Arc<MemoryBackend>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split(' ').next() == Some(op))
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// The wrapped tree, for arranging fixtures without recording them
    pub fn tree(&self) -> &MemoryBackend {
        &self.inner
    }

    fn record(&self, op: &str, id: &ResourceId) {
        self.calls.lock().unwrap().push(format!("{op} {id}"));
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    type Bucket = Bucket;
    type Object = Object;

    fn is_local(&self) -> bool {
        self.calls.lock().unwrap().push("is_local".to_string());
        self.inner.is_local()
    }

    async fn is_bucket(&self, id: &ResourceId) -> bool {
        self.record("is_bucket", id);
        self.inner.is_bucket(id).await
    }

    async fn is_object(&self, id: &ResourceId) -> bool {
        self.record("is_object", id);
        self.inner.is_object(id).await
    }

    async fn create_bucket(&self, bucket: &Bucket) -> BackendResult<()> {
        self.record("create_bucket", bucket.id());
        self.inner.create_bucket(bucket).await
    }

    async fn read_bucket(&self, bucket: &Bucket) -> BackendResult<Vec<Entry>> {
        self.record("read_bucket", bucket.id());
        self.inner.read_bucket(bucket).await
    }

    async fn delete_bucket(&self, bucket: &Bucket) -> BackendResult<()> {
        self.record("delete_bucket", bucket.id());
        self.inner.delete_bucket(bucket).await
    }

    async fn create_object(&self, object: &Object, value: Bytes) -> BackendResult<()> {
        self.record("create_object", object.id());
        self.inner.create_object(object, value).await
    }

    async fn read_object(&self, object: &Object) -> BackendResult<Bytes> {
        self.record("read_object", object.id());
        self.inner.read_object(object).await
    }

    async fn delete_object(&self, object: &Object) -> BackendResult<()> {
        self.record("delete_object", object.id());
        self.inner.delete_object(object).await
    }
}
