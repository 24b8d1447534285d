#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rustytodos::{
    BackendError, Completion, KeyValueStore, LocalBackend, MemoryStore, PersistenceBackend,
    Placement, Todo,
};
use tokio::sync::Notify;

pub fn init_logging() {
    rustytodos::logging::initialize_for_tests();
}

/// Local backend over an isolated in-memory slot, counting every call.
pub struct CountingBackend {
    inner: LocalBackend,
    calls: AtomicUsize,
}

impl CountingBackend {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: LocalBackend::new(storage),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PersistenceBackend for CountingBackend {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn placement(&self) -> Placement {
        self.inner.placement()
    }

    async fn list(&self) -> Result<Vec<Todo>, BackendError> {
        self.hit();
        self.inner.list().await
    }

    async fn insert(&self, text: &str) -> Result<Todo, BackendError> {
        self.hit();
        self.inner.insert(text).await
    }

    async fn update(&self, id: &str, completion: Completion) -> Result<(), BackendError> {
        self.hit();
        self.inner.update(id, completion).await
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        self.hit();
        self.inner.delete(id).await
    }

    async fn delete_completed(&self) -> Result<(), BackendError> {
        self.hit();
        self.inner.delete_completed().await
    }
}

/// Storage whose writes can be switched to fail, like a full disk, and whose
/// next read can be made to fail once.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    pub fail_writes: AtomicBool,
    read_fails_once: AtomicBool,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    pub fn fail_next_read(&self) {
        self.read_fails_once.store(true, Ordering::SeqCst);
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        if self.read_fails_once.swap(false, Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read denied"));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::StorageFull, "quota exceeded"));
        }
        self.inner.set(key, value)
    }
}

/// Backend whose calls wait until the test opens the gate.
pub struct GatedBackend {
    pub gate: Arc<Notify>,
    inner: LocalBackend,
}

impl GatedBackend {
    pub fn new(gate: Arc<Notify>) -> Self {
        Self {
            gate,
            inner: LocalBackend::new(Arc::new(MemoryStore::new())),
        }
    }
}

#[async_trait]
impl PersistenceBackend for GatedBackend {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn placement(&self) -> Placement {
        Placement::Back
    }

    async fn list(&self) -> Result<Vec<Todo>, BackendError> {
        self.gate.notified().await;
        self.inner.list().await
    }

    async fn insert(&self, text: &str) -> Result<Todo, BackendError> {
        self.gate.notified().await;
        self.inner.insert(text).await
    }

    async fn update(&self, id: &str, completion: Completion) -> Result<(), BackendError> {
        self.gate.notified().await;
        self.inner.update(id, completion).await
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        self.gate.notified().await;
        self.inner.delete(id).await
    }

    async fn delete_completed(&self) -> Result<(), BackendError> {
        self.gate.notified().await;
        self.inner.delete_completed().await
    }
}

pub fn texts(todos: &[Todo]) -> Vec<String> {
    todos.iter().map(|t| t.text.clone()).collect()
}

pub fn id_of(todos: &[Todo], text: &str) -> String {
    todos
        .iter()
        .find(|t| t.text == text)
        .map(|t| t.id.clone())
        .expect("todo with that text")
}
