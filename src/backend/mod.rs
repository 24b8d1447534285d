//! Persistence backends for the todo store.
//!
//! [`PersistenceBackend`] is the one capability the store talks to. Two
//! implementations exist: [`LocalBackend`] keeps a JSON snapshot of the whole
//! collection in a key-value slot, [`RemoteBackend`] issues one HTTP call per
//! operation against a per-user table.

mod local;
mod remote;
mod storage;

pub use local::{LocalBackend, STORAGE_KEY};
pub use remote::{RemoteBackend, RemoteClient};
pub use storage::{FileStore, KeyValueStore, MemoryStore};

use async_trait::async_trait;

use crate::error::BackendError;
use crate::todo::{Completion, Todo};

/// Where a freshly inserted todo goes in the in-memory collection, matching
/// the order the backend lists todos in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Insertion order; new todos are appended.
    Back,
    /// Newest first; new todos are prepended.
    Front,
}

#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    fn placement(&self) -> Placement;

    /// `false` when the backend is scoped to a user and nobody is signed in.
    fn has_identity(&self) -> bool {
        true
    }

    async fn list(&self) -> Result<Vec<Todo>, BackendError>;

    /// Persists a new incomplete todo. `text` is already trimmed and non-empty.
    async fn insert(&self, text: &str) -> Result<Todo, BackendError>;

    /// Fails with [`BackendError::NotFound`] when no todo matched `id`.
    async fn update(&self, id: &str, completion: Completion) -> Result<(), BackendError>;

    /// Deleting an unknown id is not an error.
    async fn delete(&self, id: &str) -> Result<(), BackendError>;

    async fn delete_completed(&self) -> Result<(), BackendError>;
}
