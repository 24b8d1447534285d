//! RustyTodos core: the todo store, its persistence backends and the auth
//! session that decides which backend is in use.

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod filter;
mod http;
pub mod logging;
pub mod session;
pub mod store;
pub mod todo;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use auth::{AuthSession, Credentials, Identity, SignUpOutcome};
pub use backend::{
    FileStore, KeyValueStore, LocalBackend, MemoryStore, PersistenceBackend, Placement,
    RemoteBackend, RemoteClient,
};
pub use config::{Config, RemoteConfig};
pub use error::{AuthError, BackendError, ConfigError};
pub use filter::Filter;
pub use session::BackendSelector;
pub use store::{Outcome, SkipReason, TodoStore, TodoView};
pub use todo::{Completion, Todo};

/// A panic while holding one of our locks never leaves the data half-written,
/// so a poisoned lock is still safe to use.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
