//! Keeps a [`TodoStore`] on the backend that matches the current identity.

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::watch;

use crate::auth::Identity;
use crate::backend::{KeyValueStore, LocalBackend, PersistenceBackend, RemoteBackend, RemoteClient};
use crate::error::BackendError;
use crate::store::{Outcome, TodoStore};

/// Picks the backend for an identity: remote when someone is signed in and a
/// server is configured, the local snapshot otherwise.
#[derive(Clone)]
pub struct BackendSelector {
    storage: Arc<dyn KeyValueStore>,
    remote: Option<RemoteClient>,
}

impl BackendSelector {
    pub fn new(storage: Arc<dyn KeyValueStore>, remote: Option<RemoteClient>) -> Self {
        Self { storage, remote }
    }

    pub fn select(&self, identity: Option<Identity>) -> Arc<dyn PersistenceBackend> {
        match (identity, &self.remote) {
            (Some(identity), Some(client)) => {
                Arc::new(RemoteBackend::new(client.clone(), Some(identity)))
            }
            (Some(identity), None) => {
                warn!(
                    "{} is signed in but no server is configured; using local todos",
                    identity.email
                );
                Arc::new(LocalBackend::new(Arc::clone(&self.storage)))
            }
            (None, _) => Arc::new(LocalBackend::new(Arc::clone(&self.storage))),
        }
    }
}

/// Clears the store, installs the backend for `identity` and reloads.
pub async fn apply_identity(
    store: &TodoStore,
    selector: &BackendSelector,
    identity: Option<Identity>,
) -> Result<Outcome, BackendError> {
    match &identity {
        Some(id) => info!("Loading todos for {}", id.email),
        None => info!("Loading local todos"),
    }
    store.switch_backend(selector.select(identity));
    store.load().await
}

/// Applies every identity change broadcast on `identity` until the sender
/// goes away. Load failures are logged and the loop keeps following.
pub async fn follow_identity(
    store: Arc<TodoStore>,
    selector: BackendSelector,
    mut identity: watch::Receiver<Option<Identity>>,
) {
    while identity.changed().await.is_ok() {
        let current = identity.borrow_and_update().clone();
        if let Err(err) = apply_identity(&store, &selector, current).await {
            warn!("Reloading todos after identity change failed: {}", err);
        }
    }
}
