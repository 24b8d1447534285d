// local.rs

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};

use super::{KeyValueStore, Placement, PersistenceBackend};
use crate::error::BackendError;
use crate::lock_unpoisoned;
use crate::todo::{Completion, Todo};

pub const STORAGE_KEY: &str = "todos";

/// Snapshot persistence: every mutation rewrites the whole collection.
///
/// The backend remembers the last snapshot it read or wrote successfully and
/// derives the next one from it, so a failed write leaves both the slot and
/// the remembered snapshot untouched.
pub struct LocalBackend {
    storage: Arc<dyn KeyValueStore>,
    snapshot: Mutex<Option<Vec<Todo>>>,
}

impl LocalBackend {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            snapshot: Mutex::new(None),
        }
    }

    /// Reads the stored snapshot. A missing or malformed snapshot comes back
    /// as an empty collection; a storage failure is an error.
    pub fn read(&self) -> Result<Vec<Todo>, BackendError> {
        let Some(text) = self.storage.get(STORAGE_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<Todo>>(&text) {
            Ok(todos) => Ok(dedup_by_id(todos.into_iter().map(Todo::normalized).collect())),
            Err(err) => {
                warn!("Stored todos are malformed, starting empty: {}", err);
                Ok(Vec::new())
            }
        }
    }

    /// Replaces the stored snapshot with `todos`.
    pub fn write(&self, todos: &[Todo]) -> Result<(), BackendError> {
        let text = serde_json::to_string(todos).map_err(std::io::Error::from)?;
        self.storage.set(STORAGE_KEY, &text)?;
        Ok(())
    }

    /// Applies `change` to the current snapshot, writes the result and only
    /// then makes it the current snapshot.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Vec<Todo>) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let mut guard = lock_unpoisoned(&self.snapshot);
        let mut next = match guard.as_ref() {
            Some(todos) => todos.clone(),
            None => self.read()?,
        };
        let out = change(&mut next)?;
        self.write(&next)?;
        *guard = Some(next);
        Ok(out)
    }
}

fn dedup_by_id(todos: Vec<Todo>) -> Vec<Todo> {
    let mut out: Vec<Todo> = Vec::with_capacity(todos.len());
    for todo in todos {
        if out.iter().any(|t| t.id == todo.id) {
            warn!("Dropping duplicate stored todo {}", todo.id);
            continue;
        }
        out.push(todo);
    }
    out
}

#[async_trait]
impl PersistenceBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn placement(&self) -> Placement {
        Placement::Back
    }

    async fn list(&self) -> Result<Vec<Todo>, BackendError> {
        let todos = self.read()?;
        debug!("Loaded {} local todos", todos.len());
        *lock_unpoisoned(&self.snapshot) = Some(todos.clone());
        Ok(todos)
    }

    async fn insert(&self, text: &str) -> Result<Todo, BackendError> {
        self.mutate(|todos| {
            let mut todo = Todo::new_local(text.to_string(), Utc::now());
            while todos.iter().any(|t| t.id == todo.id) {
                todo = Todo::new_local(todo.text, todo.created_at);
            }
            todos.push(todo.clone());
            Ok(todo)
        })
    }

    async fn update(&self, id: &str, completion: Completion) -> Result<(), BackendError> {
        self.mutate(|todos| {
            let todo = todos
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| BackendError::NotFound { id: id.to_string() })?;
            todo.apply_completion(completion);
            Ok(())
        })
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        self.mutate(|todos| {
            todos.retain(|t| t.id != id);
            Ok(())
        })
    }

    async fn delete_completed(&self) -> Result<(), BackendError> {
        self.mutate(|todos| {
            todos.retain(|t| !t.completed);
            Ok(())
        })
    }
}
