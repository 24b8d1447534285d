//! The todo store: sole owner and mutator of the session's todo collection.
//!
//! Every mutating operation asks the installed [`PersistenceBackend`] first
//! and touches the in-memory collection only once the backend confirmed the
//! change. A failed call leaves the collection exactly as it was.
//!
//! The store is meant to be shared (`Arc<TodoStore>`): methods take `&self`
//! and the internal lock is never held across an `.await`, so a caller can
//! issue an operation while an earlier one is still waiting on the backend.
//! Overlapping operations land in completion order.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use log::{debug, info, warn};

use crate::backend::{Placement, PersistenceBackend};
use crate::error::BackendError;
use crate::filter::{self, Filter};
use crate::lock_unpoisoned;
use crate::todo::{normalize_text, Todo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped(SkipReason),
}

/// Why an operation ended without touching the collection. None of these are
/// failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The text was empty after trimming.
    EmptyText,
    /// No todo with that id in the collection.
    UnknownId,
    /// `clear_completed` with nothing completed.
    NothingCompleted,
    /// The backend is scoped to a user and nobody is signed in.
    NoIdentity,
    /// The backend had no matching record for this user.
    MissingRemotely,
    /// The backend was swapped while the call was in flight.
    SessionChanged,
}

/// Everything the presentation layer renders, computed in one go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoView {
    pub todos: Vec<Todo>,
    pub filtered_todos: Vec<Todo>,
    pub active_count: usize,
    pub completed_count: usize,
    pub filter: Filter,
    pub loading: bool,
}

struct Inner {
    todos: Vec<Todo>,
    filter: Filter,
    backend: Arc<dyn PersistenceBackend>,
    generation: u64,
    loads_in_flight: usize,
}

/// Backend and session generation captured when an operation starts.
struct Ticket {
    backend: Arc<dyn PersistenceBackend>,
    generation: u64,
}

pub struct TodoStore {
    inner: Mutex<Inner>,
}

struct LoadingGuard<'a>(&'a TodoStore);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.0.lock();
        inner.loads_in_flight = inner.loads_in_flight.saturating_sub(1);
    }
}

impl TodoStore {
    /// An empty store. Call [`TodoStore::load`] to populate it.
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                todos: Vec::new(),
                filter: Filter::default(),
                backend,
                generation: 0,
                loads_in_flight: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_unpoisoned(&self.inner)
    }

    fn ticket(inner: &Inner) -> Result<Ticket, SkipReason> {
        if !inner.backend.has_identity() {
            debug!("No identity for {} backend, skipping", inner.backend.name());
            return Err(SkipReason::NoIdentity);
        }
        Ok(Ticket {
            backend: Arc::clone(&inner.backend),
            generation: inner.generation,
        })
    }

    /// Applies `change` unless the session moved on while the backend call
    /// was in flight.
    fn commit(&self, ticket: &Ticket, change: impl FnOnce(&mut Vec<Todo>)) -> Outcome {
        let mut inner = self.lock();
        if inner.generation != ticket.generation {
            debug!("Dropping result from a previous session");
            return Outcome::Skipped(SkipReason::SessionChanged);
        }
        change(&mut inner.todos);
        Outcome::Applied
    }

    fn failed(op: &str, ticket: &Ticket, err: BackendError) -> BackendError {
        warn!("{} failed on {} backend: {}", op, ticket.backend.name(), err);
        err
    }

    /// Discards the current collection, resets the filter and installs
    /// `backend`. Results of calls still running against the old backend are
    /// ignored when they arrive.
    pub fn switch_backend(&self, backend: Arc<dyn PersistenceBackend>) {
        let mut inner = self.lock();
        info!("Switching todo backend {} -> {}", inner.backend.name(), backend.name());
        inner.todos.clear();
        inner.filter = Filter::default();
        inner.backend = backend;
        inner.generation += 1;
    }

    /// Replaces the collection with whatever the backend lists.
    pub async fn load(&self) -> Result<Outcome, BackendError> {
        let ticket = match Self::ticket(&self.lock()) {
            Ok(ticket) => ticket,
            Err(reason) => return Ok(Outcome::Skipped(reason)),
        };
        self.lock().loads_in_flight += 1;
        let _loading = LoadingGuard(self);

        let todos = ticket
            .backend
            .list()
            .await
            .map_err(|e| Self::failed("load", &ticket, e))?;
        debug!("Loaded {} todos from {} backend", todos.len(), ticket.backend.name());
        Ok(self.commit(&ticket, move |current| *current = todos))
    }

    pub async fn add_todo(&self, text: &str) -> Result<Outcome, BackendError> {
        let Some(text) = normalize_text(text) else {
            debug!("Ignoring empty todo text");
            return Ok(Outcome::Skipped(SkipReason::EmptyText));
        };
        let ticket = match Self::ticket(&self.lock()) {
            Ok(ticket) => ticket,
            Err(reason) => return Ok(Outcome::Skipped(reason)),
        };

        let todo = ticket
            .backend
            .insert(&text)
            .await
            .map_err(|e| Self::failed("add", &ticket, e))?;
        debug!("Added todo {}", todo.id);
        let placement = ticket.backend.placement();
        Ok(self.commit(&ticket, move |todos| {
            if let Some(existing) = todos.iter_mut().find(|t| t.id == todo.id) {
                *existing = todo;
                return;
            }
            match placement {
                Placement::Front => todos.insert(0, todo),
                Placement::Back => todos.push(todo),
            }
        }))
    }

    pub async fn toggle_todo(&self, id: &str) -> Result<Outcome, BackendError> {
        let (ticket, completion) = {
            let inner = self.lock();
            let ticket = match Self::ticket(&inner) {
                Ok(ticket) => ticket,
                Err(reason) => return Ok(Outcome::Skipped(reason)),
            };
            let Some(todo) = inner.todos.iter().find(|t| t.id == id) else {
                return Ok(Outcome::Skipped(SkipReason::UnknownId));
            };
            (ticket, todo.toggled_completion(Utc::now()))
        };

        match ticket.backend.update(id, completion).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                warn!("Todo {} is gone on the {} backend", id, ticket.backend.name());
                return Ok(Outcome::Skipped(SkipReason::MissingRemotely));
            }
            Err(err) => return Err(Self::failed("toggle", &ticket, err)),
        }
        Ok(self.commit(&ticket, |todos| {
            if let Some(todo) = todos.iter_mut().find(|t| t.id == id) {
                todo.apply_completion(completion);
            }
        }))
    }

    pub async fn delete_todo(&self, id: &str) -> Result<Outcome, BackendError> {
        let ticket = {
            let inner = self.lock();
            let ticket = match Self::ticket(&inner) {
                Ok(ticket) => ticket,
                Err(reason) => return Ok(Outcome::Skipped(reason)),
            };
            if !inner.todos.iter().any(|t| t.id == id) {
                return Ok(Outcome::Skipped(SkipReason::UnknownId));
            }
            ticket
        };

        ticket
            .backend
            .delete(id)
            .await
            .map_err(|e| Self::failed("delete", &ticket, e))?;
        Ok(self.commit(&ticket, |todos| todos.retain(|t| t.id != id)))
    }

    pub async fn clear_completed(&self) -> Result<Outcome, BackendError> {
        let ticket = {
            let inner = self.lock();
            let ticket = match Self::ticket(&inner) {
                Ok(ticket) => ticket,
                Err(reason) => return Ok(Outcome::Skipped(reason)),
            };
            if filter::completed_count(&inner.todos) == 0 {
                return Ok(Outcome::Skipped(SkipReason::NothingCompleted));
            }
            ticket
        };

        ticket
            .backend
            .delete_completed()
            .await
            .map_err(|e| Self::failed("clear completed", &ticket, e))?;
        Ok(self.commit(&ticket, |todos| todos.retain(|t| !t.completed)))
    }

    pub fn set_filter(&self, filter: Filter) {
        self.lock().filter = filter;
    }

    pub fn filter(&self) -> Filter {
        self.lock().filter
    }

    pub fn todos(&self) -> Vec<Todo> {
        self.lock().todos.clone()
    }

    pub fn find(&self, id: &str) -> Option<Todo> {
        self.lock().todos.iter().find(|t| t.id == id).cloned()
    }

    pub fn filtered_todos(&self) -> Vec<Todo> {
        let inner = self.lock();
        filter::filtered_todos(&inner.todos, inner.filter)
    }

    pub fn active_count(&self) -> usize {
        filter::active_count(&self.lock().todos)
    }

    pub fn completed_count(&self) -> usize {
        filter::completed_count(&self.lock().todos)
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loads_in_flight > 0
    }

    pub fn backend_name(&self) -> &'static str {
        self.lock().backend.name()
    }

    pub fn view(&self) -> TodoView {
        let inner = self.lock();
        TodoView {
            todos: inner.todos.clone(),
            filtered_todos: filter::filtered_todos(&inner.todos, inner.filter),
            active_count: filter::active_count(&inner.todos),
            completed_count: filter::completed_count(&inner.todos),
            filter: inner.filter,
            loading: inner.loads_in_flight > 0,
        }
    }
}
