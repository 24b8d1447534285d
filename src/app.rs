// app.rs
//
// Presentation state for the terminal front end. Everything todo-related is
// forwarded to the store; this only tracks what the user is typing, which
// row is selected and the last notification.

use std::path::PathBuf;
use std::sync::Arc;

use log::{error, warn};
use rustytodos::session::apply_identity;
use rustytodos::{
    AuthSession, BackendSelector, Config, Credentials, Filter, Identity, Outcome, SignUpOutcome,
    Todo, TodoStore, TodoView,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AuthStep {
    Username,
    Email,
    Password,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AuthKind {
    SignIn,
    SignUp,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    EditingTodo,
    Authenticating(AuthKind, AuthStep),
}

#[derive(Clone, Debug)]
pub struct Status {
    pub text: String,
    pub is_error: bool,
}

pub struct App {
    pub store: Arc<TodoStore>,
    pub auth: AuthSession,
    selector: BackendSelector,
    config: Config,
    config_path: PathBuf,

    pub input_mode: InputMode,
    pub input: String,
    pub selected: usize,
    pub status: Option<Status>,

    auth_username: String,
    auth_email: String,
}

impl App {
    pub fn new(
        store: Arc<TodoStore>,
        auth: AuthSession,
        selector: BackendSelector,
        config: Config,
        config_path: PathBuf,
    ) -> Self {
        Self {
            store,
            auth,
            selector,
            config,
            config_path,
            input_mode: InputMode::Normal,
            input: String::new(),
            selected: 0,
            status: None,
            auth_username: String::new(),
            auth_email: String::new(),
        }
    }

    /// Restores a saved session, if any, and loads the matching todos.
    pub async fn start(&mut self) {
        if let Some(identity) = self.config.session.clone() {
            self.auth.restore(identity);
        }
        self.reload_for_identity().await;
    }

    pub fn view(&self) -> TodoView {
        self.store.view()
    }

    pub fn signed_in_as(&self) -> Option<String> {
        self.auth.current().map(|i| i.email)
    }

    fn selected_todo(&self) -> Option<Todo> {
        self.store.filtered_todos().get(self.selected).cloned()
    }

    fn info(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            text: text.into(),
            is_error: false,
        });
    }

    fn fail(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            text: text.into(),
            is_error: true,
        });
    }

    pub fn clamp_selection(&mut self) {
        let len = self.store.filtered_todos().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.store.filtered_todos().len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.store.set_filter(filter);
        self.selected = 0;
    }

    pub fn cycle_filter(&mut self) {
        self.set_filter(self.store.filter().next());
    }

    pub fn begin_add(&mut self) {
        self.input_mode = InputMode::EditingTodo;
        self.input.clear();
        self.status = None;
    }

    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input.clear();
        self.auth_username.clear();
        self.auth_email.clear();
    }

    pub async fn submit_todo(&mut self) {
        let text = self.input.trim().to_string();
        match self.store.add_todo(&text).await {
            Ok(Outcome::Applied) => {
                self.info(format!("Todo added: \"{}\"", text));
                self.input.clear();
                self.input_mode = InputMode::Normal;
            }
            Ok(Outcome::Skipped(_)) => {}
            Err(e) => self.fail(format!("Could not add todo: {}", e)),
        }
    }

    pub async fn toggle_selected(&mut self) {
        let Some(todo) = self.selected_todo() else {
            return;
        };
        if let Err(e) = self.store.toggle_todo(&todo.id).await {
            self.fail(format!("Could not update todo: {}", e));
        }
        self.clamp_selection();
    }

    pub async fn delete_selected(&mut self) {
        let Some(todo) = self.selected_todo() else {
            return;
        };
        match self.store.delete_todo(&todo.id).await {
            Ok(Outcome::Applied) => self.info(format!("Todo deleted: \"{}\"", todo.text)),
            Ok(Outcome::Skipped(_)) => {}
            Err(e) => self.fail(format!("Could not delete todo: {}", e)),
        }
        self.clamp_selection();
    }

    pub async fn clear_completed(&mut self) {
        let count = self.store.completed_count();
        match self.store.clear_completed().await {
            Ok(Outcome::Applied) => self.info(format!(
                "{} completed {} removed",
                count,
                if count == 1 { "todo" } else { "todos" }
            )),
            Ok(Outcome::Skipped(_)) => {}
            Err(e) => self.fail(format!("Could not clear completed todos: {}", e)),
        }
        self.clamp_selection();
    }

    pub async fn reload(&mut self) {
        match self.store.load().await {
            Ok(_) => self.info("Todos reloaded"),
            Err(e) => self.fail(format!("Could not load todos: {}", e)),
        }
        self.clamp_selection();
    }

    pub fn begin_auth(&mut self, kind: AuthKind) {
        let first = match kind {
            AuthKind::SignUp => AuthStep::Username,
            AuthKind::SignIn => AuthStep::Email,
        };
        self.input_mode = InputMode::Authenticating(kind, first);
        self.input.clear();
        self.auth_username.clear();
        self.auth_email.clear();
        self.status = None;
    }

    /// Stores the current input for this step and moves on; the password step
    /// submits.
    pub async fn advance_auth(&mut self) {
        let InputMode::Authenticating(kind, step) = self.input_mode else {
            return;
        };
        let value = std::mem::take(&mut self.input);
        match step {
            AuthStep::Username => {
                self.auth_username = value.trim().to_string();
                self.input_mode = InputMode::Authenticating(kind, AuthStep::Email);
            }
            AuthStep::Email => {
                self.auth_email = value.trim().to_string();
                self.input_mode = InputMode::Authenticating(kind, AuthStep::Password);
            }
            AuthStep::Password => {
                let mut creds = Credentials::new(self.auth_email.clone(), value);
                if kind == AuthKind::SignUp {
                    creds = creds.with_username(self.auth_username.clone());
                }
                self.cancel_input();
                self.authenticate(kind, &creds).await;
            }
        }
    }

    async fn authenticate(&mut self, kind: AuthKind, creds: &Credentials) {
        let result = match kind {
            AuthKind::SignIn => self.auth.sign_in(creds).await.map(Some),
            AuthKind::SignUp => self.auth.sign_up(creds).await.map(|outcome| match outcome {
                SignUpOutcome::SignedIn(identity) => Some(identity),
                SignUpOutcome::ConfirmationPending => None,
            }),
        };
        match result {
            Ok(Some(identity)) => {
                self.remember_session(Some(identity.clone()));
                self.reload_for_identity().await;
                if !self.status.as_ref().is_some_and(|s| s.is_error) {
                    self.info(format!("Signed in as {}", identity.email));
                }
            }
            Ok(None) => self.info("Check your email to confirm the account, then sign in"),
            Err(e) => self.fail(format!("Authentication failed: {}", e)),
        }
    }

    pub async fn sign_out(&mut self) {
        if !self.auth.is_signed_in() {
            return;
        }
        self.auth.sign_out().await;
        self.remember_session(None);
        self.reload_for_identity().await;
        if !self.status.as_ref().is_some_and(|s| s.is_error) {
            self.info("Signed out");
        }
    }

    async fn reload_for_identity(&mut self) {
        self.selected = 0;
        self.status = None;
        if let Err(e) = apply_identity(&self.store, &self.selector, self.auth.current()).await {
            error!("Loading todos failed: {}", e);
            self.fail(format!("Could not load todos: {}", e));
        }
    }

    fn remember_session(&mut self, identity: Option<Identity>) {
        self.config.session = identity;
        if let Err(e) = self.config.save(&self.config_path) {
            warn!("Could not save session: {}", e);
        }
    }
}
