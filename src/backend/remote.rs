// remote.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use super::{Placement, PersistenceBackend};
use crate::auth::Identity;
use crate::config::RemoteConfig;
use crate::error::BackendError;
use crate::http;
use crate::todo::{Completion, Todo};

const TODOS_PATH: &str = "/rest/v1/todos";

/// Thin HTTP client bound to one server and its public API key.
#[derive(Clone)]
pub struct RemoteClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl RemoteClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, BackendError> {
        let base_url = config.url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(BackendError::Transport {
                url: config.url.clone(),
                message: "server URL is empty".into(),
            });
        }
        let client = Client::builder().build().map_err(|e| BackendError::Transport {
            url: base_url.clone(),
            message: format!("HTTP client build failed: {e}"),
        })?;
        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            client,
        })
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Request with the headers every endpoint expects. Without a user token
    /// the API key doubles as the bearer, as the auth endpoints require.
    pub(crate) fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let bearer = token.unwrap_or(&self.api_key);
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, format!("Bearer {bearer}"))
            .header(ACCEPT, "application/json")
    }

    pub async fn list(&self, user: &Identity) -> Result<Vec<Todo>, BackendError> {
        let owner = format!("eq.{}", user.user_id);
        let builder = self
            .request(Method::GET, TODOS_PATH, Some(&user.access_token))
            .query(&[
                ("select", "*"),
                ("user_id", owner.as_str()),
                ("order", "created_at.desc"),
            ]);
        let rows: Vec<TodoRow> = decode(&self.send(builder).await?)?;
        Ok(rows.into_iter().map(Todo::from).collect())
    }

    pub async fn insert(&self, user: &Identity, text: &str) -> Result<Todo, BackendError> {
        let builder = self
            .request(Method::POST, TODOS_PATH, Some(&user.access_token))
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "return=representation")
            .json(&json!({
                "text": text,
                "completed": false,
                "user_id": user.user_id,
            }));
        let rows: Vec<TodoRow> = decode(&self.send(builder).await?)?;
        rows.into_iter()
            .next()
            .map(Todo::from)
            .ok_or_else(|| BackendError::Decode("insert returned no row".into()))
    }

    pub async fn update(
        &self,
        user: &Identity,
        id: &str,
        completion: Completion,
    ) -> Result<(), BackendError> {
        let owner = format!("eq.{}", user.user_id);
        let target = format!("eq.{id}");
        let completed_at = if completion.completed {
            completion.completed_at.map(|t| t.to_rfc3339())
        } else {
            None
        };
        let builder = self
            .request(Method::PATCH, TODOS_PATH, Some(&user.access_token))
            .query(&[("id", target.as_str()), ("user_id", owner.as_str())])
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "return=representation")
            .json(&json!({
                "completed": completion.completed,
                "completed_at": completed_at,
            }));
        let rows: Vec<TodoRow> = decode(&self.send(builder).await?)?;
        if rows.is_empty() {
            return Err(BackendError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    pub async fn delete(&self, user: &Identity, id: &str) -> Result<(), BackendError> {
        let owner = format!("eq.{}", user.user_id);
        let target = format!("eq.{id}");
        let builder = self
            .request(Method::DELETE, TODOS_PATH, Some(&user.access_token))
            .query(&[("id", target.as_str()), ("user_id", owner.as_str())]);
        self.send(builder).await?;
        Ok(())
    }

    pub async fn delete_all_completed(&self, user: &Identity) -> Result<(), BackendError> {
        let owner = format!("eq.{}", user.user_id);
        let builder = self
            .request(Method::DELETE, TODOS_PATH, Some(&user.access_token))
            .query(&[("user_id", owner.as_str()), ("completed", "is.true")]);
        self.send(builder).await?;
        Ok(())
    }

    async fn send(&self, builder: RequestBuilder) -> Result<String, BackendError> {
        let reply = http::execute(&self.client, builder)
            .await
            .map_err(|f| BackendError::Transport {
                url: f.url,
                message: f.message,
            })?;
        match reply.status {
            s if s.is_success() => Ok(reply.body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(BackendError::Unauthorized(http::error_message(&reply.body)))
            }
            s => Err(BackendError::Status {
                status: s.as_u16(),
                body: http::error_message(&reply.body),
            }),
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, BackendError> {
    serde_json::from_str(body).map_err(|e| BackendError::Decode(e.to_string()))
}

#[derive(Deserialize)]
struct TodoRow {
    #[serde(deserialize_with = "id_as_string")]
    id: String,
    text: String,
    completed: bool,
    created_at: DateTime<Utc>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
}

impl From<TodoRow> for Todo {
    fn from(row: TodoRow) -> Self {
        Todo {
            id: row.id,
            text: row.text,
            completed: row.completed,
            created_at: row.created_at,
            completed_at: row.completed_at,
        }
        .normalized()
    }
}

/// Row ids may be uuids or integers depending on the table definition.
fn id_as_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    match Value::deserialize(de)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unexpected id {other}"))),
    }
}

/// Per-user remote persistence. Without an identity every call is refused.
pub struct RemoteBackend {
    client: RemoteClient,
    identity: Option<Identity>,
}

impl RemoteBackend {
    pub fn new(client: RemoteClient, identity: Option<Identity>) -> Self {
        Self { client, identity }
    }

    fn user(&self) -> Result<&Identity, BackendError> {
        self.identity
            .as_ref()
            .ok_or_else(|| BackendError::Unauthorized("not signed in".into()))
    }
}

#[async_trait]
impl PersistenceBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn placement(&self) -> Placement {
        Placement::Front
    }

    fn has_identity(&self) -> bool {
        self.identity.is_some()
    }

    async fn list(&self) -> Result<Vec<Todo>, BackendError> {
        let user = self.user()?;
        let todos = self.client.list(user).await?;
        debug!("Fetched {} remote todos for {}", todos.len(), user.user_id);
        Ok(todos)
    }

    async fn insert(&self, text: &str) -> Result<Todo, BackendError> {
        self.client.insert(self.user()?, text).await
    }

    async fn update(&self, id: &str, completion: Completion) -> Result<(), BackendError> {
        self.client.update(self.user()?, id, completion).await
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        self.client.delete(self.user()?, id).await
    }

    async fn delete_completed(&self) -> Result<(), BackendError> {
        self.client.delete_all_completed(self.user()?).await
    }
}
