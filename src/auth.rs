//! Authentication session.
//!
//! Holds the current [`Identity`] (or its absence), talks to the server's
//! password-grant auth endpoints and broadcasts every identity change on a
//! `watch` channel so the todo store can follow along.

use std::fmt;

use log::{info, warn};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;

use crate::backend::RemoteClient;
use crate::error::AuthError;
use crate::http;

pub const MIN_PASSWORD_LEN: usize = 6;

/// The signed-in user. Every remote todo operation is scoped by `user_id`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"***")
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    /// Only used when signing up.
    pub username: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .field("username", &self.username)
            .finish()
    }
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    fn validate(&self) -> Result<(), AuthError> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(AuthError::Validation("Email is required".into()));
        }
        if !email.contains('@') {
            return Err(AuthError::Validation(format!("`{email}` is not an email address")));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }

    fn validate_sign_up(&self) -> Result<&str, AuthError> {
        self.validate()?;
        match self.username.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(AuthError::Validation("Username is required".into())),
        }
    }
}

/// Result of a sign-up. Servers that require email confirmation answer
/// without a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(Identity),
    ConfirmationPending,
}

#[derive(Deserialize)]
struct SessionRes {
    access_token: String,
    user: UserRes,
}

#[derive(Deserialize)]
struct UserRes {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Sign-up answers with a session, or with just the new user when email
/// confirmation is pending (bare or wrapped in `user`).
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpRes {
    Session(SessionRes),
    Wrapped { user: UserRes },
    Bare(UserRes),
}

impl SessionRes {
    fn into_identity(self, fallback_email: &str) -> Identity {
        Identity {
            user_id: self.user.id,
            email: self.user.email.unwrap_or_else(|| fallback_email.to_string()),
            access_token: self.access_token,
        }
    }
}

pub struct AuthSession {
    client: Option<RemoteClient>,
    identity: watch::Sender<Option<Identity>>,
}

impl AuthSession {
    /// `client` is `None` when no remote server is configured; the session
    /// then stays signed out and every auth call fails with `NotConfigured`.
    pub fn new(client: Option<RemoteClient>) -> Self {
        let (identity, _) = watch::channel(None);
        Self { client, identity }
    }

    pub fn current(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    /// Adopts an identity saved by an earlier run.
    pub fn restore(&self, identity: Identity) {
        info!("Restoring session for {}", identity.email);
        self.publish(Some(identity));
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        credentials.validate()?;
        let client = self.client()?;
        let email = credentials.email.trim();
        let builder = client
            .request(Method::POST, "/auth/v1/token", None)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": credentials.password }));
        let body = send(client, builder).await?;
        let session: SessionRes =
            serde_json::from_str(&body).map_err(|e| AuthError::Decode(e.to_string()))?;
        let identity = session.into_identity(email);
        info!("Signed in as {}", identity.email);
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    pub async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, AuthError> {
        let username = credentials.validate_sign_up()?;
        let client = self.client()?;
        let email = credentials.email.trim();
        let builder = client.request(Method::POST, "/auth/v1/signup", None).json(&json!({
            "email": email,
            "password": credentials.password,
            "data": { "username": username },
        }));
        let body = send(client, builder).await?;
        let res: SignUpRes =
            serde_json::from_str(&body).map_err(|e| AuthError::Decode(e.to_string()))?;
        match res {
            SignUpRes::Session(session) => {
                let identity = session.into_identity(email);
                info!("Signed up and signed in as {}", identity.email);
                self.publish(Some(identity.clone()));
                Ok(SignUpOutcome::SignedIn(identity))
            }
            SignUpRes::Wrapped { user } | SignUpRes::Bare(user) => {
                info!("Signed up {} ({}); waiting for email confirmation", email, user.id);
                Ok(SignUpOutcome::ConfirmationPending)
            }
        }
    }

    /// Always ends signed out. The server call is best effort.
    pub async fn sign_out(&self) {
        let Some(identity) = self.current() else {
            return;
        };
        if let Some(client) = &self.client {
            let builder =
                client.request(Method::POST, "/auth/v1/logout", Some(&identity.access_token));
            if let Err(err) = send(client, builder).await {
                warn!("Sign-out request failed: {}", err);
            }
        }
        info!("Signed out {}", identity.email);
        self.publish(None);
    }

    fn client(&self) -> Result<&RemoteClient, AuthError> {
        self.client.as_ref().ok_or(AuthError::NotConfigured)
    }

    fn publish(&self, identity: Option<Identity>) {
        self.identity.send_if_modified(|current| {
            if *current == identity {
                false
            } else {
                *current = identity;
                true
            }
        });
    }
}

async fn send(client: &RemoteClient, builder: reqwest::RequestBuilder) -> Result<String, AuthError> {
    let reply = http::execute(client.http(), builder)
        .await
        .map_err(|f| AuthError::Transport {
            url: f.url,
            message: f.message,
        })?;
    if !reply.status.is_success() {
        return Err(AuthError::Rejected {
            status: reply.status.as_u16(),
            message: http::error_message(&reply.body),
        });
    }
    Ok(reply.body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_password_and_missing_email() {
        assert!(matches!(
            Credentials::new("", "password123").validate(),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            Credentials::new("me@example.com", "12345").validate(),
            Err(AuthError::Validation(_))
        ));
        assert!(Credentials::new("me@example.com", "123456").validate().is_ok());
    }

    #[test]
    fn sign_up_needs_a_username() {
        let creds = Credentials::new("me@example.com", "password123");
        assert!(creds.validate_sign_up().is_err());
        assert_eq!(creds.with_username(" tester ").validate_sign_up().unwrap(), "tester");
    }

    #[test]
    fn debug_output_hides_the_password() {
        let creds = Credentials::new("me@example.com", "hunter22").with_username("me");
        let shown = format!("{creds:?}");
        assert!(!shown.contains("hunter22"));
        assert!(shown.contains("me@example.com"));
    }

    #[test]
    fn sign_up_body_needs_a_session_or_a_user() {
        assert!(matches!(
            serde_json::from_str::<SignUpRes>(r#"{"id":"u1","email":"a@b.c"}"#),
            Ok(SignUpRes::Bare(_))
        ));
        assert!(matches!(
            serde_json::from_str::<SignUpRes>(r#"{"user":{"id":"u1"},"session":null}"#),
            Ok(SignUpRes::Wrapped { .. })
        ));
        assert!(serde_json::from_str::<SignUpRes>(r#"{"ok":true}"#).is_err());
        assert!(serde_json::from_str::<SignUpRes>("").is_err());
    }

    #[test]
    fn debug_output_hides_the_token() {
        let id = Identity {
            user_id: "u".into(),
            email: "e@x.io".into(),
            access_token: "secret-token".into(),
        };
        assert!(!format!("{id:?}").contains("secret-token"));
    }
}
