// Dashboard login: one admin credential persisted in user.json, in-memory sessions

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::instrument;

use crate::registry::store::JsonFile;

pub const SESSION_COOKIE: &str = "session";
pub const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: "admin".into(),
            password: "admin".into(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("current password is incorrect")]
    WrongPassword,
    #[error("username and new password must be non-empty")]
    EmptyCredentials,
    #[error("saving credentials failed: {0}")]
    Persist(String),
}

pub struct Auth {
    file: JsonFile,
    credentials: RwLock<Credentials>,
    sessions: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl Auth {
    /// Load the credential file, creating it with defaults when absent.
    #[instrument(skip_all, fields(repo = "user", operation = "load"))]
    pub async fn load(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let file = JsonFile::new(path);
        let credentials = match file.read::<Credentials>().await? {
            Some(c) => c,
            None => {
                let c = Credentials::default();
                file.write(&c).await?;
                tracing::warn!(path = %file.path().display(), "created default admin credentials; change the password");
                c
            }
        };
        Ok(Self::with_credentials(file, credentials))
    }

    fn with_credentials(file: JsonFile, credentials: Credentials) -> Self {
        Self {
            file,
            credentials: RwLock::new(credentials),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Check credentials and open a session. Returns the session token.
    pub async fn login(&self, username: &str, password: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        {
            let creds = self.credentials.read().await;
            if creds.username != username || creds.password != password {
                return Err(AuthError::InvalidCredentials);
            }
        }
        let token = uuid::Uuid::new_v4().simple().to_string();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, expires| *expires > now);
        sessions.insert(token.clone(), now + chrono::Duration::seconds(SESSION_TTL_SECS));
        Ok(token)
    }

    pub async fn logout(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }

    pub async fn is_valid(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.sessions
            .read()
            .await
            .get(token)
            .is_some_and(|expires| *expires > now)
    }

    /// Replace the credential after verifying the current password, then persist it.
    pub async fn change_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if username.is_empty() || new_password.is_empty() {
            return Err(AuthError::EmptyCredentials);
        }
        let mut creds = self.credentials.write().await;
        if creds.password != old_password {
            return Err(AuthError::WrongPassword);
        }
        let updated = Credentials {
            username: username.to_string(),
            password: new_password.to_string(),
        };
        // written before the swap so memory never runs ahead of the file
        self.file
            .write(&updated)
            .await
            .map_err(|e| AuthError::Persist(e.to_string()))?;
        *creds = updated;
        Ok(())
    }
}
