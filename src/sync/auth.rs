use super::SyncError;
use crate::persistence::atomic_write;
use anyhow::Result;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// An authenticated user session. Persisted beside the board so sync
/// survives restarts without re-entering credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: String,
    email: String,
}

#[derive(Deserialize, Default)]
struct AuthErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn auth_error(status: u16, body: &str) -> SyncError {
    let parsed: AuthErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .unwrap_or_else(|| format!("HTTP {}", status));
    SyncError::Auth(message)
}

/// Client for the session-based auth endpoint (GoTrue-style REST)
pub struct AuthClient {
    base_url: String,
    anon_key: String,
    http: Client,
}

impl AuthClient {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            http: Client::new(),
        }
    }

    /// Create an account. The provider sends a confirmation mail; the
    /// session starts on the first sign-in after confirmation.
    pub fn sign_up(&self, email: &str, password: &str) -> Result<(), SyncError> {
        let response = self
            .http
            .post(format!("{}/auth/v1/signup", self.base_url))
            .header("apikey", &self.anon_key)
            .json(&Credentials { email, password })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(auth_error(status.as_u16(), &body));
        }
        Ok(())
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<Session, SyncError> {
        let response = self
            .http
            .post(format!(
                "{}/auth/v1/token?grant_type=password",
                self.base_url
            ))
            .header("apikey", &self.anon_key)
            .json(&Credentials { email, password })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(auth_error(status.as_u16(), &body));
        }

        let token: TokenResponse = response
            .json()
            .map_err(|err| SyncError::Decode(err.to_string()))?;
        Ok(Session {
            user_id: token.user.id,
            email: token.user.email,
            access_token: token.access_token,
        })
    }

    pub fn sign_out(&self, session: &Session) -> Result<(), SyncError> {
        let response = self
            .http
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(auth_error(status.as_u16(), &body));
        }
        Ok(())
    }
}

/// Load the stored session, if any. A corrupt file is logged and treated
/// as signed out.
pub fn load_session<P: AsRef<Path>>(path: P) -> Option<Session> {
    let path = path.as_ref();
    if !path.exists() {
        return None;
    }

    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(session) => Some(session),
        Err(err) => {
            warn!("failed to parse {}: {}", path.display(), err);
            None
        }
    }
}

pub fn save_session<P: AsRef<Path>>(path: P, session: &Session) -> Result<()> {
    let json = serde_json::to_string_pretty(session)?;
    atomic_write(path, &json)?;
    Ok(())
}

pub fn clear_session<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn session() -> Session {
        Session {
            user_id: "user-1".to_string(),
            email: "me@example.com".to_string(),
            access_token: "token".to_string(),
        }
    }

    #[test]
    fn test_session_save_load_clear() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        assert_eq!(load_session(&path), None);

        save_session(&path, &session()).unwrap();
        assert_eq!(load_session(&path), Some(session()));

        clear_session(&path).unwrap();
        assert_eq!(load_session(&path), None);
    }

    #[test]
    fn test_corrupt_session_reads_as_signed_out() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{broken").unwrap();
        assert_eq!(load_session(&path), None);
    }

    #[test]
    fn test_auth_error_prefers_description() {
        let err = auth_error(400, r#"{"error_description":"Invalid login credentials"}"#);
        assert_eq!(err, SyncError::Auth("Invalid login credentials".to_string()));

        let err = auth_error(422, r#"{"msg":"Password should be at least 6 characters"}"#);
        assert_eq!(
            err,
            SyncError::Auth("Password should be at least 6 characters".to_string())
        );

        let err = auth_error(500, "not json");
        assert_eq!(err, SyncError::Auth("HTTP 500".to_string()));
    }
}
