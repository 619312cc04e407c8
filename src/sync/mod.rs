pub mod auth;
pub mod coordinator;
pub mod remote;

pub use auth::{clear_session, load_session, save_session, AuthClient, Session};
pub use coordinator::{SigninOutcome, SyncCoordinator, UPSERT_RETRY_BUDGET};
pub use remote::{BoardPayload, BoardRow, HttpRowStore, RowStore};

use thiserror::Error;

/// Failure talking to the auth or row-store provider. The local copy is
/// never discarded over any of these.
#[derive(Debug, Error, PartialEq)]
pub enum SyncError {
    #[error("not signed in")]
    NoSession,
    #[error("a board row for this user already exists")]
    Conflict,
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("remote request failed: {0}")]
    Http(String),
    #[error("unexpected remote response ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("failed to decode remote payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Http(err.to_string())
    }
}
