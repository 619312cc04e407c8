use super::{Session, SyncError};
use crate::domain::{Project, Task};
use crate::persistence::{ProjectRecord, TaskRecord};
use crate::store::Board;
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The `data` column of a board row: board content minus anything
/// local-only (timer state never syncs). The revision marks which client
/// wrote the row, so a client can recognize its own change-feed echo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardPayload {
    pub projects: Vec<ProjectRecord>,
    pub tasks: Vec<TaskRecord>,
    pub all_labels: Vec<String>,
    #[serde(default)]
    pub left_sidebar_collapsed: bool,
    #[serde(default)]
    pub right_sidebar_collapsed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<Uuid>,
}

impl BoardPayload {
    pub fn from_board(board: &Board, revision: Uuid) -> Self {
        Self {
            projects: board.projects.iter().map(ProjectRecord::from).collect(),
            tasks: board.tasks.iter().map(TaskRecord::from).collect(),
            all_labels: board.labels.clone(),
            left_sidebar_collapsed: board.left_sidebar_collapsed,
            right_sidebar_collapsed: board.right_sidebar_collapsed,
            revision: Some(revision),
        }
    }

    /// Decompose into domain collections for a wholesale board replacement
    pub fn into_domain(self) -> (Vec<Project>, Vec<Task>, Vec<String>) {
        (
            self.projects.into_iter().map(Project::from).collect(),
            self.tasks.into_iter().map(Task::from).collect(),
            self.all_labels,
        )
    }
}

/// One row of the remote board table, keyed by user identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardRow {
    pub user_id: String,
    pub data: BoardPayload,
    pub updated_at: DateTime<Utc>,
}

/// The effective contract of the row-store provider: per-user select,
/// update and insert, plus "anything newer than X" polling standing in
/// for the row-level change feed. The coordinator only depends on this
/// trait, so tests substitute an in-memory double.
pub trait RowStore {
    /// The user's row, or None when it doesn't exist yet (not an error)
    fn fetch(&self, session: &Session) -> Result<Option<BoardRow>, SyncError>;

    /// Update the user's row; returns the number of rows affected
    fn update(
        &self,
        session: &Session,
        data: &BoardPayload,
        updated_at: DateTime<Utc>,
    ) -> Result<usize, SyncError>;

    /// Insert a fresh row; `SyncError::Conflict` when one was created
    /// concurrently
    fn insert(
        &self,
        session: &Session,
        data: &BoardPayload,
        updated_at: DateTime<Utc>,
    ) -> Result<(), SyncError>;

    /// The user's row if it changed strictly after `since`
    fn fetch_changed_since(
        &self,
        session: &Session,
        since: DateTime<Utc>,
    ) -> Result<Option<BoardRow>, SyncError>;
}

#[derive(Serialize)]
struct RowUpdate<'a> {
    data: &'a BoardPayload,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct RowInsert<'a> {
    user_id: &'a str,
    data: &'a BoardPayload,
    updated_at: DateTime<Utc>,
}

/// PostgREST-style HTTP implementation of the row store
pub struct HttpRowStore {
    base_url: String,
    anon_key: String,
    http: Client,
}

impl HttpRowStore {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            http: Client::new(),
        }
    }

    fn rows_url(&self) -> String {
        format!("{}/rest/v1/boards", self.base_url)
    }

    fn select_rows(
        &self,
        session: &Session,
        extra_filter: Option<String>,
    ) -> Result<Vec<BoardRow>, SyncError> {
        let mut request = self
            .http
            .get(self.rows_url())
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .query(&[
                ("user_id", format!("eq.{}", session.user_id)),
                ("select", "user_id,data,updated_at".to_string()),
            ]);
        if let Some(filter) = extra_filter {
            request = request.query(&[("updated_at", filter)]);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status {
                status: status.as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }

        response
            .json()
            .map_err(|err| SyncError::Decode(err.to_string()))
    }
}

impl RowStore for HttpRowStore {
    fn fetch(&self, session: &Session) -> Result<Option<BoardRow>, SyncError> {
        Ok(self.select_rows(session, None)?.into_iter().next())
    }

    fn update(
        &self,
        session: &Session,
        data: &BoardPayload,
        updated_at: DateTime<Utc>,
    ) -> Result<usize, SyncError> {
        let response = self
            .http
            .patch(self.rows_url())
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .header("Prefer", "return=representation")
            .query(&[("user_id", format!("eq.{}", session.user_id))])
            .json(&RowUpdate { data, updated_at })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status {
                status: status.as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }

        let rows: Vec<serde_json::Value> = response
            .json()
            .map_err(|err| SyncError::Decode(err.to_string()))?;
        Ok(rows.len())
    }

    fn insert(
        &self,
        session: &Session,
        data: &BoardPayload,
        updated_at: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let response = self
            .http
            .post(self.rows_url())
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .header("Prefer", "return=minimal")
            .json(&RowInsert {
                user_id: &session.user_id,
                data,
                updated_at,
            })
            .send()?;

        let status = response.status();
        if status.as_u16() == 409 {
            return Err(SyncError::Conflict);
        }
        if !status.is_success() {
            return Err(SyncError::Status {
                status: status.as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }
        Ok(())
    }

    fn fetch_changed_since(
        &self,
        session: &Session,
        since: DateTime<Utc>,
    ) -> Result<Option<BoardRow>, SyncError> {
        let filter = format!("gt.{}", since.to_rfc3339());
        Ok(self
            .select_rows(session, Some(filter))?
            .into_iter()
            .next())
    }
}
