use super::remote::{BoardPayload, RowStore};
use super::{Session, SyncError};
use crate::store::{Board, StoreObserver};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// How many times an insert conflict falls back to the update path before
/// the attempt is surfaced as a failure
pub const UPSERT_RETRY_BUDGET: u32 = 3;

const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// What happened on sign-in after the remote store was consulted
#[derive(Debug)]
pub enum SigninOutcome {
    /// The remote row exists and is now authoritative; replace the board
    Loaded(BoardPayload),
    /// No remote row existed, the local board was copied up once
    MigratedLocal,
    /// Nothing remote and nothing local worth migrating
    Fresh,
}

/// Schedules and performs remote writes, and reconciles remote changes.
///
/// Subscribed to the store: every mutation (while signed in) re-arms a
/// debounce window holding the latest full snapshot, so bursts collapse
/// into one outgoing write. The write itself happens on `tick`/`flush`,
/// never inside the mutation path.
pub struct SyncCoordinator {
    row_store: Box<dyn RowStore>,
    session: Option<Session>,
    debounce: Duration,
    backoff: Duration,
    /// Latest snapshot awaiting push; the only copy held outside the store
    pending: Option<BoardPayload>,
    deadline: Option<Instant>,
    /// Revision of the last payload this instance pushed, for recognizing
    /// its own change-feed echo
    last_pushed_revision: Option<Uuid>,
    last_seen_updated_at: Option<DateTime<Utc>>,
}

impl SyncCoordinator {
    pub fn new(row_store: Box<dyn RowStore>, session: Option<Session>, debounce: Duration) -> Self {
        Self {
            row_store,
            session,
            debounce,
            backoff: DEFAULT_RETRY_BACKOFF,
            pending: None,
            deadline: None,
            last_pushed_revision: None,
            last_seen_updated_at: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    /// Drop the identity; later mutations persist locally only
    pub fn sign_out(&mut self) {
        self.session = None;
        self.pending = None;
        self.deadline = None;
        self.last_pushed_revision = None;
        self.last_seen_updated_at = None;
    }

    #[cfg(test)]
    fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Record a board change, re-arming the debounce window. Signed-out
    /// changes are ignored; local persistence covers them.
    pub fn note_change_at(&mut self, board: &Board, now: Instant) {
        if self.session.is_none() {
            return;
        }
        self.pending = Some(BoardPayload::from_board(board, Uuid::new_v4()));
        self.deadline = Some(now + self.debounce);
    }

    /// Push the pending snapshot if its debounce window has elapsed.
    /// Returns true when a write went out.
    pub fn tick_at(&mut self, now: Instant) -> Result<bool, SyncError> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.flush(),
            _ => Ok(false),
        }
    }

    pub fn tick(&mut self) -> Result<bool, SyncError> {
        self.tick_at(Instant::now())
    }

    /// Push the pending snapshot now, debounce window or not
    pub fn flush(&mut self) -> Result<bool, SyncError> {
        let Some(payload) = self.pending.take() else {
            self.deadline = None;
            return Ok(false);
        };
        self.deadline = None;
        self.push(payload)?;
        Ok(true)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Upsert the payload: update by key first, insert when no row was
    /// touched, and on an insert conflict (a row appeared concurrently)
    /// retry the update path a fixed number of times before giving up.
    fn push(&mut self, payload: BoardPayload) -> Result<(), SyncError> {
        let session = self.session.clone().ok_or(SyncError::NoSession)?;
        let updated_at = Utc::now();

        let rows = self.row_store.update(&session, &payload, updated_at)?;
        if rows == 0 {
            match self.row_store.insert(&session, &payload, updated_at) {
                Ok(()) => {}
                Err(SyncError::Conflict) => {
                    let mut landed = false;
                    for attempt in 1..=UPSERT_RETRY_BUDGET {
                        std::thread::sleep(self.backoff);
                        debug!("insert conflicted, retrying update (attempt {attempt})");
                        if self.row_store.update(&session, &payload, Utc::now())? > 0 {
                            landed = true;
                            break;
                        }
                    }
                    if !landed {
                        warn!("remote upsert gave up after {UPSERT_RETRY_BUDGET} retries");
                        return Err(SyncError::Conflict);
                    }
                }
                Err(err) => return Err(err),
            }
        }

        self.last_pushed_revision = payload.revision;
        self.last_seen_updated_at = Some(updated_at);
        Ok(())
    }

    /// First contact with the remote store after authentication: migrate
    /// the local board up exactly once if the user has no row yet,
    /// otherwise hand back the remote snapshot as the new truth.
    pub fn handle_signin(&mut self, board: &Board) -> Result<SigninOutcome, SyncError> {
        let session = self.session.clone().ok_or(SyncError::NoSession)?;

        match self.row_store.fetch(&session)? {
            Some(row) => {
                self.last_seen_updated_at = Some(row.updated_at);
                Ok(SigninOutcome::Loaded(row.data))
            }
            None if board.has_content() => {
                let payload = BoardPayload::from_board(board, Uuid::new_v4());
                self.push(payload)?;
                Ok(SigninOutcome::MigratedLocal)
            }
            None => Ok(SigninOutcome::Fresh),
        }
    }

    /// Check the change feed. Returns a payload when another device wrote
    /// the row; echoes of this instance's own writes are dropped.
    pub fn poll_feed(&mut self) -> Result<Option<BoardPayload>, SyncError> {
        let session = self.session.clone().ok_or(SyncError::NoSession)?;

        let row = match self.last_seen_updated_at {
            Some(since) => self.row_store.fetch_changed_since(&session, since)?,
            None => self.row_store.fetch(&session)?,
        };

        let Some(row) = row else {
            return Ok(None);
        };
        self.last_seen_updated_at = Some(row.updated_at);

        if row.data.revision.is_some() && row.data.revision == self.last_pushed_revision {
            debug!("ignoring change-feed echo of our own write");
            return Ok(None);
        }
        Ok(Some(row.data))
    }
}

impl StoreObserver for SyncCoordinator {
    fn board_changed(&mut self, board: &Board) {
        self.note_change_at(board, Instant::now());
    }
}
