use crate::models::{Link, LinkKind, Visit};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("code already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, indexes, etc.)
    async fn init(&self) -> Result<()>;

    /// Insert a link with caller-provided codes.
    ///
    /// Returns `StorageError::Conflict` when either code already appears in
    /// either code column of an existing link; the codes namespace is shared.
    /// Backends enforce this with database constraints, not check-then-act:
    /// SQLite serializes writers around a guarded single-statement insert,
    /// PostgreSQL claims both codes in a side table whose primary key spans
    /// the namespace, inside the inserting transaction.
    async fn insert_link(
        &self,
        code: &str,
        track_code: &str,
        kind: LinkKind,
        target: &str,
    ) -> StorageResult<Link>;

    /// Look up a link by its public share code.
    async fn find_by_code(&self, code: &str) -> Result<Option<Link>>;

    /// Look up a link by its owner-facing track code.
    async fn find_by_track_code(&self, track_code: &str) -> Result<Option<Link>>;

    /// Append a visit for an existing link. Referential integrity is enforced
    /// by the database; a nonexistent `link_id` is an error.
    async fn record_visit(
        &self,
        link_id: i64,
        ip: &str,
        user_agent: Option<&str>,
        accept_lang: Option<&str>,
    ) -> Result<()>;

    /// All visits for a link, most recent first (`visited_at` descending,
    /// ties broken by insertion order, newest first).
    async fn visits_for_link(&self, link_id: i64) -> Result<Vec<Visit>>;

    /// Drain the connection pool. Called once on shutdown.
    async fn close(&self);
}

pub(crate) fn unix_now() -> Result<i64> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs() as i64)
}
