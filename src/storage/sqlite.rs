use crate::models::{Link, LinkKind, Visit};
use crate::storage::trait_def::unix_now;
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT NOT NULL UNIQUE,
                track_code TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL CHECK(kind IN ('url', 'image')),
                target TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link_id INTEGER NOT NULL REFERENCES links(id),
                ip TEXT NOT NULL,
                user_agent TEXT,
                accept_lang TEXT,
                visited_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_visits_link ON visits(link_id, visited_at DESC)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn insert_link(
        &self,
        code: &str,
        track_code: &str,
        kind: LinkKind,
        target: &str,
    ) -> StorageResult<Link> {
        let created_at = unix_now().map_err(StorageError::Other)?;

        // Codes share one namespace: refuse the insert when either new code
        // already appears in either column. SQLite serializes writers, so the
        // guard and the insert are atomic together; the UNIQUE indexes remain
        // as a backstop.
        let result = sqlx::query(
            r#"
            INSERT INTO links (code, track_code, kind, target, created_at)
            SELECT ?1, ?2, ?3, ?4, ?5
            WHERE NOT EXISTS (
                SELECT 1 FROM links
                WHERE code IN (?1, ?2) OR track_code IN (?1, ?2)
            )
            "#,
        )
        .bind(code)
        .bind(track_code)
        .bind(kind.as_str())
        .bind(target)
        .bind(created_at)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, code, track_code, kind, target, created_at
            FROM links
            WHERE code = ?
            "#,
        )
        .bind(code)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        Ok(link)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, code, track_code, kind, target, created_at
            FROM links
            WHERE code = ?
            "#,
        )
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn find_by_track_code(&self, track_code: &str) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, code, track_code, kind, target, created_at
            FROM links
            WHERE track_code = ?
            "#,
        )
        .bind(track_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn record_visit(
        &self,
        link_id: i64,
        ip: &str,
        user_agent: Option<&str>,
        accept_lang: Option<&str>,
    ) -> Result<()> {
        let visited_at = unix_now()?;

        sqlx::query(
            r#"
            INSERT INTO visits (link_id, ip, user_agent, accept_lang, visited_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(link_id)
        .bind(ip)
        .bind(user_agent)
        .bind(accept_lang)
        .bind(visited_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn visits_for_link(&self, link_id: i64) -> Result<Vec<Visit>> {
        let visits = sqlx::query_as::<_, Visit>(
            r#"
            SELECT id, link_id, ip, user_agent, accept_lang, visited_at
            FROM visits
            WHERE link_id = ?
            ORDER BY visited_at DESC, id DESC
            "#,
        )
        .bind(link_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(visits)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
