use crate::models::{Link, LinkKind, Visit};
use crate::storage::trait_def::unix_now;
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id BIGSERIAL PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                track_code TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL CHECK(kind IN ('url', 'image')),
                target TEXT NOT NULL,
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visits (
                id BIGSERIAL PRIMARY KEY,
                link_id BIGINT NOT NULL REFERENCES links(id),
                ip TEXT NOT NULL,
                user_agent TEXT,
                accept_lang TEXT,
                visited_at BIGINT NOT NULL
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

        // The shared codes namespace as a real constraint: every link writes
        // both of its codes here, so a cross-column duplicate collides on the
        // primary key even between concurrent transactions.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS link_codes (
                code TEXT PRIMARY KEY
            )
            "#,
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

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Other(e.into()))?;

        // Claim both codes in the shared namespace first. A concurrent
        // transaction inserting either value blocks on the primary key and
        // sees the conflict once the winner commits, so the namespace check
        // is a constraint rather than check-then-act.
        let claimed = sqlx::query(
            r#"
            INSERT INTO link_codes (code)
            VALUES ($1), ($2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(code)
        .bind(track_code)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if claimed.rows_affected() < 2 {
            // Dropping the transaction rolls back any partial claim.
            return Err(StorageError::Conflict);
        }

        let link = sqlx::query_as::<_, Link>(
            r#"
            INSERT INTO links (code, track_code, kind, target, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, code, track_code, kind, target, created_at
            "#,
        )
        .bind(code)
        .bind(track_code)
        .bind(kind.as_str())
        .bind(target)
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        tx.commit().await.map_err(|e| StorageError::Other(e.into()))?;

        Ok(link)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, code, track_code, kind, target, created_at
            FROM links
            WHERE code = $1
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
            WHERE track_code = $1
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
            VALUES ($1, $2, $3, $4, $5)
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
            WHERE link_id = $1
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
