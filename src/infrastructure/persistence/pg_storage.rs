//! PostgreSQL implementation of the storage contract.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::entities::{ShortLink, StoreStats};
use crate::domain::repositories::{Storage, StorageError, StorageResult, UniquenessPolicy};
use crate::utils::db_error::map_write_error;

const SELECT_COLUMNS: &str = "SELECT id, user_id, code, short_url, original_url, is_deleted FROM short_links";

const INSERT_LINK: &str = r#"
    INSERT INTO short_links (id, user_id, code, short_url, original_url)
    VALUES ($1, $2, $3, $4, $5)
"#;

const UPDATE_LINK: &str = r#"
    UPDATE short_links
    SET original_url = $1, is_deleted = is_deleted OR $2
    WHERE id = $3
"#;

/// Row shape of the `short_links` table.
#[derive(Debug, sqlx::FromRow)]
struct ShortLinkRow {
    id: Uuid,
    user_id: String,
    code: String,
    short_url: String,
    original_url: String,
    is_deleted: bool,
}

impl From<ShortLinkRow> for ShortLink {
    fn from(row: ShortLinkRow) -> Self {
        Self {
            id: row.id,
            owner: row.user_id,
            code: row.code,
            short_url: row.short_url,
            original_url: row.original_url,
            deleted: row.is_deleted,
        }
    }
}

/// PostgreSQL storage for short links.
///
/// Batch writes run inside a single transaction. Ownership filtering for
/// deletes happens in the `UPDATE` itself.
pub struct PgStorage {
    pool: PgPool,
    policy: UniquenessPolicy,
}

impl PgStorage {
    /// Creates a storage over an existing pool. Call [`Self::bootstrap`] before use.
    pub fn new(pool: PgPool, policy: UniquenessPolicy) -> Self {
        Self { pool, policy }
    }

    /// Opens a connection pool and prepares the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or migrations fail.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
        policy: UniquenessPolicy,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await?;
        info!("Connected to database");

        let storage = Self::new(pool, policy);
        storage.bootstrap().await?;
        Ok(storage)
    }

    /// Runs migrations and installs the original URL index for the configured policy.
    pub async fn bootstrap(&self) -> StorageResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;

        let (drop, create) = match self.policy {
            UniquenessPolicy::IncludeDeleted => (
                "DROP INDEX IF EXISTS short_links_original_url_live_key",
                "CREATE UNIQUE INDEX IF NOT EXISTS short_links_original_url_key \
                 ON short_links (original_url)",
            ),
            UniquenessPolicy::LiveOnly => (
                "DROP INDEX IF EXISTS short_links_original_url_key",
                "CREATE UNIQUE INDEX IF NOT EXISTS short_links_original_url_live_key \
                 ON short_links (original_url) WHERE NOT is_deleted",
            ),
        };

        sqlx::query(drop).execute(&self.pool).await?;
        sqlx::query(create).execute(&self.pool).await?;

        info!(policy = ?self.policy, "Database schema ready");
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_one_where(&self, clause: &str, value: &str) -> StorageResult<ShortLink> {
        let sql = format!("{SELECT_COLUMNS} WHERE {clause} LIMIT 1");
        sqlx::query_as::<_, ShortLinkRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .map(ShortLink::from)
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn get_by_code(&self, code: &str) -> StorageResult<ShortLink> {
        self.fetch_one_where("code = $1", code).await
    }

    async fn get_by_id(&self, id: Uuid) -> StorageResult<ShortLink> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = $1 LIMIT 1");
        sqlx::query_as::<_, ShortLinkRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(ShortLink::from)
            .ok_or(StorageError::NotFound)
    }

    async fn get_by_original_url(&self, original_url: &str) -> StorageResult<ShortLink> {
        match self.policy {
            UniquenessPolicy::IncludeDeleted => {
                self.fetch_one_where("original_url = $1", original_url)
                    .await
            }
            UniquenessPolicy::LiveOnly => {
                self.fetch_one_where("original_url = $1 AND NOT is_deleted", original_url)
                    .await
            }
        }
    }

    async fn list_by_owner(&self, owner: &str, limit: usize) -> StorageResult<Vec<ShortLink>> {
        let sql = format!("{SELECT_COLUMNS} WHERE user_id = $1 LIMIT $2");
        let rows = sqlx::query_as::<_, ShortLinkRow>(&sql)
            .bind(owner)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ShortLink::from).collect())
    }

    async fn save(&self, link: ShortLink) -> StorageResult<()> {
        sqlx::query(INSERT_LINK)
            .bind(link.id)
            .bind(&link.owner)
            .bind(&link.code)
            .bind(&link.short_url)
            .bind(&link.original_url)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, &link))?;

        Ok(())
    }

    async fn insert_batch(&self, links: Vec<ShortLink>) -> StorageResult<()> {
        if links.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for link in &links {
            let result = sqlx::query(INSERT_LINK)
                .bind(link.id)
                .bind(&link.owner)
                .bind(&link.code)
                .bind(&link.short_url)
                .bind(&link.original_url)
                .execute(&mut *tx)
                .await;

            if let Err(e) = result {
                rollback(tx).await;
                return Err(map_write_error(e, link));
            }
        }

        tx.commit().await?;
        debug!(count = links.len(), "Batch inserted");
        Ok(())
    }

    async fn update_batch(&self, links: Vec<ShortLink>) -> StorageResult<()> {
        if links.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for link in &links {
            let result = sqlx::query(UPDATE_LINK)
                .bind(&link.original_url)
                .bind(link.deleted)
                .bind(link.id)
                .execute(&mut *tx)
                .await;

            match result {
                Ok(done) if done.rows_affected() == 0 => {
                    rollback(tx).await;
                    return Err(StorageError::NotFound);
                }
                Ok(_) => {}
                Err(e) => {
                    rollback(tx).await;
                    return Err(map_write_error(e, link));
                }
            }
        }

        tx.commit().await?;
        debug!(count = links.len(), "Batch updated");
        Ok(())
    }

    async fn delete_flag_batch(&self, codes: &[String], owner: &str) -> StorageResult<()> {
        if codes.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE short_links
            SET is_deleted = TRUE
            WHERE code = ANY($1) AND user_id = $2
            "#,
        )
        .bind(codes)
        .bind(owner)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(done) => {
                tx.commit().await?;
                debug!(
                    requested = codes.len(),
                    flagged = done.rows_affected(),
                    owner,
                    "Delete flags applied"
                );
                Ok(())
            }
            Err(e) => {
                rollback(tx).await;
                Err(e.into())
            }
        }
    }

    async fn stats(&self) -> StorageResult<StoreStats> {
        let (urls, users): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE NOT is_deleted),
                COUNT(DISTINCT user_id)
            FROM short_links
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreStats { urls, users })
    }

    async fn ping(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        self.pool.close().await;
        info!("Database pool closed");
        Ok(())
    }
}

/// Rolls back `tx`, logging instead of returning a failure so the caller keeps
/// reporting the error that caused the rollback.
async fn rollback(tx: Transaction<'_, Postgres>) {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "Transaction rollback failed");
    }
}
