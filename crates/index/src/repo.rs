use crate::Database;
use crate::entry::{Entry, StoredRow, sqlx_hates_paths};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sqlx::SqlitePool;
use std::path::Path;

/// Read side of the index, plus the link status the organizer maintains.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

impl Repository {
    /// Entries not linked yet, oldest first.
    pub async fn pending(&self) -> Result<Vec<Entry>> {
        let rows: Vec<StoredRow> = sqlx::query_as(include_str!("../queries/list_pending.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Entry::try_from).collect()
    }

    pub async fn get_by_path(&self, path: impl AsRef<Path>) -> Result<Option<Entry>> {
        let row: Option<StoredRow> = sqlx::query_as(include_str!("../queries/get_by_path.sql"))
            .bind(sqlx_hates_paths(path.as_ref())?)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Entry::try_from).transpose()
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_entries.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("count"))
    }

    /// Flip the given pending entries to linked. Returns how many changed.
    pub async fn mark_linked(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!("{} ({placeholders})", include_str!("../queries/mark_linked.sql").trim());
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(*id);
        }
        let result = query.execute(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        tracing::info!(requested = ids.len(), updated = result.rows_affected(), "Updated entry status");
        Ok(result.rows_affected())
    }
}
