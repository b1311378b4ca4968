//! Batched, insert-or-ignore writer.

use crate::Database;
use crate::entry::{EntryRow, NewEntry};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sqlx::SqlitePool;
use std::collections::HashMap;

/// Default number of rows per `INSERT`.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

const COLUMNS: usize = 6;

/// Stages entries and writes them with one multi-row `INSERT OR IGNORE` per
/// batch. Paths already in the index are left untouched.
///
/// Statement text is built once per distinct row count and kept for the
/// lifetime of the writer.
#[derive(Debug)]
pub struct IndexWriter {
    pool: SqlitePool,
    batch_size: usize,
    staged: Vec<NewEntry>,
    statements: HashMap<usize, String>,
    inserted: u64,
}

impl IndexWriter {
    pub fn new(db: &Database, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            exn::bail!(ErrorKind::BatchSize);
        }
        Ok(Self {
            pool: db.pool().clone(),
            batch_size,
            staged: Vec::with_capacity(batch_size),
            statements: HashMap::new(),
            inserted: 0,
        })
    }

    /// Stage one entry, writing the batch once it is full.
    pub async fn push(&mut self, entry: NewEntry) -> Result<()> {
        self.staged.push(entry);
        if self.staged.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Write whatever is staged. Returns the number of rows actually inserted.
    pub async fn flush(&mut self) -> Result<u64> {
        if self.staged.is_empty() {
            return Ok(0);
        }
        let rows = self.staged.iter().map(EntryRow::try_from).collect::<Result<Vec<_>>>()?;
        let sql = self.statement(rows.len()).to_string();
        let mut query = sqlx::query(&sql);
        for row in rows {
            query = query
                .bind(row.content_hash)
                .bind(row.path_hash)
                .bind(row.path)
                .bind(row.size)
                .bind(row.mime_type)
                .bind(row.mod_time);
        }
        let result = query.execute(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        let staged = self.staged.len();
        self.staged.clear();
        self.inserted += result.rows_affected();
        tracing::info!(staged, inserted = result.rows_affected(), "Inserted into entry");
        Ok(result.rows_affected())
    }

    /// Flush the remainder and return the total number of inserted rows.
    pub async fn finish(mut self) -> Result<u64> {
        self.flush().await?;
        Ok(self.inserted)
    }

    pub fn staged(&self) -> usize {
        self.staged.len()
    }

    fn statement(&mut self, rows: usize) -> &str {
        self.statements.entry(rows).or_insert_with(|| {
            let placeholder = format!("({})", vec!["?"; COLUMNS].join(","));
            let values = vec![placeholder.as_str(); rows].join(",");
            format!("{} {}", include_str!("../queries/insert_entries.sql").trim(), values)
        })
    }
}
