//! Record store
//!
//! Persists pages of derived line records. A page is written in one
//! transaction, so a failed call leaves nothing of that page behind.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::borrow::Cow;
use tracing::{debug, instrument};

use super::error::IngestResult;
use super::types::Record;

/// Rows per INSERT statement; keeps bind parameters well under Postgres' 65535 cap
const INSERT_CHUNK_ROWS: usize = 5_000;

#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Write all `records` or none of them
    async fn bulk_insert(&self, records: Vec<Record>) -> IngestResult<()>;

    /// Number of records derived from `object_key`
    async fn count_for_file(&self, object_key: &str) -> IngestResult<i64>;
}

/// Postgres `TEXT` cannot hold U+0000; NUL is stored as U+FFFD, the same
/// substitute used for invalid UTF-8
fn pg_text(content: &str) -> Cow<'_, str> {
    if content.contains('\0') {
        Cow::Owned(content.replace('\0', "\u{FFFD}"))
    } else {
        Cow::Borrowed(content)
    }
}

/// Postgres-backed record store (`file_records` table)
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordRepository for PgRecordStore {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn bulk_insert(&self, records: Vec<Record>) -> IngestResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for chunk in records.chunks(INSERT_CHUNK_ROWS) {
            let mut query_builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO file_records (content, original_file) ");

            query_builder.push_values(chunk, |mut b, record| {
                b.push_bind(pg_text(&record.content).into_owned())
                    .push_bind(&record.original_file);
            });

            query_builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        debug!("Inserted {} records", records.len());
        Ok(())
    }

    async fn count_for_file(&self, object_key: &str) -> IngestResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM file_records WHERE original_file = $1")
                .bind(object_key)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
