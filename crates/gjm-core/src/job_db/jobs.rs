//! Record operations: put, get, and the key-ordered scan.

use anyhow::{Context, Result};
use sqlx::Row;
use std::collections::VecDeque;

use super::db::{unix_timestamp, JobDb};
use super::types::{JobId, JobRecord, RecordError};

/// Rows fetched per round-trip while scanning.
const SCAN_PAGE_SIZE: i64 = 256;

fn decode_record(key: JobId, raw: &str) -> Result<JobRecord, RecordError> {
    let record: JobRecord = serde_json::from_str(raw)
        .map_err(|source| RecordError::Malformed { id: key, source })?;
    if record.id != key {
        return Err(RecordError::KeyMismatch {
            key,
            found: record.id,
        });
    }
    record.validate()?;
    Ok(record)
}

impl JobDb {
    /// Persist the full record under its id, replacing any previous value.
    ///
    /// A single upsert statement, so each key is written atomically.
    pub async fn put(&self, record: &JobRecord) -> Result<()> {
        let now = unix_timestamp();
        let raw = serde_json::to_string(record)?;
        sqlx::query(
            r#"
            INSERT INTO jobs (id, record, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                record = excluded.record,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record.id)
        .bind(raw)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("persist job {}", record.id))?;
        Ok(())
    }

    /// Fetch the last persisted record for `id`.
    pub async fn get(&self, id: JobId) -> Result<Option<JobRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, record
            FROM jobs
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let key: i64 = row.get("id");
        let raw: String = row.get("record");
        Ok(Some(decode_record(key, &raw)?))
    }

    /// Start a lazy scan over all records in ascending id order.
    ///
    /// Every call starts over from the smallest id.
    pub fn scan(&self) -> JobScan {
        JobScan {
            db: self.clone(),
            after: None,
            page: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Load every record in id order. Convenience for small listings.
    pub async fn list_all(&self) -> Result<Vec<JobRecord>> {
        let mut scan = self.scan();
        let mut out = Vec::new();
        while let Some(record) = scan.next().await? {
            out.push(record);
        }
        Ok(out)
    }

    async fn fetch_page(&self, after: Option<JobId>) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, record
            FROM jobs
            WHERE ?1 IS NULL OR id > ?1
            ORDER BY id ASC
            LIMIT ?2
            "#,
        )
        .bind(after)
        .bind(SCAN_PAGE_SIZE)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let key: i64 = row.get("id");
            let raw: String = row.get("record");
            out.push(decode_record(key, &raw)?);
        }
        Ok(out)
    }
}

/// Key-ordered cursor over the job table, fetched page by page.
///
/// Records written behind the cursor after the scan started are not revisited;
/// records ahead of it are.
pub struct JobScan {
    db: JobDb,
    after: Option<JobId>,
    page: VecDeque<JobRecord>,
    exhausted: bool,
}

impl JobScan {
    /// Next record, or `None` once the table is exhausted.
    pub async fn next(&mut self) -> Result<Option<JobRecord>> {
        if self.page.is_empty() && !self.exhausted {
            let page = self.db.fetch_page(self.after).await?;
            if (page.len() as i64) < SCAN_PAGE_SIZE {
                self.exhausted = true;
            }
            if let Some(last) = page.last() {
                self.after = Some(last.id);
            }
            self.page.extend(page);
        }
        Ok(self.page.pop_front())
    }
}
