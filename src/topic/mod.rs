// Durable topic log on SQLite. Append-only entries per topic name, consumer-group commit
// positions, and the relay's per-entry delivery records all live in one database so the
// producer and relay processes share it through WAL.

pub mod maintenance;

use crate::models::{DeliveryOutcome, RelayRecord, TopicEntry};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

pub struct Topic {
    pool: SqlitePool,
    retention_ms: i64,
}

pub(crate) fn now_ms() -> anyhow::Result<i64> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_millis() as i64)
}

impl Topic {
    pub async fn connect(path: &str, retention_days: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        let retention_ms = (retention_days as i64) * 24 * 60 * 60 * 1000;
        Ok(Self { pool, retention_ms })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS topic_entries (
                entry_offset INTEGER PRIMARY KEY AUTOINCREMENT,
                topic TEXT NOT NULL,
                payload TEXT NOT NULL,
                appended_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_topic_entries_topic ON topic_entries(topic, entry_offset)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_topic_entries_appended_at ON topic_entries(appended_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS consumer_offsets (
                group_id TEXT NOT NULL,
                topic TEXT NOT NULL,
                next_offset INTEGER NOT NULL,
                PRIMARY KEY (group_id, topic)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS relay_records (
                group_id TEXT NOT NULL,
                topic TEXT NOT NULL,
                entry_offset INTEGER NOT NULL,
                outcome TEXT NOT NULL,
                commit_position INTEGER NOT NULL,
                attempted_at INTEGER NOT NULL,
                PRIMARY KEY (group_id, topic, entry_offset)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Appends one payload and returns its offset.
    #[instrument(skip(self, payload), fields(repo = "topic", operation = "append"))]
    pub async fn append(&self, topic: &str, payload: &str) -> anyhow::Result<i64> {
        let r = sqlx::query(
            "INSERT INTO topic_entries (topic, payload, appended_at) VALUES ($1, $2, $3)",
        )
        .bind(topic)
        .bind(payload)
        .bind(now_ms()?)
        .execute(&self.pool)
        .await?;
        Ok(r.last_insert_rowid())
    }

    /// Entries with offset >= `from_offset`, oldest first, at most `limit`.
    #[instrument(skip(self), fields(repo = "topic", operation = "fetch_from"))]
    pub async fn fetch_from(
        &self,
        topic: &str,
        from_offset: i64,
        limit: u32,
    ) -> anyhow::Result<Vec<TopicEntry>> {
        let rows = sqlx::query(
            "SELECT entry_offset, topic, payload, appended_at FROM topic_entries
             WHERE topic = $1 AND entry_offset >= $2 ORDER BY entry_offset ASC LIMIT $3",
        )
        .bind(topic)
        .bind(from_offset)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(TopicEntry {
                offset: row.try_get("entry_offset")?,
                topic: row.try_get("topic")?,
                payload: row.try_get("payload")?,
                appended_at: row.try_get("appended_at")?,
            });
        }
        Ok(out)
    }

    /// Offset of the oldest retained entry, if any.
    pub async fn earliest_offset(&self, topic: &str) -> anyhow::Result<Option<i64>> {
        let v = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT MIN(entry_offset) FROM topic_entries WHERE topic = $1",
        )
        .bind(topic)
        .fetch_one(&self.pool)
        .await?;
        Ok(v)
    }

    pub async fn entry_count(&self, topic: &str) -> anyhow::Result<i64> {
        let v = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM topic_entries WHERE topic = $1")
            .bind(topic)
            .fetch_one(&self.pool)
            .await?;
        Ok(v)
    }

    /// Next offset the group should consume from; None before the group's first commit.
    pub async fn committed_offset(&self, group_id: &str, topic: &str) -> anyhow::Result<Option<i64>> {
        let v = sqlx::query_scalar::<_, i64>(
            "SELECT next_offset FROM consumer_offsets WHERE group_id = $1 AND topic = $2",
        )
        .bind(group_id)
        .bind(topic)
        .fetch_optional(&self.pool)
        .await?;
        Ok(v)
    }

    /// Moves the group's commit position to `next_offset` and forgets delivery records below it.
    #[instrument(skip(self), fields(repo = "topic", operation = "commit"))]
    pub async fn commit(&self, group_id: &str, topic: &str, next_offset: i64) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO consumer_offsets (group_id, topic, next_offset) VALUES ($1, $2, $3)
             ON CONFLICT(group_id, topic) DO UPDATE SET next_offset = excluded.next_offset",
        )
        .bind(group_id)
        .bind(topic)
        .bind(next_offset)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM relay_records WHERE group_id = $1 AND topic = $2 AND entry_offset < $3",
        )
        .bind(group_id)
        .bind(topic)
        .bind(next_offset)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Stores the latest attempt for an entry (a later attempt replaces an earlier one).
    #[instrument(skip(self, record), fields(repo = "topic", operation = "record_delivery", offset = record.entry_offset))]
    pub async fn record_delivery(
        &self,
        group_id: &str,
        topic: &str,
        record: &RelayRecord,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO relay_records
             (group_id, topic, entry_offset, outcome, commit_position, attempted_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(group_id)
        .bind(topic)
        .bind(record.entry_offset)
        .bind(record.outcome.as_str())
        .bind(record.commit_position)
        .bind(record.attempted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delivery records at or above `from_offset`, ascending.
    pub async fn relay_records(
        &self,
        group_id: &str,
        topic: &str,
        from_offset: i64,
    ) -> anyhow::Result<Vec<RelayRecord>> {
        let rows = sqlx::query(
            "SELECT entry_offset, outcome, commit_position, attempted_at FROM relay_records
             WHERE group_id = $1 AND topic = $2 AND entry_offset >= $3 ORDER BY entry_offset ASC",
        )
        .bind(group_id)
        .bind(topic)
        .bind(from_offset)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let outcome: String = row.try_get("outcome")?;
            let outcome = DeliveryOutcome::parse(&outcome)
                .ok_or_else(|| anyhow::anyhow!("unknown delivery outcome {:?}", outcome))?;
            out.push(RelayRecord {
                entry_offset: row.try_get("entry_offset")?,
                outcome,
                commit_position: row.try_get("commit_position")?,
                attempted_at: row.try_get("attempted_at")?,
            });
        }
        Ok(out)
    }

    /// Offsets at or above `from_offset` whose last attempt was delivered (skipped on replay).
    pub async fn delivered_offsets(
        &self,
        group_id: &str,
        topic: &str,
        from_offset: i64,
    ) -> anyhow::Result<BTreeSet<i64>> {
        Ok(self
            .relay_records(group_id, topic, from_offset)
            .await?
            .into_iter()
            .filter(|r| r.outcome == DeliveryOutcome::Delivered)
            .map(|r| r.entry_offset)
            .collect())
    }

    /// Drops entries older than the retention window. Returns rows removed.
    #[instrument(skip(self), fields(repo = "topic", operation = "prune_old_data"))]
    pub async fn prune_old_data(&self) -> anyhow::Result<u64> {
        self.prune_older_than(now_ms()? - self.retention_ms).await
    }

    /// Drops entries appended before `cutoff_ms`, and every delivery record that now sits
    /// below its topic's earliest retained entry. Returns entries removed.
    pub async fn prune_older_than(&self, cutoff_ms: i64) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;
        let entries = sqlx::query("DELETE FROM topic_entries WHERE appended_at < $1")
            .bind(cutoff_ms)
            .execute(&mut *tx)
            .await?;
        let records = sqlx::query(
            "DELETE FROM relay_records WHERE NOT EXISTS (
                 SELECT 1 FROM topic_entries t
                 WHERE t.topic = relay_records.topic AND t.entry_offset <= relay_records.entry_offset
             )",
        )
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        if records.rows_affected() > 0 {
            tracing::debug!(records_pruned = records.rows_affected(), "Pruned delivery records");
        }
        Ok(entries.rows_affected())
    }

    /// Closes the pool; later calls fail. Used at shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    #[instrument(skip(self), fields(repo = "topic", operation = "vacuum"))]
    pub async fn vacuum(&self) -> anyhow::Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}
