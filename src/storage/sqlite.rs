use std::{
    collections::{BTreeSet, HashMap},
    path::Path,
    time::Duration,
};

use chrono::DateTime;
use sqlx::{
    query, query_as,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow},
    FromRow, Row,
};
use tokio::runtime::{Builder, Runtime};

use super::{incremental::WordMedium, StorageError, FORMAT_VERSION};
use crate::domain::{TrainingState, WordRecord};

/// SQLite-backed medium for [`super::IncrementalStore`].
///
/// Puts and removes are buffered and applied, together with the state row,
/// in a single transaction on `flush`. sqlx is async, so the medium owns a
/// current-thread runtime and blocks on it; do not call it from inside
/// another tokio runtime.
pub struct SqliteMedium {
    runtime: Runtime,
    pool: SqlitePool,
    pending: HashMap<String, Option<WordRecord>>,
    pending_state: Option<TrainingState>,
}

impl SqliteMedium {
    pub fn open(db_path: &Path) -> Result<Self, StorageError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let pool = runtime.block_on(init_pool(db_path))?;
        tracing::info!(target: "storage", path = %db_path.display(), "sqlite medium opened");
        Ok(Self {
            runtime,
            pool,
            pending: HashMap::new(),
            pending_state: None,
        })
    }

    pub fn close(self) {
        let SqliteMedium { runtime, pool, .. } = self;
        runtime.block_on(pool.close());
    }
}

async fn init_pool(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5))
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    query(
        r#"
        CREATE TABLE IF NOT EXISTS words (
            token TEXT PRIMARY KEY,
            spam_count INTEGER NOT NULL,
            ham_count INTEGER NOT NULL,
            kill_count INTEGER NOT NULL DEFAULT 0,
            last_access INTEGER NOT NULL,
            spam_prob REAL NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    query(
        r#"
        CREATE TABLE IF NOT EXISTS state (
            id INTEGER PRIMARY KEY CHECK (id = 0),
            version INTEGER NOT NULL,
            nspam INTEGER NOT NULL,
            nham INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}

async fn apply_batch(
    pool: &SqlitePool,
    pending: &HashMap<String, Option<WordRecord>>,
    state: Option<&TrainingState>,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for (token, record) in pending {
        match record {
            Some(record) => {
                query(
                    r#"INSERT INTO words (token, spam_count, ham_count, kill_count, last_access, spam_prob)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                        ON CONFLICT(token) DO UPDATE SET
                            spam_count = excluded.spam_count,
                            ham_count = excluded.ham_count,
                            kill_count = excluded.kill_count,
                            last_access = excluded.last_access,
                            spam_prob = excluded.spam_prob"#,
                )
                .bind(token.as_str())
                .bind(i64::from(record.spam_count))
                .bind(i64::from(record.ham_count))
                .bind(i64::from(record.kill_count))
                .bind(record.last_access.timestamp_millis())
                .bind(record.spam_prob)
                .execute(&mut *tx)
                .await?;
            }
            None => {
                query(r#"DELETE FROM words WHERE token = ?1"#)
                    .bind(token.as_str())
                    .execute(&mut *tx)
                    .await?;
            }
        }
    }
    if let Some(state) = state {
        query(
            r#"INSERT INTO state (id, version, nspam, nham) VALUES (0, ?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET
                    version = excluded.version,
                    nspam = excluded.nspam,
                    nham = excluded.nham"#,
        )
        .bind(i64::from(FORMAT_VERSION))
        .bind(i64::from(state.nspam))
        .bind(i64::from(state.nham))
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

struct WordRow {
    token: String,
    spam_count: i64,
    ham_count: i64,
    kill_count: i64,
    last_access: i64,
    spam_prob: f64,
}

impl<'r> FromRow<'r, SqliteRow> for WordRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            token: row.try_get("token")?,
            spam_count: row.try_get("spam_count")?,
            ham_count: row.try_get("ham_count")?,
            kill_count: row.try_get("kill_count")?,
            last_access: row.try_get("last_access")?,
            spam_prob: row.try_get("spam_prob")?,
        })
    }
}

impl WordRow {
    fn into_record(self) -> Result<WordRecord, StorageError> {
        let corrupt = |reason: &str| StorageError::CorruptRecord {
            token: self.token.clone(),
            reason: reason.to_string(),
        };
        let count = |value: i64, field: &str| {
            u32::try_from(value).map_err(|_| corrupt(&format!("{field} out of range: {value}")))
        };
        Ok(WordRecord {
            spam_count: count(self.spam_count, "spam_count")?,
            ham_count: count(self.ham_count, "ham_count")?,
            kill_count: count(self.kill_count, "kill_count")?,
            last_access: DateTime::from_timestamp_millis(self.last_access)
                .ok_or_else(|| corrupt("last_access out of range"))?,
            spam_prob: self.spam_prob,
        })
    }
}

fn state_from_row(version: i64, nspam: i64, nham: i64) -> Result<TrainingState, StorageError> {
    let version = u32::try_from(version).unwrap_or(u32::MAX);
    if version != FORMAT_VERSION {
        return Err(StorageError::UnsupportedVersion {
            found: version,
            expected: FORMAT_VERSION,
        });
    }
    let counter = |value: i64| {
        u32::try_from(value).map_err(|_| StorageError::CorruptRecord {
            token: "<state>".to_string(),
            reason: format!("training counter out of range: {value}"),
        })
    };
    Ok(TrainingState {
        nspam: counter(nspam)?,
        nham: counter(nham)?,
    })
}

impl WordMedium for SqliteMedium {
    fn fetch(&mut self, token: &str) -> Result<Option<WordRecord>, StorageError> {
        if let Some(pending) = self.pending.get(token) {
            return Ok(pending.clone());
        }
        let row = self.runtime.block_on(
            query_as::<_, WordRow>(
                r#"SELECT token, spam_count, ham_count, kill_count, last_access, spam_prob
                    FROM words WHERE token = ?1"#,
            )
            .bind(token)
            .fetch_optional(&self.pool),
        )?;
        row.map(WordRow::into_record).transpose()
    }

    fn put(&mut self, token: &str, record: &WordRecord) -> Result<(), StorageError> {
        self.pending.insert(token.to_string(), Some(record.clone()));
        Ok(())
    }

    fn remove(&mut self, token: &str) -> Result<(), StorageError> {
        self.pending.insert(token.to_string(), None);
        Ok(())
    }

    fn keys(&mut self) -> Result<Vec<String>, StorageError> {
        let rows: Vec<(String,)> = self
            .runtime
            .block_on(query_as(r#"SELECT token FROM words"#).fetch_all(&self.pool))?;
        let mut keys: BTreeSet<String> = rows.into_iter().map(|(token,)| token).collect();
        for (token, record) in &self.pending {
            if record.is_some() {
                keys.insert(token.clone());
            } else {
                keys.remove(token);
            }
        }
        Ok(keys.into_iter().collect())
    }

    fn read_state(&mut self) -> Result<Option<TrainingState>, StorageError> {
        if let Some(state) = self.pending_state {
            return Ok(Some(state));
        }
        let row: Option<(i64, i64, i64)> = self.runtime.block_on(
            query_as(r#"SELECT version, nspam, nham FROM state WHERE id = 0"#)
                .fetch_optional(&self.pool),
        )?;
        row.map(|(version, nspam, nham)| state_from_row(version, nspam, nham))
            .transpose()
    }

    fn write_state(&mut self, state: &TrainingState) -> Result<(), StorageError> {
        self.pending_state = Some(*state);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        let written = self.pending.len();
        self.runtime.block_on(apply_batch(
            &self.pool,
            &self.pending,
            self.pending_state.as_ref(),
        ))?;
        self.pending.clear();
        self.pending_state = None;
        tracing::debug!(target: "storage", written, "sqlite batch committed");
        Ok(())
    }
}
