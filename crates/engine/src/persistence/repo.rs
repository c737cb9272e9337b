#![forbid(unsafe_code)]

use super::ResultStore;
use crate::domain::{Hit, Meta, ScanResult, Status};
use crate::error::Error;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

type Row = (String, String, String, String, String);
type HistoryRow = (String, String, String, String, String, String, String);

fn meta((time, rules, acts, status, attr): Row) -> Result<Meta, Error> {
    let status = match status.parse::<Status>() {
        Ok(status) => status,
        Err(never) => match never {},
    };
    Ok(Meta {
        time: DateTime::parse_from_rfc3339(&time)?.with_timezone(&Utc),
        rules: serde_json::from_str(&rules)?,
        acts: serde_json::from_str(&acts)?,
        status,
        attr: serde_json::from_str(&attr)?,
    })
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open or create the database at `path` and bring its schema up to date.
    pub async fn new(path: PathBuf) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| Error::file(parent, err))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        Self::connect(path, options).await
    }

    /// A private database that lives as long as the store.
    pub async fn in_memory() -> Result<Self, Error> {
        let options = SqliteConnectOptions::new().in_memory(true);
        Self::connect(PathBuf::from(":memory:"), options).await
    }

    async fn connect(path: PathBuf, options: SqliteConnectOptions) -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!(path = %path.display(), "opened result store");
        Ok(Self { path, pool })
    }
}

#[async_trait]
impl ResultStore for SqliteStore {
    async fn save(&self, result: &ScanResult) -> Result<(), Error> {
        if result.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for (path, meta) in &result.paths {
            sqlx::query(
                "INSERT INTO hits (target, path, time, rules, acts, status, attr) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&result.target)
            .bind(path.to_string_lossy().into_owned())
            .bind(meta.time.to_rfc3339_opts(SecondsFormat::Nanos, true))
            .bind(serde_json::to_string(&meta.rules)?)
            .bind(serde_json::to_string(&meta.acts)?)
            .bind(meta.status.to_string())
            .bind(serde_json::to_string(&meta.attr)?)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(path = %self.path.display(), target = %result.target, hits = result.len(), "result saved");
        Ok(())
    }

    async fn last(&self, path: &Path) -> Result<Option<Meta>, Error> {
        let row: Option<Row> = sqlx::query_as(
            "SELECT time, rules, acts, status, attr FROM hits \
             WHERE path = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(path.to_string_lossy().into_owned())
        .fetch_optional(&self.pool)
        .await?;

        row.map(meta).transpose()
    }

    async fn history(&self, target: Option<&str>) -> Result<Vec<(String, Hit)>, Error> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT target, path, time, rules, acts, status, attr FROM hits \
             WHERE ?1 IS NULL OR target = ?1 ORDER BY target, id",
        )
        .bind(target)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(target, path, time, rules, acts, status, attr)| {
                let hit = Hit {
                    path: PathBuf::from(path),
                    meta: meta((time, rules, acts, status, attr))?,
                };
                Ok((target, hit))
            })
            .collect()
    }

    async fn delete_target(&self, target: &str) -> Result<u64, Error> {
        let deleted = sqlx::query("DELETE FROM hits WHERE target = ?")
            .bind(target)
            .execute(&self.pool)
            .await?
            .rows_affected();
        debug!(target, deleted, "history deleted");
        Ok(deleted)
    }

    async fn delete_path(&self, path: &Path) -> Result<u64, Error> {
        let deleted = sqlx::query("DELETE FROM hits WHERE path = ?")
            .bind(path.to_string_lossy().into_owned())
            .execute(&self.pool)
            .await?
            .rows_affected();
        debug!(path = %path.display(), deleted, "history deleted");
        Ok(deleted)
    }
}
