mod migrate;

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use lookout_core::alert::AlertRecord;
use lookout_core::rule::Severity;
use lookout_core::{LookoutError, Result};

/// Durable persistence for fired alerts, backed by a single-writer SQLite database in WAL
/// mode with its file restricted to owner-only permissions.
///
/// Every method here maps directly onto the alert-relevant surface the Alerter needs; general
/// SQL helpers beyond that surface are out of scope.
#[derive(Clone)]
pub struct AlertStore {
    pool: SqlitePool,
}

impl AlertStore {
    /// Open (creating if absent) the alert database at `path`, enabling WAL journaling and
    /// restricting the file to owner read/write, then run additive migrations.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(|e| LookoutError::Database(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| LookoutError::Database(e.to_string()))?;

        restrict_permissions(path)?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// An in-memory store for tests; never touches the filesystem.
    #[cfg(any(test, feature = "testing"))]
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| LookoutError::Database(e.to_string()))?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        migrate::run(&self.pool).await
    }

    /// Append-only insert; returns the auto-assigned row id.
    pub async fn insert_alert(
        &self,
        rule_name: &str,
        severity: Severity,
        condition: &str,
        instance_key: &str,
        fired_at: DateTime<Utc>,
        message: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO alerts (rule_name, severity, condition, instance_key, fired_at, resolved_at, message, acknowledged)
            VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, 0)
            "#,
        )
        .bind(rule_name)
        .bind(severity.to_string())
        .bind(condition)
        .bind(instance_key)
        .bind(fired_at.timestamp())
        .bind(message)
        .execute(&self.pool)
        .await
        .map_err(|e| LookoutError::Database(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    /// Sets `resolved_at` on the row. Idempotent: resolving an already-resolved row with the
    /// same timestamp again is a no-op success.
    pub async fn resolve_alert(&self, id: i64, resolved_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE alerts SET resolved_at = ?1 WHERE id = ?2 AND resolved_at IS NULL")
            .bind(resolved_at.timestamp())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| LookoutError::Database(e.to_string()))?;
        Ok(())
    }

    /// Marks a row acknowledged. Errors if the row is absent.
    pub async fn ack_alert(&self, id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE alerts SET acknowledged = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| LookoutError::Database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(LookoutError::NotFound(format!("alert {id} not found")));
        }
        Ok(())
    }

    /// Rows with `resolved_at IS NULL`, used by `AdoptFiring` at startup.
    pub async fn query_firing_alerts(&self) -> Result<Vec<AlertRecord>> {
        let rows = sqlx::query("SELECT * FROM alerts WHERE resolved_at IS NULL ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| LookoutError::Database(e.to_string()))?;
        rows.iter().map(parse_alert_row).collect()
    }

    /// Rows whose `fired_at` falls in `[start, end]`, most recent first.
    pub async fn query_alerts(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AlertRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM alerts WHERE fired_at >= ?1 AND fired_at <= ?2 ORDER BY fired_at DESC",
        )
        .bind(start.timestamp())
        .bind(end.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LookoutError::Database(e.to_string()))?;
        rows.iter().map(parse_alert_row).collect()
    }

    /// Deletes rows older than `now - retention_days`.
    pub async fn prune(&self, retention_days: i64, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = now - chrono::Duration::days(retention_days);
        let result = sqlx::query("DELETE FROM alerts WHERE fired_at < ?1")
            .bind(cutoff.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| LookoutError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// Appends a batch of tailed log lines in a single transaction.
    pub async fn insert_log_lines(&self, lines: &[lookout_core::log_line::LogLine]) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(sqlx_err)?;
        for line in lines {
            let stream = match line.stream {
                lookout_core::log_line::Stream::Stdout => "stdout",
                lookout_core::log_line::Stream::Stderr => "stderr",
            };
            let level = line.level.map(|l| l.as_str());
            sqlx::query(
                "INSERT INTO log_lines (container_id, stream, ts, level, message) VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&line.container_id)
            .bind(stream)
            .bind(line.timestamp.timestamp())
            .bind(level)
            .bind(&line.message)
            .execute(&mut *tx)
            .await
            .map_err(sqlx_err)?;
        }
        tx.commit().await.map_err(sqlx_err)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl crate::log_supervisor::LogSink for AlertStore {
    async fn write_batch(&self, lines: &[lookout_core::log_line::LogLine]) -> Result<()> {
        self.insert_log_lines(lines).await
    }
}

fn parse_alert_row(row: &sqlx::sqlite::SqliteRow) -> Result<AlertRecord> {
    let severity_str: String = row.try_get("severity").map_err(sqlx_err)?;
    let severity: Severity = severity_str
        .parse()
        .map_err(|e: LookoutError| LookoutError::Database(e.to_string()))?;
    let fired_at_secs: i64 = row.try_get("fired_at").map_err(sqlx_err)?;
    let resolved_at_secs: Option<i64> = row.try_get("resolved_at").map_err(sqlx_err)?;
    let acknowledged: i64 = row.try_get("acknowledged").map_err(sqlx_err)?;

    Ok(AlertRecord {
        id: row.try_get("id").map_err(sqlx_err)?,
        rule_name: row.try_get("rule_name").map_err(sqlx_err)?,
        severity,
        condition: row.try_get("condition").map_err(sqlx_err)?,
        instance_key: row.try_get("instance_key").map_err(sqlx_err)?,
        fired_at: DateTime::from_timestamp(fired_at_secs, 0).unwrap_or_default(),
        resolved_at: resolved_at_secs.and_then(|s| DateTime::from_timestamp(s, 0)),
        message: row.try_get("message").map_err(sqlx_err)?,
        acknowledged: acknowledged != 0,
    })
}

fn sqlx_err(e: sqlx::Error) -> LookoutError {
    LookoutError::Database(e.to_string())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if path.exists() {
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(path, perms)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
