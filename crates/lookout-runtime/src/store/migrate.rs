use sqlx::SqlitePool;

use lookout_core::{LookoutError, Result};

/// Additive-only migrations. Each `ALTER TABLE ADD COLUMN` is guarded by detecting sqlite's
/// "duplicate column name" error so re-running migrate on an already-migrated database is a
/// no-op rather than a failure.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alerts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            rule_name TEXT NOT NULL,
            severity TEXT NOT NULL,
            condition TEXT NOT NULL,
            instance_key TEXT NOT NULL,
            fired_at INTEGER NOT NULL,
            resolved_at INTEGER,
            message TEXT NOT NULL DEFAULT '',
            acknowledged INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| LookoutError::Database(e.to_string()))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_alerts_resolved_at ON alerts (resolved_at)")
        .execute(pool)
        .await
        .map_err(|e| LookoutError::Database(e.to_string()))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_alerts_fired_at ON alerts (fired_at)")
        .execute(pool)
        .await
        .map_err(|e| LookoutError::Database(e.to_string()))?;

    add_column_if_missing(pool, "alerts", "message", "TEXT NOT NULL DEFAULT ''").await?;
    add_column_if_missing(pool, "alerts", "acknowledged", "INTEGER NOT NULL DEFAULT 0").await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS log_lines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            container_id TEXT NOT NULL,
            stream TEXT NOT NULL,
            ts INTEGER NOT NULL,
            level TEXT,
            message TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| LookoutError::Database(e.to_string()))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_log_lines_container_id ON log_lines (container_id)")
        .execute(pool)
        .await
        .map_err(|e| LookoutError::Database(e.to_string()))?;

    Ok(())
}

async fn add_column_if_missing(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    ddl: &str,
) -> Result<()> {
    let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {ddl}");
    match sqlx::query(&sql).execute(pool).await {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column name") => {
            Ok(())
        }
        Err(e) => Err(LookoutError::Database(e.to_string())),
    }
}
