//! Database schema migrations.
//!
//! Uses a simple version table approach to track applied migrations.
//! Each migration is a SQL batch templated on the records table name.

use std::num::ParseIntError;

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Migration list: (version, SQL).
///
/// Migrations must be applied in order. All migrations are idempotent
/// using CREATE IF NOT EXISTS, so re-running them on startup is safe.
const MIGRATIONS: &[(&str, &str)] = &[("1", include_str!("../../migrations/001_url_metadata.sql"))];

/// Name of the version table tracking migrations for `table`.
fn version_table(table: &str) -> String {
    format!("_migrations_{table}")
}

/// Run any pending migrations for the records table `table`.
///
/// Each records table tracks its own version, so several collections can
/// share one database file.
///
/// # Errors
///
/// Returns an error if a migration SQL fails to execute.
pub async fn run(conn: &Connection, table: &str) -> Result<(), Error> {
    let table = table.to_string();
    conn.call(move |conn| -> Result<(), Error> {
        let versions = version_table(&table);
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {versions} (
                    version INTEGER PRIMARY KEY,
                    applied_at TEXT NOT NULL
                )"
            ),
            [],
        )
        .map_err(Error::from)?;

        let current: i64 = conn
            .query_row(&format!("SELECT COALESCE(MAX(version), 0) FROM {versions}"), [], |row| row.get(0))
            .map_err(Error::from)?;

        for (version, sql) in MIGRATIONS {
            let version_num: i64 = version
                .parse()
                .map_err(|e: ParseIntError| Error::MigrationFailed(e.to_string()))?;
            if version_num > current {
                conn.execute_batch(&sql.replace("{table}", &table))
                    .map_err(|e| Error::MigrationFailed(format!("version {version_num}: {e}")))?;
                conn.execute(
                    &format!("INSERT INTO {versions} (version, applied_at) VALUES (?1, ?2)"),
                    params![version_num, chrono::Utc::now().to_rfc3339()],
                )
                .map_err(Error::from)?;
                tracing::info!(table = %table, version = version_num, "applied migration");
            }
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
