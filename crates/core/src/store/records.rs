//! Metadata record operations.
//!
//! Every write is a single statement keyed on `url`, so concurrent writers for
//! one URL never lose updates and never create a second row.

use super::connection::MetadataDb;
use crate::Error;
use crate::record::{MetadataRecord, MetadataStatus, RecordState, StringMap, now_timestamp};
use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::CorruptRecord(format!("{column}: {e}")))
}

/// Column values for a record state: (status, headers_json, cookies_json, body, error_message).
type StateColumns = (&'static str, Option<String>, Option<String>, Option<String>, Option<String>);

fn encode_state(state: &RecordState) -> Result<StateColumns, Error> {
    let status = state.status().as_str();
    Ok(match state {
        RecordState::Pending => (status, None, None, None, None),
        RecordState::Completed { headers, cookies, body } => (
            status,
            Some(serde_json::to_string(headers)?),
            Some(serde_json::to_string(cookies)?),
            Some(body.clone()),
            None,
        ),
        RecordState::Failed { error_message } => (status, None, None, None, Some(error_message.clone())),
    })
}

/// Raw row as read from the records table.
struct StoredRow {
    url: String,
    status: String,
    headers_json: Option<String>,
    cookies_json: Option<String>,
    body: Option<String>,
    error_message: Option<String>,
    created_at: String,
    updated_at: String,
}

impl StoredRow {
    fn decode(self) -> Result<MetadataRecord, Error> {
        let status: MetadataStatus = self.status.parse().map_err(Error::CorruptRecord)?;

        let state = match (status, self.headers_json, self.cookies_json, self.body, self.error_message) {
            (MetadataStatus::Pending, None, None, None, None) => RecordState::Pending,
            (MetadataStatus::Completed, Some(headers), Some(cookies), Some(body), None) => RecordState::Completed {
                headers: serde_json::from_str::<StringMap>(&headers)?,
                cookies: serde_json::from_str::<StringMap>(&cookies)?,
                body,
            },
            (MetadataStatus::Failed, None, None, None, Some(error_message)) => RecordState::Failed { error_message },
            (status, ..) => {
                return Err(Error::CorruptRecord(format!("{}: fields inconsistent with status {status}", self.url)));
            }
        };

        Ok(MetadataRecord {
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            url: self.url,
            state,
        })
    }
}

impl MetadataDb {
    /// Insert or replace the record keyed by `record.url`.
    ///
    /// A new row takes `created_at` from the record. An existing row keeps its
    /// original `created_at` and has every other field replaced. `updated_at`
    /// is always set to the time of the write.
    pub async fn upsert(&self, record: &MetadataRecord) -> Result<(), Error> {
        let (status, headers_json, cookies_json, body, error_message) = encode_state(&record.state)?;
        let url = record.url.clone();
        let updated_at = now_timestamp().max(record.created_at);
        let created_at = format_timestamp(&record.created_at);
        let updated_at = format_timestamp(&updated_at);
        let sql = format!(
            "INSERT INTO {table} (url, status, headers_json, cookies_json, body, error_message, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(url) DO UPDATE SET
                status = excluded.status,
                headers_json = excluded.headers_json,
                cookies_json = excluded.cookies_json,
                body = excluded.body,
                error_message = excluded.error_message,
                updated_at = excluded.updated_at",
            table = self.table
        );

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    &sql,
                    params![url, status, headers_json, cookies_json, body, error_message, created_at, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Insert a pending placeholder for `url` unless a record already exists.
    ///
    /// Returns `true` when this call created the row and `false` when another
    /// record (of any status) was already present.
    pub async fn insert_if_absent(&self, url: &str) -> Result<bool, Error> {
        let placeholder = MetadataRecord::pending(url);
        let (status, ..) = encode_state(&placeholder.state)?;
        let url = placeholder.url;
        let created_at = format_timestamp(&placeholder.created_at);
        let sql = format!(
            "INSERT INTO {table} (url, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ON CONFLICT(url) DO NOTHING",
            table = self.table
        );

        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let inserted = conn.execute(&sql, params![url, status, created_at])?;
                Ok(inserted == 1)
            })
            .await
            .map_err(Error::from)
    }

    /// Get the record for `url`.
    ///
    /// Returns None if no record exists. The internal row id is never exposed.
    pub async fn get(&self, url: &str) -> Result<Option<MetadataRecord>, Error> {
        let url = url.to_string();
        let sql = format!(
            "SELECT url, status, headers_json, cookies_json, body, error_message, created_at, updated_at
            FROM {table} WHERE url = ?1",
            table = self.table
        );

        self.conn
            .call(move |conn| -> Result<Option<MetadataRecord>, Error> {
                let mut stmt = conn.prepare(&sql)?;

                let result = stmt.query_row(params![url], |row| {
                    Ok(StoredRow {
                        url: row.get(0)?,
                        status: row.get(1)?,
                        headers_json: row.get(2)?,
                        cookies_json: row.get(3)?,
                        body: row.get(4)?,
                        error_message: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                });

                match result {
                    Ok(row) => row.decode().map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<u64, Error> {
        let sql = format!("SELECT COUNT(*) FROM {table}", table = self.table);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn test_db() -> MetadataDb {
        MetadataDb::open_in_memory("url_metadata").await.unwrap()
    }

    fn completed(url: &str, body: &str) -> MetadataRecord {
        MetadataRecord::new(
            url,
            RecordState::Completed {
                headers: StringMap::from([("content-type".to_string(), "text/html".to_string())]),
                cookies: StringMap::from([("session".to_string(), "abc".to_string())]),
                body: body.to_string(),
            },
        )
    }

    fn failed(url: &str, message: &str) -> MetadataRecord {
        MetadataRecord::new(url, RecordState::Failed { error_message: message.to_string() })
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = test_db().await;
        let record = completed("https://test-create.com", "<html>Test</html>");

        db.upsert(&record).await.unwrap();

        let retrieved = db.get("https://test-create.com").await.unwrap().unwrap();
        assert_eq!(retrieved.url, record.url);
        assert_eq!(retrieved.state, record.state);
        assert_eq!(retrieved.created_at, record.created_at);
        assert!(retrieved.created_at <= retrieved.updated_at);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = test_db().await;
        assert!(db.get("https://nonexistent-xyz.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_payload_and_keeps_created_at() {
        let db = test_db().await;
        let url = "https://update-test.com";

        db.upsert(&completed(url, "old content")).await.unwrap();
        let first = db.get(url).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        db.upsert(&completed(url, "new content")).await.unwrap();
        let second = db.get(url).await.unwrap().unwrap();

        assert_eq!(second.body(), Some("new content"));
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(db.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_failed_clears_payload() {
        let db = test_db().await;
        let url = "https://flaky.example";

        db.upsert(&completed(url, "<html>up</html>")).await.unwrap();
        db.upsert(&failed(url, "HTTP_ERROR: status 503")).await.unwrap();

        let record = db.get(url).await.unwrap().unwrap();
        assert_eq!(record.status(), MetadataStatus::Failed);
        assert!(record.headers().is_none());
        assert!(record.cookies().is_none());
        assert!(record.body().is_none());
        assert_eq!(record.error_message(), Some("HTTP_ERROR: status 503"));
    }

    #[tokio::test]
    async fn test_completed_after_failed_clears_error() {
        let db = test_db().await;
        let url = "https://recovered.example";

        db.upsert(&failed(url, "CONNECT_ERROR: could not connect to host")).await.unwrap();
        db.upsert(&completed(url, "<html>back</html>")).await.unwrap();

        let record = db.get(url).await.unwrap().unwrap();
        assert_eq!(record.status(), MetadataStatus::Completed);
        assert!(record.error_message().is_none());
    }

    #[tokio::test]
    async fn test_insert_if_absent_creates_pending() {
        let db = test_db().await;
        let url = "https://pending-test.com";

        assert!(db.insert_if_absent(url).await.unwrap());

        let record = db.get(url).await.unwrap().unwrap();
        assert_eq!(record.status(), MetadataStatus::Pending);
        assert!(record.headers().is_none());
        assert!(record.error_message().is_none());
    }

    #[tokio::test]
    async fn test_insert_if_absent_is_noop_when_present() {
        let db = test_db().await;
        let url = "https://already-there.com";

        db.upsert(&completed(url, "<html>kept</html>")).await.unwrap();
        assert!(!db.insert_if_absent(url).await.unwrap());

        let record = db.get(url).await.unwrap().unwrap();
        assert_eq!(record.status(), MetadataStatus::Completed);
        assert_eq!(record.body(), Some("<html>kept</html>"));
    }

    #[tokio::test]
    async fn test_concurrent_insert_if_absent_single_row() {
        let db = test_db().await;
        let url = "https://race.example";

        let mut handles = Vec::new();
        for _ in 0..16 {
            let db = db.clone();
            handles.push(tokio::spawn(async move { db.insert_if_absent(url).await.unwrap() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(db.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_urls_are_not_canonicalized() {
        let db = test_db().await;
        db.insert_if_absent("https://example.com").await.unwrap();
        db.insert_if_absent("https://example.com/").await.unwrap();

        assert_eq!(db.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_inconsistent_row_is_corrupt() {
        let db = test_db().await;
        db.conn
            .call(|conn| {
                conn.execute_batch(
                    "PRAGMA ignore_check_constraints = ON;
                     INSERT INTO url_metadata (url, status, body, created_at, updated_at)
                     VALUES ('https://broken.example', 'pending', 'stray', '2024-01-01T00:00:00.000000Z',
                             '2024-01-01T00:00:00.000000Z');",
                )
            })
            .await
            .unwrap();

        let result = db.get("https://broken.example").await;
        assert!(matches!(result, Err(Error::CorruptRecord(_))));
    }

    #[tokio::test]
    async fn test_check_constraint_rejects_mismatched_fields() {
        let db = test_db().await;
        let result = db
            .conn
            .call(|conn| {
                conn.execute(
                    "INSERT INTO url_metadata (url, status, error_message, created_at, updated_at)
                     VALUES ('https://bad.example', 'completed', 'boom',
                             '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
                    [],
                )
            })
            .await;

        assert!(result.is_err());
    }
}
