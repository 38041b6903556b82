//! Bucket operations on the SQLite cache.

use async_trait::async_trait;
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use super::snapshot::{RequestKey, ResponseSnapshot};
use super::storage::{BucketSummary, CacheStorage};
use crate::Error;

const SELECT_ENTRY: &str = "SELECT e.bucket, e.response_url, e.status, e.status_text, e.response_type,
        e.headers_json, e.body
    FROM entries e JOIN buckets b ON b.name = e.bucket";

/// Entry row as stored, before the JSON and enum columns are decoded.
struct RawEntry {
    bucket: String,
    url: String,
    status: u16,
    status_text: String,
    response_type: String,
    headers_json: String,
    body: Vec<u8>,
}

impl RawEntry {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            bucket: row.get(0)?,
            url: row.get(1)?,
            status: row.get(2)?,
            status_text: row.get(3)?,
            response_type: row.get(4)?,
            headers_json: row.get(5)?,
            body: row.get(6)?,
        })
    }

    fn decode(self) -> Result<ResponseSnapshot, Error> {
        Ok(ResponseSnapshot {
            url: self.url,
            status: self.status,
            status_text: self.status_text,
            response_type: self.response_type.parse().map_err(Error::CorruptEntry)?,
            headers: serde_json::from_str(&self.headers_json)?,
            body: self.body,
        })
    }
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, bucket: &str) -> Result<(), Error> {
        let bucket = bucket.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
                    params![bucket, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn has(&self, bucket: &str) -> Result<bool, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM buckets WHERE name = ?1)",
                    params![bucket],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, bucket: &str, key: &RequestKey, response: &ResponseSnapshot) -> Result<(), Error> {
        let bucket = bucket.to_string();
        let key = key.clone();
        let key_hash = key.hash();
        let response = response.clone();
        let headers_json = serde_json::to_string(&response.headers)?;
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
                    params![bucket, now],
                )?;
                tx.execute(
                    "INSERT INTO entries (
                        bucket, key_hash, method, url, response_url, status, status_text,
                        response_type, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    ON CONFLICT(bucket, key_hash) DO UPDATE SET
                        response_url = excluded.response_url,
                        status = excluded.status,
                        status_text = excluded.status_text,
                        response_type = excluded.response_type,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        bucket,
                        key_hash,
                        key.method,
                        key.url,
                        response.url,
                        response.status,
                        response.status_text,
                        response.response_type.as_str(),
                        headers_json,
                        response.body,
                        now,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn match_in(&self, bucket: &str, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error> {
        let bucket = bucket.to_string();
        let key_hash = key.hash();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawEntry>, Error> {
                let sql = format!("{SELECT_ENTRY} WHERE e.bucket = ?1 AND e.key_hash = ?2");
                match conn.query_row(&sql, params![bucket, key_hash], RawEntry::from_row) {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(RawEntry::decode).transpose()
    }

    async fn match_any(&self, key: &RequestKey, priority: &[&str]) -> Result<Option<ResponseSnapshot>, Error> {
        let key_hash = key.hash();
        let candidates = self
            .conn
            .call(move |conn| -> Result<Vec<RawEntry>, Error> {
                let sql = format!("{SELECT_ENTRY} WHERE e.key_hash = ?1 ORDER BY b.rowid");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![key_hash], RawEntry::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        let rank = |entry: &RawEntry| {
            priority
                .iter()
                .position(|name| *name == entry.bucket)
                .unwrap_or(priority.len())
        };

        // min_by_key keeps the first of equal ranks, preserving creation order.
        candidates
            .into_iter()
            .enumerate()
            .min_by_key(|(idx, entry)| (rank(entry), *idx))
            .map(|(_, entry)| entry.decode())
            .transpose()
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM buckets ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, bucket: &str) -> Result<bool, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM buckets WHERE name = ?1", params![bucket])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn entries(&self, bucket: &str) -> Result<Vec<RequestKey>, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt =
                    conn.prepare("SELECT method, url FROM entries WHERE bucket = ?1 ORDER BY stored_at, rowid")?;
                let keys = stmt
                    .query_map(params![bucket], |row| Ok(RequestKey { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn summaries(&self) -> Result<Vec<BucketSummary>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<BucketSummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT b.name, COUNT(e.key_hash), b.created_at
                    FROM buckets b LEFT JOIN entries e ON e.bucket = b.name
                    GROUP BY b.name
                    ORDER BY b.rowid",
                )?;
                let summaries = stmt
                    .query_map([], |row| {
                        Ok(BucketSummary {
                            name: row.get(0)?,
                            entries: row.get::<_, i64>(1)? as u64,
                            created_at: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(summaries)
            })
            .await
            .map_err(Error::from)
    }
}
