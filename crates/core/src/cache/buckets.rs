//! Bucket and entry operations on the SQLite store.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::{CacheStorage, CachedEntry, EntryMeta, RequestKey};
use crate::{Error, Response};

/// Fixed-width timestamps so that text ordering matches time ordering.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::CorruptEntry(format!("stored_at {raw:?}: {e}")))
}

/// Row image of an entry before decoding.
struct EntryRow {
    status: i64,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
    response_url: Option<String>,
    stored_at: String,
}

impl EntryRow {
    fn decode(self) -> Result<CachedEntry, Error> {
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)?;
        let status = u16::try_from(self.status).map_err(|_| Error::CorruptEntry(format!("status {}", self.status)))?;
        Ok(CachedEntry {
            response: Response {
                status,
                status_text: self.status_text,
                headers,
                body: self.body.into(),
                url: self.response_url,
            },
            stored_at: parse_timestamp(&self.stored_at)?,
        })
    }
}

fn ensure_bucket(conn: &rusqlite::Connection, bucket: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
        params![bucket, timestamp(Utc::now())],
    )?;
    Ok(())
}

fn upsert_entry(conn: &rusqlite::Connection, bucket: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&response.headers)?;
    conn.execute(
        "INSERT INTO entries (
            bucket, key_hash, url, status, status_text, headers_json, body, response_url, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(bucket, key_hash) DO UPDATE SET
            url = excluded.url,
            status = excluded.status,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            body = excluded.body,
            response_url = excluded.response_url,
            stored_at = excluded.stored_at",
        params![
            bucket,
            &key.hash,
            &key.url,
            response.status as i64,
            &response.status_text,
            headers_json,
            response.body.as_ref(),
            &response.url,
            timestamp(Utc::now()),
        ],
    )?;
    Ok(())
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, bucket: &str) -> Result<(), Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> { ensure_bucket(conn, &bucket) })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM buckets ORDER BY created_at ASC, rowid ASC")?;
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

    async fn match_entry(&self, bucket: &str, key: &RequestKey) -> Result<Option<CachedEntry>, Error> {
        let bucket = bucket.to_string();
        let hash = key.hash.clone();
        self.conn
            .call(move |conn| -> Result<Option<CachedEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, status_text, headers_json, body, response_url, stored_at
                     FROM entries WHERE bucket = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![bucket, hash], |row| {
                    Ok(EntryRow {
                        status: row.get(0)?,
                        status_text: row.get(1)?,
                        headers_json: row.get(2)?,
                        body: row.get(3)?,
                        response_url: row.get(4)?,
                        stored_at: row.get(5)?,
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

    async fn put(&self, bucket: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let bucket = bucket.to_string();
        let key = key.clone();
        let response = response.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_bucket(&tx, &bucket)?;
                upsert_entry(&tx, &bucket, &key, &response)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, bucket: &str, entries: Vec<(RequestKey, Response)>) -> Result<(), Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_bucket(&tx, &bucket)?;
                for (key, response) in &entries {
                    upsert_entry(&tx, &bucket, key, response)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn entries(&self, bucket: &str) -> Result<Vec<EntryMeta>, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<EntryMeta>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, headers_json, length(body), stored_at
                     FROM entries WHERE bucket = ?1 ORDER BY stored_at ASC, rowid ASC",
                )?;
                let rows = stmt
                    .query_map(params![bucket], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(|(url, status, headers_json, size, stored_at)| -> Result<EntryMeta, Error> {
                        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                        let content_type = headers
                            .into_iter()
                            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
                            .map(|(_, v)| v);
                        Ok(EntryMeta {
                            url,
                            status: u16::try_from(status).map_err(|_| Error::CorruptEntry(format!("status {status}")))?,
                            content_type,
                            size: size.max(0) as usize,
                            stored_at: parse_timestamp(&stored_at)?,
                        })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }

    async fn trim(&self, bucket: &str, max_entries: usize) -> Result<u64, Error> {
        let bucket = bucket.to_string();
        let max = max_entries as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE bucket = ?1", params![bucket], |row| row.get(0))?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE rowid IN (
                        SELECT rowid FROM entries WHERE bucket = ?1
                        ORDER BY stored_at ASC, rowid ASC LIMIT ?2
                    )",
                    params![bucket, to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}
