//! SQLite-backed record storage

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::migrations::run_migrations;
use super::{HostRecord, RecordBackend, StoreError};

/// Record backend over a single SQLite connection.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (or create) a database file and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!("failed to create '{}': {}", parent.display(), e))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            log::warn!("failed to enable WAL mode: {err}");
        }
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> Result<Self, StoreError> {
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct RawRecord {
    hostname: String,
    is_first_party: bool,
    is_visible: bool,
    first_request_time: Option<i64>,
    last_request_time: i64,
    favicon_url: Option<String>,
    observed_parents: String,
}

const SELECT_COLUMNS: &str = "SELECT hostname, is_first_party, is_visible, first_request_time,
        last_request_time, favicon_url, observed_parents
     FROM hostnames";

fn row_to_raw(row: &Row) -> Result<RawRecord, rusqlite::Error> {
    Ok(RawRecord {
        hostname: row.get("hostname")?,
        is_first_party: row.get("is_first_party")?,
        is_visible: row.get("is_visible")?,
        first_request_time: row.get("first_request_time")?,
        last_request_time: row.get("last_request_time")?,
        favicon_url: row.get("favicon_url")?,
        observed_parents: row.get("observed_parents")?,
    })
}

fn raw_to_record(raw: RawRecord) -> Result<HostRecord, StoreError> {
    let observed_parents: BTreeSet<String> = serde_json::from_str(&raw.observed_parents)
        .map_err(|e| StoreError::CorruptRecord {
            hostname: raw.hostname.clone(),
            reason: e.to_string(),
        })?;

    Ok(HostRecord {
        hostname: raw.hostname,
        is_first_party: raw.is_first_party,
        is_visible: raw.is_visible,
        first_request_time: raw.first_request_time,
        last_request_time: raw.last_request_time,
        favicon_url: raw.favicon_url,
        observed_parents,
    })
}

impl RecordBackend for SqliteBackend {
    fn get(&self, hostname: &str) -> Result<Option<HostRecord>, StoreError> {
        let conn = self.conn();
        let raw = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE hostname = ?1"),
                params![hostname],
                row_to_raw,
            )
            .optional()?;

        raw.map(raw_to_record).transpose()
    }

    fn put(&self, record: &HostRecord) -> Result<(), StoreError> {
        let parents = serde_json::to_string(&record.observed_parents).map_err(|e| {
            StoreError::CorruptRecord {
                hostname: record.hostname.clone(),
                reason: e.to_string(),
            }
        })?;

        self.conn().execute(
            "INSERT INTO hostnames (hostname, is_first_party, is_visible, first_request_time,
                 last_request_time, favicon_url, observed_parents)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(hostname) DO UPDATE SET
                 is_first_party = excluded.is_first_party,
                 is_visible = excluded.is_visible,
                 first_request_time = excluded.first_request_time,
                 last_request_time = excluded.last_request_time,
                 favicon_url = excluded.favicon_url,
                 observed_parents = excluded.observed_parents",
            params![
                record.hostname,
                record.is_first_party,
                record.is_visible,
                record.first_request_time,
                record.last_request_time,
                record.favicon_url,
                parents,
            ],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.conn().execute("DELETE FROM hostnames", [])?;
        Ok(())
    }

    fn all(&self) -> Result<Vec<HostRecord>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY hostname"))?;
        let raws = stmt
            .query_map([], row_to_raw)?
            .collect::<Result<Vec<_>, _>>()?;

        raws.into_iter().map(raw_to_record).collect()
    }

    fn get_flag(&self, key: &str) -> Result<Option<bool>, StoreError> {
        let value = self
            .conn()
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
                row.get::<_, bool>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set_flag(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> HostRecord {
        let mut record = HostRecord::new("cdn.example");
        record.is_visible = true;
        record.touch(100);
        record.touch(250);
        record.add_parent("news.com");
        record.add_parent("blog.org");
        record
    }

    #[test]
    fn test_put_get_roundtrip() {
        let backend = SqliteBackend::open_in_memory().expect("open");
        let record = sample_record();
        backend.put(&record).expect("put");
        assert_eq!(backend.get("cdn.example").expect("get"), Some(record));
        assert_eq!(backend.get("missing.example").expect("get"), None);
    }

    #[test]
    fn test_put_replaces_existing() {
        let backend = SqliteBackend::open_in_memory().expect("open");
        let mut record = sample_record();
        backend.put(&record).expect("put");
        record.favicon_url = Some("https://cdn.example/favicon.ico".into());
        record.touch(900);
        backend.put(&record).expect("put again");

        let stored = backend.get("cdn.example").expect("get").expect("present");
        assert_eq!(stored.last_request_time, 900);
        assert_eq!(stored.first_request_time, Some(100));
        assert_eq!(backend.all().expect("all").len(), 1);
    }

    #[test]
    fn test_clear_keeps_flags() {
        let backend = SqliteBackend::open_in_memory().expect("open");
        backend.put(&sample_record()).expect("put");
        backend.set_flag("first_run_done", true).expect("flag");
        backend.clear().expect("clear");
        assert!(backend.all().expect("all").is_empty());
        assert_eq!(backend.get_flag("first_run_done").expect("flag"), Some(true));
    }

    #[test]
    fn test_corrupt_parents_are_reported() {
        let backend = SqliteBackend::open_in_memory().expect("open");
        backend
            .conn()
            .execute(
                "INSERT INTO hostnames (hostname, observed_parents) VALUES ('x.com', 'not json')",
                [],
            )
            .expect("raw insert");
        assert!(matches!(
            backend.get("x.com"),
            Err(StoreError::CorruptRecord { .. })
        ));
    }
}
