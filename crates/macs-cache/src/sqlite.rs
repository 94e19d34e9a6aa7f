use chrono::Utc;
use macs_models::cache_schema::CacheRow;
use rusqlite::{Connection, Row};

use crate::error::CacheError;

const SELECT_COLUMNS: &str =
    "SELECT key, category, value_json, source, symbol, created_at, expires_at, updated_at \
     FROM cache_entries";

/// Read-only SQLite cache accessor.
///
/// The shared SQLite database is written by external data collectors
/// and read by MACS once per round.
pub struct SqliteReader {
    conn: Connection,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<CacheRow> {
    Ok(CacheRow {
        key: row.get(0)?,
        category: row.get(1)?,
        value_json: row.get(2)?,
        source: row.get(3)?,
        symbol: row.get(4)?,
        created_at: row.get(5)?,
        expires_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl SqliteReader {
    /// Open a read-only connection to the shared cache database.
    pub fn open(path: &str) -> Result<Self, CacheError> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Open a writable in-memory database with the schema created, for tests and demos.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(macs_models::cache_schema::CACHE_TABLE_DDL)?;
        Ok(Self { conn })
    }

    /// A single unexpired entry by key.
    pub fn get(&self, key: &str) -> Result<Option<CacheRow>, CacheError> {
        let now = Utc::now().to_rfc3339();
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{SELECT_COLUMNS} WHERE key = ?1 AND expires_at > ?2"))?;

        match stmt.query_row(rusqlite::params![key, now], map_row) {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(CacheError::Sqlite(e)),
        }
    }

    /// Unexpired entries of one category whose key starts with `prefix`, ordered by key.
    pub fn get_by_prefix(&self, category: &str, prefix: &str) -> Result<Vec<CacheRow>, CacheError> {
        let now = Utc::now().to_rfc3339();
        let like_pattern = format!("{prefix}%");
        let mut stmt = self.conn.prepare_cached(&format!(
            "{SELECT_COLUMNS} WHERE category = ?1 AND key LIKE ?2 AND expires_at > ?3 ORDER BY key"
        ))?;

        let rows = stmt
            .query_map(rusqlite::params![category, like_pattern, now], map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        // LIKE treats `_` in tickers as a wildcard
        Ok(rows.into_iter().filter(|r| r.key.starts_with(prefix)).collect())
    }

    /// Insert a cache entry. In production the data collectors write directly to SQLite.
    pub fn insert(&self, row: &CacheRow) -> Result<(), CacheError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO cache_entries \
             (key, category, value_json, source, symbol, created_at, expires_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                row.key,
                row.category,
                row.value_json,
                row.source,
                row.symbol,
                row.created_at,
                row.expires_at,
                row.updated_at,
            ],
        )?;
        Ok(())
    }
}
