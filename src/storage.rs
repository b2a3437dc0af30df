use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OpenFlags};

use crate::events::RawRecord;
use crate::source::{ScanFilter, TableScan};

/// Key-value table holding session snapshots and their domain events.
pub struct EventStore {
    conn: Connection,
    table: String,
}

impl EventStore {
    pub fn open(path: &str, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        Ok(Self { conn: Connection::open(path)?, table: table.to_string() })
    }

    /// Open an existing store for scanning. Fails if the file is missing.
    pub fn open_read_only(path: &str, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn, table: table.to_string() })
    }

    pub fn in_memory(table: &str) -> Result<Self> {
        validate_table_name(table)?;
        Ok(Self { conn: Connection::open_in_memory()?, table: table.to_string() })
    }

    pub fn init(&mut self) -> Result<()> {
        let t = &self.table;
        self.conn.execute_batch(&format!(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS \"{t}\" (
                id TEXT NOT NULL,
                metadata TEXT NOT NULL,
                createdAt TEXT,
                market TEXT,
                PRIMARY KEY (id, metadata)
            );
            CREATE INDEX IF NOT EXISTS \"{t}_createdAt\" ON \"{t}\" (createdAt);
            COMMIT;"
        ))?;
        Ok(())
    }

    /// Insert records in one transaction, keeping their order as rowid order.
    pub fn insert_records(&mut self, records: &[RawRecord]) -> Result<usize> {
        let sql = format!(
            "INSERT INTO \"{}\" (id, metadata, createdAt, market) VALUES (?1, ?2, ?3, ?4)",
            self.table
        );
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for r in records {
                let market = if r.market.is_empty() { None } else { Some(r.market.as_str()) };
                stmt.execute(params![r.id, r.metadata, r.created_at, market])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    pub fn scan(&self, filter: ScanFilter, page_size: usize) -> TableScan<'_> {
        TableScan::new(&self.conn, &self.table, filter, page_size)
    }
}

/// Table names are spliced into SQL, so only plain identifiers pass.
pub fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let ok = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(anyhow!("invalid table name {:?}", table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names() {
        assert!(validate_table_name("session").is_ok());
        assert!(validate_table_name("_sessions_2022").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("9lives").is_err());
        assert!(validate_table_name("a\"; DROP TABLE x; --").is_err());
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut store = EventStore::in_memory("session").unwrap();
        store.init().unwrap();
        let r = RawRecord::new("s1", "SESSION", "2022-03-01T00:00:00Z", "US");
        store.insert_records(&[r.clone()]).unwrap();
        assert!(store.insert_records(&[r]).is_err());
    }
}
