//! Record sources: page-at-a-time pull over a time window of the table.
//!
//! Both sources apply the same [`ScanFilter`]: `createdAt` inside the
//! half-open window `[from, to)` and a tag that is either the snapshot
//! marker or inside the domain event namespace.

use std::io::BufRead;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};

use crate::events::{RawRecord, DOMAIN_EVENT_PREFIX, SNAPSHOT_TAG};

/// Pull interface: ask whether more pages exist, then take the next one.
pub trait RecordSource {
    fn has_more_pages(&self) -> bool;
    fn next_page(&mut self) -> Result<Vec<RawRecord>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFilter {
    /// Inclusive lower bound, formatted like stored `createdAt` values.
    pub from: String,
    /// Exclusive upper bound.
    pub to: String,
    pub snapshot_tag: String,
    pub event_prefix: String,
}

impl ScanFilter {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: format_ts(from),
            to: format_ts(to),
            snapshot_tag: SNAPSHOT_TAG.to_string(),
            event_prefix: DOMAIN_EVENT_PREFIX.to_string(),
        }
    }

    pub fn matches(&self, record: &RawRecord) -> bool {
        let ts = record.created_at.as_str();
        let in_window = ts >= self.from.as_str() && ts < self.to.as_str();
        let tag_ok =
            record.metadata == self.snapshot_tag || record.metadata.starts_with(&self.event_prefix);
        in_window && tag_ok
    }
}

/// Stored timestamps are RFC 3339, second precision, `Z` suffix.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// =============================================================================
// SQLite table scan
// =============================================================================

/// Paginated scan of the key-value table.
///
/// Pages are keyed on `rowid`, so records arrive in insertion order and a
/// page shorter than `page_size` ends the scan.
pub struct TableScan<'a> {
    conn: &'a Connection,
    sql: String,
    filter: ScanFilter,
    page_size: usize,
    last_rowid: i64,
    done: bool,
}

impl<'a> TableScan<'a> {
    pub fn new(conn: &'a Connection, table: &str, filter: ScanFilter, page_size: usize) -> Self {
        let sql = format!(
            "SELECT rowid, id, metadata, createdAt, market FROM \"{table}\"
             WHERE rowid > ?1
               AND createdAt >= ?2 AND createdAt < ?3
               AND (metadata = ?4 OR substr(metadata, 1, length(?5)) = ?5)
             ORDER BY rowid
             LIMIT ?6"
        );
        Self {
            conn,
            sql,
            filter,
            page_size: page_size.max(1),
            last_rowid: 0,
            done: false,
        }
    }
}

impl RecordSource for TableScan<'_> {
    fn has_more_pages(&self) -> bool {
        !self.done
    }

    fn next_page(&mut self) -> Result<Vec<RawRecord>> {
        let mut stmt = self.conn.prepare_cached(&self.sql).context("preparing scan")?;
        let rows = stmt.query_map(
            params![
                self.last_rowid,
                self.filter.from,
                self.filter.to,
                self.filter.snapshot_tag,
                self.filter.event_prefix,
                self.page_size as i64
            ],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    RawRecord {
                        id: row.get(1)?,
                        metadata: row.get(2)?,
                        created_at: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                        market: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    },
                ))
            },
        )?;

        let mut page = Vec::with_capacity(self.page_size);
        for row in rows {
            let (rowid, record) = row.context("reading scan row")?;
            self.last_rowid = rowid;
            page.push(record);
        }
        if page.len() < self.page_size {
            self.done = true;
        }
        Ok(page)
    }
}

// =============================================================================
// JSONL dump
// =============================================================================

/// Pages through newline-delimited JSON table items, filtering in-process.
pub struct JsonlSource<R: BufRead> {
    reader: R,
    filter: ScanFilter,
    page_size: usize,
    line_no: u64,
    done: bool,
}

impl<R: BufRead> JsonlSource<R> {
    pub fn new(reader: R, filter: ScanFilter, page_size: usize) -> Self {
        Self {
            reader,
            filter,
            page_size: page_size.max(1),
            line_no: 0,
            done: false,
        }
    }
}

impl<R: BufRead> RecordSource for JsonlSource<R> {
    fn has_more_pages(&self) -> bool {
        !self.done
    }

    fn next_page(&mut self) -> Result<Vec<RawRecord>> {
        let mut page = Vec::new();
        let mut line = String::new();
        // Page size bounds lines read, not records kept, like a filtered scan.
        for _ in 0..self.page_size {
            line.clear();
            let n = self
                .reader
                .read_line(&mut line)
                .with_context(|| format!("reading line {}", self.line_no + 1))?;
            if n == 0 {
                self.done = true;
                break;
            }
            self.line_no += 1;
            if let Some(record) = parse_record_line(&line, self.line_no)? {
                if self.filter.matches(&record) {
                    page.push(record);
                }
            }
        }
        Ok(page)
    }
}

/// Decode one JSONL table item. Blank lines yield `None`.
pub fn parse_record_line(line: &str, line_no: u64) -> Result<Option<RawRecord>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let record = serde_json::from_str(trimmed)
        .with_context(|| format!("bad record json at line {}", line_no))?;
    Ok(Some(record))
}

/// Read a whole JSONL dump, unfiltered, in file order.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<RawRecord>> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line_no = i as u64 + 1;
        let line = line.with_context(|| format!("reading line {}", line_no))?;
        if let Some(record) = parse_record_line(&line, line_no)? {
            records.push(record);
        }
    }
    Ok(records)
}
