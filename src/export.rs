//! Render finished summaries as a delimited table (or JSON lines) and write
//! them out. Rendering completes before anything is written.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::engine::state::SessionSummary;

pub const CSV_COLUMNS: [&str; 10] = [
    "id",
    "market",
    "no_of_assign_attempts",
    "created_at",
    "created_by_role",
    "rejected_at",
    "rejected_reason",
    "closed_at",
    "closed_reason",
    "confirmed_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Jsonl,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "jsonl" | "ndjson" => Ok(OutputFormat::Jsonl),
            other => Err(anyhow!("unknown output format {:?} (expected csv or jsonl)", other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Jsonl => "jsonl",
        }
    }
}

pub fn render(format: OutputFormat, sessions: &HashMap<String, SessionSummary>) -> Result<String> {
    match format {
        OutputFormat::Csv => Ok(render_csv(sessions)),
        OutputFormat::Jsonl => render_jsonl(sessions),
    }
}

/// Entity order carries no meaning; rows are sorted by id for stable output.
fn sorted(sessions: &HashMap<String, SessionSummary>) -> Vec<&SessionSummary> {
    let mut rows: Vec<&SessionSummary> = sessions.values().collect();
    rows.sort_by(|a, b| a.id.cmp(&b.id));
    rows
}

pub fn render_csv(sessions: &HashMap<String, SessionSummary>) -> String {
    let mut out = String::new();
    out.push_str(&CSV_COLUMNS.join(","));
    out.push('\n');
    for s in sorted(sessions) {
        let cols: Vec<String> = s.columns().iter().map(|c| escape_field(c)).collect();
        out.push_str(&cols.join(","));
        out.push('\n');
    }
    out
}

pub fn render_jsonl(sessions: &HashMap<String, SessionSummary>) -> Result<String> {
    let mut out = String::new();
    for s in sorted(sessions) {
        out.push_str(&serde_json::to_string(s)?);
        out.push('\n');
    }
    Ok(out)
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    tmp.write_all(content.as_bytes())
        .with_context(|| format!("writing temp file for {}", path.display()))?;
    tmp.as_file().sync_all().context("syncing temp file")?;
    tmp.persist(path)
        .with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

pub fn content_sha256(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Write to `dest`, or stdout when no destination is configured.
///
/// File output goes through a temp file in the target directory and is
/// renamed into place, so the target never holds a partial table.
pub fn write_output(dest: Option<&Path>, content: &str) -> Result<()> {
    match dest {
        Some(path) => write_file_atomic(path, content),
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            lock.write_all(content.as_bytes()).context("writing stdout")?;
            lock.flush().context("flushing stdout")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{RejectReason, Role};

    fn one(s: SessionSummary) -> HashMap<String, SessionSummary> {
        let mut m = HashMap::new();
        m.insert(s.id.clone(), s);
        m
    }

    #[test]
    fn empty_map_renders_header_only() {
        let out = render_csv(&HashMap::new());
        assert_eq!(
            out,
            "id,market,no_of_assign_attempts,created_at,created_by_role,rejected_at,rejected_reason,closed_at,closed_reason,confirmed_at\n"
        );
    }

    #[test]
    fn unset_fields_are_empty() {
        let mut s = SessionSummary::new("s9");
        s.created_at = Some("T1".to_string());
        s.created_by_role = Some(Role::User);
        s.rejected_at = Some("T2".to_string());
        s.rejected_reason = Some(RejectReason::NoTutors);
        let out = render_csv(&one(s));
        let row = out.lines().nth(1).unwrap();
        assert_eq!(row, "s9,,0,T1,USER,T2,no_tutors,,,");
    }

    #[test]
    fn fields_with_delimiters_are_quoted() {
        let mut s = SessionSummary::new("s1");
        s.market = Some("US,\"east\"".to_string());
        let out = render_csv(&one(s));
        assert!(out.contains("s1,\"US,\"\"east\"\"\",0"));
    }

    #[test]
    fn rows_sorted_by_id() {
        let mut m = one(SessionSummary::new("b"));
        m.insert("a".to_string(), SessionSummary::new("a"));
        let out = render_csv(&m);
        let ids: Vec<&str> = out.lines().skip(1).map(|l| l.split(',').next().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn jsonl_uses_codes() {
        let mut s = SessionSummary::new("s1");
        s.created_by_role = Some(Role::Tutor);
        let out = render_jsonl(&one(s)).unwrap();
        let v: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(v["created_by_role"], "TUTOR");
        assert_eq!(v["market"], serde_json::Value::Null);
    }

    #[test]
    fn output_format_parse() {
        assert_eq!(OutputFormat::parse("CSV").unwrap(), OutputFormat::Csv);
        assert_eq!(OutputFormat::parse("ndjson").unwrap(), OutputFormat::Jsonl);
        assert!(OutputFormat::parse("xlsx").is_err());
    }

    #[test]
    fn write_output_replaces_file_whole() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sessions.csv");
        std::fs::write(&path, "old contents that are longer than the new table\n").unwrap();

        write_output(Some(path.as_path()), "id\ns1\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id\ns1\n");
        let names: Vec<_> = std::fs::read_dir(dir.path()).unwrap().flatten().collect();
        assert_eq!(names.len(), 1, "temp file left behind");
    }

    #[test]
    fn write_output_failure_leaves_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("missing").join("sessions.csv");
        assert!(write_output(Some(path.as_path()), "id\n").is_err());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn digest_is_stable() {
        assert_eq!(content_sha256("abc"), content_sha256("abc"));
        assert_eq!(content_sha256("").len(), 64);
    }
}
