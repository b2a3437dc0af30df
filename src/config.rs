use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::export::OutputFormat;
use crate::source::{format_ts, ScanFilter};
use crate::storage::validate_table_name;

pub const DEFAULT_WINDOW_FROM: &str = "2022-03-01T00:00:00Z";
pub const DEFAULT_WINDOW_TO: &str = "2022-04-01T00:00:00Z";
pub const DEFAULT_TABLE: &str = "session";
pub const DEFAULT_REGION: &str = "eu-west-1";

#[derive(Debug, Clone)]
pub struct Config {
    pub window_from: DateTime<Utc>,
    pub window_to: DateTime<Utc>,
    pub table: String,
    pub region: String,
    pub sqlite_path: String,
    /// Read a JSONL dump of table items instead of the SQLite table.
    pub records_jsonl: Option<String>,
    pub page_size: usize,
    pub format: OutputFormat,
    /// Stdout when unset.
    pub output_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let region = var("SOURCE_REGION", DEFAULT_REGION);
        let cfg = Self {
            window_from: parse_ts("WINDOW_FROM", &var("WINDOW_FROM", DEFAULT_WINDOW_FROM))?,
            window_to: parse_ts("WINDOW_TO", &var("WINDOW_TO", DEFAULT_WINDOW_TO))?,
            table: var("TABLE_NAME", DEFAULT_TABLE),
            sqlite_path: lookup("SQLITE_PATH").unwrap_or_else(|| default_store_path(&region)),
            region,
            records_jsonl: lookup("RECORDS_JSONL").filter(|v| !v.is_empty()),
            page_size: match lookup("PAGE_SIZE") {
                Some(v) => v.parse().with_context(|| format!("PAGE_SIZE: bad value {:?}", v))?,
                None => 1000,
            },
            format: OutputFormat::parse(&var("OUTPUT_FORMAT", "csv"))?,
            output_path: lookup("OUTPUT_PATH").filter(|v| !v.is_empty()),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_from >= self.window_to {
            return Err(anyhow!(
                "empty window: from {} is not before to {}",
                format_ts(self.window_from),
                format_ts(self.window_to)
            ));
        }
        // Stored timestamps have whole seconds; finer bounds cannot be compared.
        for (name, ts) in [("WINDOW_FROM", self.window_from), ("WINDOW_TO", self.window_to)] {
            if ts.timestamp_subsec_nanos() != 0 {
                return Err(anyhow!(
                    "{}: fractional seconds are not supported, got {}",
                    name,
                    ts.to_rfc3339()
                ));
            }
        }
        if self.page_size == 0 {
            return Err(anyhow!("PAGE_SIZE must be positive"));
        }
        validate_table_name(&self.table)?;
        Ok(())
    }

    pub fn scan_filter(&self) -> ScanFilter {
        ScanFilter::new(self.window_from, self.window_to)
    }
}

pub fn default_store_path(region: &str) -> String {
    format!("./session-{}.sqlite", region)
}

fn parse_ts(name: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("{}: expected RFC 3339 timestamp, got {:?}", name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base() -> Config {
        Config {
            window_from: parse_ts("WINDOW_FROM", DEFAULT_WINDOW_FROM).unwrap(),
            window_to: parse_ts("WINDOW_TO", DEFAULT_WINDOW_TO).unwrap(),
            table: DEFAULT_TABLE.to_string(),
            region: DEFAULT_REGION.to_string(),
            sqlite_path: default_store_path(DEFAULT_REGION),
            records_jsonl: None,
            page_size: 1000,
            format: OutputFormat::Csv,
            output_path: None,
        }
    }

    #[test]
    fn defaults_validate() {
        let cfg = base();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.sqlite_path, "./session-eu-west-1.sqlite");
        let f = cfg.scan_filter();
        assert_eq!(f.from, DEFAULT_WINDOW_FROM);
        assert_eq!(f.to, DEFAULT_WINDOW_TO);
    }

    #[test]
    fn offsets_normalize_to_utc() {
        let ts = parse_ts("WINDOW_FROM", "2022-03-01T02:00:00+02:00").unwrap();
        assert_eq!(format_ts(ts), "2022-03-01T00:00:00Z");
    }

    #[test]
    fn rejects_inverted_window() {
        let mut cfg = base();
        std::mem::swap(&mut cfg.window_from, &mut cfg.window_to);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_page_and_bad_table() {
        let mut cfg = base();
        cfg.page_size = 0;
        assert!(cfg.validate().is_err());
        let mut cfg = base();
        cfg.table = "session;".to_string();
        assert!(cfg.validate().is_err());
    }

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn rejects_fractional_window_start() {
        let mut cfg = base();
        cfg.window_from = parse_ts("WINDOW_FROM", "2022-03-01T00:00:00.500Z").unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("WINDOW_FROM"));
    }

    #[test]
    fn rejects_fractional_window_end() {
        let mut cfg = base();
        cfg.window_to = parse_ts("WINDOW_TO", "2022-03-31T23:59:59.999Z").unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("WINDOW_TO"));
    }

    #[test]
    fn lookup_defaults() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(format_ts(cfg.window_from), DEFAULT_WINDOW_FROM);
        assert_eq!(format_ts(cfg.window_to), DEFAULT_WINDOW_TO);
        assert_eq!(cfg.table, "session");
        assert_eq!(cfg.region, "eu-west-1");
        assert_eq!(cfg.sqlite_path, "./session-eu-west-1.sqlite");
        assert_eq!(cfg.page_size, 1000);
        assert_eq!(cfg.format, OutputFormat::Csv);
        assert!(cfg.records_jsonl.is_none());
        assert!(cfg.output_path.is_none());
    }

    #[test]
    fn lookup_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("SOURCE_REGION", "us-east-1"),
            ("WINDOW_FROM", "2023-01-01T00:00:00Z"),
            ("WINDOW_TO", "2023-02-01T00:00:00Z"),
            ("PAGE_SIZE", "25"),
            ("OUTPUT_FORMAT", "jsonl"),
            ("OUTPUT_PATH", ""),
        ]))
        .unwrap();
        assert_eq!(cfg.sqlite_path, "./session-us-east-1.sqlite");
        assert_eq!(cfg.page_size, 25);
        assert_eq!(cfg.format, OutputFormat::Jsonl);
        assert!(cfg.output_path.is_none());
        assert_eq!(cfg.scan_filter().from, "2023-01-01T00:00:00Z");
    }

    #[test]
    fn lookup_rejects_bad_values() {
        let err = Config::from_lookup(lookup(&[("PAGE_SIZE", "lots")])).unwrap_err();
        assert!(err.to_string().contains("PAGE_SIZE"));
        assert!(Config::from_lookup(lookup(&[("PAGE_SIZE", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("OUTPUT_FORMAT", "xlsx")])).is_err());
        assert!(Config::from_lookup(lookup(&[("TABLE_NAME", "x y")])).is_err());
        assert!(Config::from_lookup(lookup(&[("WINDOW_FROM", "2022-03-01T00:00:00.500Z")])).is_err());
    }

    #[test]
    fn bad_timestamp_names_variable() {
        let err = parse_ts("WINDOW_TO", "March").unwrap_err();
        assert!(err.to_string().contains("WINDOW_TO"));
    }
}
