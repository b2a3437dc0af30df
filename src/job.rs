//! One export run: scan the window, fold, render.

use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::engine::driver::{aggregate, Aggregation, RunStats};
use crate::events::EventKind;
use crate::export::{content_sha256, render};
use crate::logging::{log_run_start, log_run_summary};
use crate::source::{format_ts, JsonlSource};
use crate::storage::EventStore;

/// Rendered output of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub content: String,
    pub sha256: String,
    pub sessions: usize,
    pub stats: RunStats,
}

pub fn collect(cfg: &Config) -> Result<Aggregation> {
    let filter = cfg.scan_filter();
    match &cfg.records_jsonl {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path))?;
            let mut source = JsonlSource::new(BufReader::new(file), filter, cfg.page_size);
            aggregate(&mut source)
        }
        None => {
            let store = EventStore::open_read_only(&cfg.sqlite_path, &cfg.table)
                .with_context(|| format!("opening store {}", cfg.sqlite_path))?;
            let mut scan = store.scan(filter, cfg.page_size);
            aggregate(&mut scan)
        }
    }
}

/// Run the whole job. Nothing is returned unless every page folded cleanly.
pub fn run(cfg: &Config) -> Result<RunOutput> {
    let source = match &cfg.records_jsonl {
        Some(path) => format!("jsonl:{}", path),
        None => format!("sqlite:{}", cfg.sqlite_path),
    };
    log_run_start(
        &cfg.table,
        &cfg.region,
        &source,
        &format_ts(cfg.window_from),
        &format_ts(cfg.window_to),
        cfg.page_size,
    );

    let agg = collect(cfg)?;
    let content = render(cfg.format, &agg.sessions)?;
    let sha256 = content_sha256(&content);

    let kinds: Vec<(&str, u64)> = EventKind::ORDERED
        .iter()
        .map(|k| (k.as_str(), agg.stats.kind_count(*k)))
        .filter(|(_, n)| *n > 0)
        .collect();
    log_run_summary(
        agg.sessions.len(),
        agg.stats.records,
        agg.stats.pages,
        &kinds,
        cfg.format.as_str(),
        &sha256,
    );

    Ok(RunOutput {
        content,
        sha256,
        sessions: agg.sessions.len(),
        stats: agg.stats,
    })
}
