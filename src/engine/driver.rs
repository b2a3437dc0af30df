//! Aggregation driver: pulls pages from a [`RecordSource`] and folds each
//! record into the summary of its session, in delivery order.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use serde_json::json;

use super::reducer::{apply, UnknownTag};
use super::state::SessionSummary;
use crate::events::{EventKind, RawRecord};
use crate::logging::{log, log_unknown_tag, obj, Domain, Level, ProfileScope};
use crate::source::RecordSource;

/// Counters describing one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub pages: u64,
    pub records: u64,
    pub kinds: BTreeMap<EventKind, u64>,
}

impl RunStats {
    pub fn kind_count(&self, kind: EventKind) -> u64 {
        self.kinds.get(&kind).copied().unwrap_or(0)
    }
}

/// Finished result of a scan. Only produced once the source is exhausted.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub sessions: HashMap<String, SessionSummary>,
    pub stats: RunStats,
}

#[derive(Debug, Default)]
pub struct Aggregator {
    sessions: HashMap<String, SessionSummary>,
    stats: RunStats,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one page. Stops at the first unknown tag.
    pub fn ingest(&mut self, page: &[RawRecord]) -> Result<(), UnknownTag> {
        self.stats.pages += 1;
        for record in page {
            let summary = self
                .sessions
                .entry(record.id.clone())
                .or_insert_with(|| SessionSummary::new(&record.id));
            let kind = apply(summary, record)?;
            self.stats.records += 1;
            *self.stats.kinds.entry(kind).or_insert(0) += 1;
        }
        Ok(())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn finish(self) -> Aggregation {
        Aggregation {
            sessions: self.sessions,
            stats: self.stats,
        }
    }
}

/// Drain `source` page by page and return every session summary.
///
/// A retrieval error or an unknown tag aborts immediately; nothing partial
/// is returned.
pub fn aggregate<S: RecordSource + ?Sized>(source: &mut S) -> Result<Aggregation> {
    let _scope = ProfileScope::new("aggregate");
    let mut agg = Aggregator::new();

    while source.has_more_pages() {
        let page = source
            .next_page()
            .with_context(|| format!("fetching page {}", agg.stats.pages + 1))?;
        if let Err(err) = agg.ingest(&page) {
            log_unknown_tag(&err.id, &err.tag, agg.stats.pages);
            return Err(err.into());
        }
        log(
            Level::Debug,
            Domain::Scan,
            "page_fetched",
            obj(&[
                ("page", json!(agg.stats.pages)),
                ("records", json!(page.len())),
                ("sessions", json!(agg.session_count())),
            ]),
        );
    }

    Ok(agg.finish())
}
