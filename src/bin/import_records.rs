//! Load JSONL table items (path argument or stdin) into the session store.

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use anyhow::{Context, Result};
use serde_json::json;

use sessionstats::config::{default_store_path, DEFAULT_REGION, DEFAULT_TABLE};
use sessionstats::logging::{log, obj, v_str, Domain, Level};
use sessionstats::source::read_records;
use sessionstats::storage::EventStore;

fn main() -> Result<()> {
    let table = std::env::var("TABLE_NAME").unwrap_or_else(|_| DEFAULT_TABLE.to_string());
    let region = std::env::var("SOURCE_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string());
    let sqlite_path = std::env::var("SQLITE_PATH").unwrap_or_else(|_| default_store_path(&region));

    let reader: Box<dyn BufRead> = match std::env::args().nth(1) {
        Some(path) => Box::new(BufReader::new(
            File::open(&path).with_context(|| format!("opening {}", path))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let records = read_records(reader)?;

    let mut store = EventStore::open(&sqlite_path, &table)?;
    store.init()?;
    let inserted = store.insert_records(&records)?;

    log(
        Level::Info,
        Domain::System,
        "import_complete",
        obj(&[
            ("table", v_str(&table)),
            ("path", v_str(&sqlite_path)),
            ("inserted", json!(inserted)),
        ]),
    );
    println!("imported {} records into {}:{}", inserted, sqlite_path, table);
    Ok(())
}
