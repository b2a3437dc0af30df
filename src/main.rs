use std::path::Path;

use anyhow::Result;

use sessionstats::config::Config;
use sessionstats::export::write_output;
use sessionstats::job;
use sessionstats::logging::log_run_failed;

fn main() -> Result<()> {
    let result = Config::from_env().and_then(|cfg| {
        let out = job::run(&cfg)?;
        write_output(cfg.output_path.as_deref().map(Path::new), &out.content)
    });
    if let Err(err) = &result {
        log_run_failed(err);
    }
    result
}
