/// Replaces `Disturb_Results` with a hand-prepared CSV file.
///
/// Usage: load_disturbance_csv [PATH]
///
/// PATH defaults to `output.disturbance_csv` from the config file, i.e. the
/// last debug export of the disturbance job.

use seabird_results::config::PipelineConfig;
use seabird_results::logging::{self, Stage};
use seabird_results::pipeline;
use seabird_results::sink::postgres::PostgresSink;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::from_env()?;
    logging::init_logger(
        config.logging.level,
        config.logging.file.as_deref(),
        config.logging.console_timestamps,
    )?;

    let path = match std::env::args_os().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => config
            .output
            .disturbance_csv
            .clone()
            .ok_or("no CSV path given and output.disturbance_csv is not set")?,
    };
    logging::info(
        Stage::System,
        None,
        &format!("Loading disturbance results from {}", path.display()),
    );

    let mut sink = PostgresSink::connect(&config.database_url)?;
    let publication = pipeline::load_manual_disturbance(&path, &mut sink)?;
    if !publication.succeeded() {
        return Err(format!("{} was not replaced", publication.table).into());
    }
    Ok(())
}
