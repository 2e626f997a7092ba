/// Recomputes breeding and roosting/rafting/hauled-out populations from the
/// feature service and replaces `b_results` and `rrh_results`.
///
/// Environment: SEABIRD_DATABASE_URL (required), SEABIRD_CONFIG (optional).

use seabird_results::config::PipelineConfig;
use seabird_results::ingest::arcgis::FeatureService;
use seabird_results::logging::{self, Stage};
use seabird_results::pipeline;
use seabird_results::sink::postgres::PostgresSink;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::from_env()?;
    logging::init_logger(
        config.logging.level,
        config.logging.file.as_deref(),
        config.logging.console_timestamps,
    )?;
    logging::info(Stage::System, None, "Population update starting");

    let source = FeatureService::connect(&config.source)?;
    let mut sink = PostgresSink::connect(&config.database_url)?;
    let run = pipeline::run_population(&config, &source, &mut sink)?;

    for publication in &run.publications {
        if !publication.succeeded() {
            logging::warn(Stage::System, Some(&publication.table), "Table was not replaced");
        }
    }
    logging::info(
        Stage::System,
        None,
        &format!(
            "Population update finished: {} breeding rows, {} rrh rows",
            run.breeding.len(),
            run.rrh.len()
        ),
    );
    Ok(())
}
