/// Recomputes annual disturbance rates from the feature service and
/// replaces `Disturb_Results`.
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
    logging::info(Stage::System, None, "Disturbance update starting");

    let source = FeatureService::connect(&config.source)?;
    let mut sink = PostgresSink::connect(&config.database_url)?;
    let run = pipeline::run_disturbance(&config, &source, &mut sink)?;

    logging::info(
        Stage::System,
        None,
        &format!(
            "Disturbance update finished: {} rows, published: {}",
            run.results.len(),
            run.publication.succeeded()
        ),
    );
    Ok(())
}
