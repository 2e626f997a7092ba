/// Job entry points.
///
/// Each job is a straight line: fetch, QAQC, aggregate, publish. Fetch,
/// snapshot and configuration errors end the job. Publish failures are
/// classified and logged, and the job carries on with the next table.

use crate::analysis::disturbance::disturbance_results;
use crate::analysis::population::{breeding_rows_by_species, population_results};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::ingest::FeatureSource;
use crate::ingest::historical::load_snapshot;
use crate::logging::{self, Stage};
use crate::model::{BreedingResult, DisturbanceResult, Flaggable, RrhResult};
use crate::qaqc::{
    annotate_surveys, flag_block_coverage, flag_conditions, flag_counts, merge_observations,
};
use crate::schema::{ResultRow, TableData};
use crate::sink::ResultSink;
use crate::sink::csv_export::{read_disturbance_csv, write_csv};
use std::path::Path;

/// Outcome of one published table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub table: String,
    pub rows: usize,
    /// `None` when the table was replaced.
    pub failure: Option<String>,
}

impl Publication {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisturbanceRun {
    pub results: Vec<DisturbanceResult>,
    pub undefined_rates: usize,
    pub publication: Publication,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopulationRun {
    pub breeding: Vec<BreedingResult>,
    pub rrh: Vec<RrhResult>,
    pub publications: Vec<Publication>,
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

fn publish<R: ResultRow, K: ResultSink>(sink: &mut K, rows: &[R]) -> Publication {
    let table = TableData::from_rows(rows);
    match sink.replace_table(&table) {
        Ok(written) => {
            logging::log_publish_summary(&table.name, written);
            Publication {
                table: table.name,
                rows: written,
                failure: None,
            }
        }
        Err(err) => {
            logging::log_sink_failure(&table.name, "Replace table", &err);
            Publication {
                table: table.name,
                rows: 0,
                failure: Some(err.to_string()),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Disturbance job
// ---------------------------------------------------------------------------

/// Recomputes annual disturbance rates and replaces `Disturb_Results`.
///
/// Only clean surveys whose observer recorded disturbance presence (yes or
/// no) contribute.
pub fn run_disturbance<S, K>(
    config: &PipelineConfig,
    source: &S,
    sink: &mut K,
) -> Result<DisturbanceRun, PipelineError>
where
    S: FeatureSource,
    K: ResultSink,
{
    let surveys = source.surveys()?;
    let events = source.events()?;
    logging::info(
        Stage::Source,
        None,
        &format!("Fetched {} surveys and {} disturbance events", surveys.len(), events.len()),
    );

    let mut annotated = annotate_surveys(surveys);
    flag_conditions(&mut annotated);
    let clean: Vec<_> = annotated
        .iter()
        .filter(|r| r.is_clean() && r.survey.records_disturbance())
        .cloned()
        .collect();
    logging::log_qaqc_summary(Stage::Qaqc, annotated.len(), clean.len(), &flag_counts(&annotated));

    let (results, rates) = disturbance_results(&clean, &events);
    let undefined_rates = rates.iter().filter(|r| r.disturb_rate.is_none()).count();
    if undefined_rates > 0 {
        logging::warn(
            Stage::Disturbance,
            None,
            &format!(
                "{} of {} surveys have no elapsed time; their rates are excluded",
                undefined_rates,
                rates.len()
            ),
        );
    }
    logging::info(
        Stage::Disturbance,
        None,
        &format!("{} surveys aggregated into {} annual rates", rates.len(), results.len()),
    );

    if let Some(path) = &config.output.disturbance_csv {
        let table = TableData::from_rows(&results);
        match write_csv(&table, path) {
            Ok(rows) => logging::info(
                Stage::Sink,
                Some(&path.display().to_string()),
                &format!("Wrote {} rows", rows),
            ),
            Err(err) => logging::log_sink_failure(&path.display().to_string(), "CSV export", &err),
        }
    }

    let publication = publish(sink, &results);
    Ok(DisturbanceRun {
        results,
        undefined_rates,
        publication,
    })
}

// ---------------------------------------------------------------------------
// Population job
// ---------------------------------------------------------------------------

/// Recomputes breeding and rrh populations and replaces `b_results` and
/// `rrh_results`. The historical snapshot is loaded before anything is
/// fetched so a bad snapshot path fails fast.
pub fn run_population<S, K>(
    config: &PipelineConfig,
    source: &S,
    sink: &mut K,
) -> Result<PopulationRun, PipelineError>
where
    S: FeatureSource,
    K: ResultSink,
{
    let historical = match &config.output.historical_snapshot {
        Some(path) => {
            let records = load_snapshot(path)?;
            logging::info(
                Stage::Population,
                Some(&path.display().to_string()),
                &format!("Loaded {} historical records", records.len()),
            );
            records
        }
        None => {
            logging::warn(Stage::Population, None, "No historical snapshot configured");
            Vec::new()
        }
    };

    let surveys = source.surveys()?;
    let observations = source.observations()?;
    logging::info(
        Stage::Source,
        None,
        &format!("Fetched {} surveys and {} observations", surveys.len(), observations.len()),
    );

    let mut rows = merge_observations(annotate_surveys(surveys), observations);
    flag_conditions(&mut rows);
    flag_block_coverage(&mut rows, &config.qaqc);
    let clean: Vec<_> = rows.iter().filter(|r| r.is_clean()).cloned().collect();
    logging::log_qaqc_summary(Stage::Qaqc, rows.len(), clean.len(), &flag_counts(&rows));

    let results = population_results(&clean, &historical);
    logging::info(
        Stage::Population,
        None,
        &format!(
            "{} breeding and {} rrh rows (including {} historical)",
            results.breeding.len(),
            results.rrh.len(),
            historical.len()
        ),
    );
    for (species, count) in breeding_rows_by_species(&results.breeding) {
        logging::debug(
            Stage::Population,
            Some(species.code),
            &format!("{}: {} breeding rows", species.common_name, count),
        );
    }

    let publications = vec![publish(sink, &results.breeding), publish(sink, &results.rrh)];
    Ok(PopulationRun {
        breeding: results.breeding,
        rrh: results.rrh,
        publications,
    })
}

// ---------------------------------------------------------------------------
// Manual loader
// ---------------------------------------------------------------------------

/// Replaces `Disturb_Results` with the contents of a delimited file, without
/// recomputing anything.
pub fn load_manual_disturbance<K: ResultSink>(
    path: &Path,
    sink: &mut K,
) -> Result<Publication, PipelineError> {
    let results = read_disturbance_csv(path)?;
    logging::info(
        Stage::Source,
        Some(&path.display().to_string()),
        &format!("Read {} disturbance rows", results.len()),
    );
    Ok(publish(sink, &results))
}
