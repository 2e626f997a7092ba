//! Disturbance rate aggregation.
//!
//! A survey is identified by its group, area and day, not by `globalid`:
//! every clean count-block record of that day belongs to the same survey.
//! Each survey's rate is its event count over the elapsed time from the
//! earliest start to the latest end. Annual results average the rate over
//! the contributing survey records, so a survey covering more blocks
//! weighs more.

use crate::analysis::groupings::{group_indices, mean_present};
use crate::model::{AnnotatedSurvey, DisturbanceEvent, DisturbanceResult};
use crate::qaqc::date_key;
use chrono::{Datelike, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Per-survey intermediate values, one entry per survey identity key.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyRate {
    /// `group_name + survey_area + date`.
    pub survey_id: String,
    pub survey_start: NaiveDateTime,
    pub survey_end: Option<NaiveDateTime>,
    pub events: usize,
    /// Elapsed survey time in days. `None` when no record has an end time.
    pub interval_days: Option<f64>,
    /// `events / interval_days`. `None` when the interval is missing or zero.
    pub disturb_rate: Option<f64>,
}

/// Identity key of the survey a record belongs to.
pub fn survey_id(row: &AnnotatedSurvey) -> String {
    format!(
        "{}{}{}",
        row.survey.group_name,
        row.survey.survey_area,
        date_key(&row.calendar)
    )
}

/// Computes the event count, elapsed time and rate of every survey.
/// Results are ordered by survey identity key.
pub fn survey_rates(surveys: &[AnnotatedSurvey], events: &[DisturbanceEvent]) -> Vec<SurveyRate> {
    let mut events_per_parent: HashMap<&str, usize> = HashMap::new();
    for event in events {
        if let Some(parent) = event.parentglobalid.as_deref() {
            *events_per_parent.entry(parent).or_default() += 1;
        }
    }

    let groups = group_indices(surveys, survey_id);
    let mut rates = Vec::with_capacity(groups.len());

    for (survey_id, indices) in groups {
        let rows = indices.iter().map(|&i| &surveys[i]);
        let Some(survey_start) = rows.clone().map(|r| r.survey.start_date).min() else {
            continue;
        };
        let survey_end = rows.clone().filter_map(|r| r.survey.end_date).max();
        let events = rows
            .map(|r| {
                events_per_parent
                    .get(r.survey.globalid.as_str())
                    .copied()
                    .unwrap_or(0)
            })
            .sum::<usize>();

        let interval_days = survey_end.map(|end| {
            (end - survey_start).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
        });
        let disturb_rate = match interval_days {
            Some(days) if days != 0.0 => Some(events as f64 / days),
            _ => None,
        };

        rates.push(SurveyRate {
            survey_id,
            survey_start,
            survey_end,
            events,
            interval_days,
            disturb_rate,
        });
    }
    rates
}

/// Mean disturbance rate per (group_name, survey_area, year), averaged over
/// every survey record that carries a defined rate. Groups whose rates are
/// all undefined publish no value. Ordered by the grouping key.
pub fn mean_rates_by_year(
    surveys: &[AnnotatedSurvey],
    rates: &[SurveyRate],
) -> Vec<DisturbanceResult> {
    let rate_by_id: HashMap<&str, Option<f64>> = rates
        .iter()
        .map(|r| (r.survey_id.as_str(), r.disturb_rate))
        .collect();

    let mut per_year: BTreeMap<(String, String, i32), Vec<Option<f64>>> = BTreeMap::new();
    for row in surveys {
        let rate = rate_by_id.get(survey_id(row).as_str()).copied().flatten();
        per_year
            .entry((
                row.survey.group_name.clone(),
                row.survey.survey_area.clone(),
                row.survey.start_date.year(),
            ))
            .or_default()
            .push(rate);
    }

    per_year
        .into_iter()
        .map(|((group_name, survey_area, year), rates)| DisturbanceResult {
            group_name,
            survey_area,
            year,
            disturbs_per_day: mean_present(rates),
        })
        .collect()
}

/// Full disturbance aggregation over surveys that already passed QAQC.
pub fn disturbance_results(
    surveys: &[AnnotatedSurvey],
    events: &[DisturbanceEvent],
) -> (Vec<DisturbanceResult>, Vec<SurveyRate>) {
    let rates = survey_rates(surveys, events);
    (mean_rates_by_year(surveys, &rates), rates)
}
