//! Survey quality-assurance flags.
//!
//! Flags are assigned in a fixed order and a later rule overwrites an
//! earlier one: duplicates first, then visibility, sea state and
//! assessability. The block-coverage rule only flags rows that are still
//! clean. Both pipelines depend on this order; keep it.

use crate::analysis::groupings::group_indices;
use crate::config::{BLOCK_COVERAGE_THRESHOLD, QaqcConfig};
use crate::model::{
    AnnotatedSurvey, Flaggable, ObservationRecord, ObservationRow, QaqcFlag, SurveyCalendar,
    SurveyRecord,
};
use chrono::{Datelike, NaiveDateTime};
use std::collections::{BTreeMap, HashMap, HashSet};

const VISIBILITY_POOR: i32 = 5;
const BEAUFORT_POOR: i32 = 8;

// ---------------------------------------------------------------------------
// Calendar fields
// ---------------------------------------------------------------------------

pub fn derive_calendar(start: NaiveDateTime) -> SurveyCalendar {
    SurveyCalendar {
        date: start.date(),
        date_m_d: start.format("%m-%-d").to_string(),
        year: start.year(),
        week: start.format("%Y-%U").to_string(),
    }
}

/// Text form of the survey day used in survey identity keys, e.g. "2021-06-1".
pub fn date_key(calendar: &SurveyCalendar) -> String {
    calendar.date.format("%Y-%m-%-d").to_string()
}

// ---------------------------------------------------------------------------
// Survey-level rules
// ---------------------------------------------------------------------------

/// Derives calendar fields, keeps approved surveys and flags same-day
/// duplicates. Approval is applied first so an approved record is preferred
/// over an earlier unapproved one.
pub fn annotate_surveys(surveys: Vec<SurveyRecord>) -> Vec<AnnotatedSurvey> {
    let mut annotated: Vec<AnnotatedSurvey> = surveys
        .into_iter()
        .filter(SurveyRecord::is_approved)
        .map(|survey| AnnotatedSurvey {
            calendar: derive_calendar(survey.start_date),
            survey,
            qaqc: None,
        })
        .collect();
    flag_duplicates(&mut annotated);
    annotated
}

/// Within each (date, group_name, survey_area, count_block), every row that
/// did not start at the group's earliest start time is a duplicate. Rows
/// tied at the earliest time are all kept.
pub fn flag_duplicates<T: Flaggable>(rows: &mut [T]) {
    let groups = group_indices(rows, |r| {
        (
            r.calendar().date,
            r.survey().group_name.clone(),
            r.survey().survey_area.clone(),
            r.survey().count_block,
        )
    });

    for indices in groups.values() {
        if indices.len() < 2 {
            continue;
        }
        let Some(earliest) = indices.iter().map(|&i| rows[i].survey().start_date).min() else {
            continue;
        };
        for &i in indices {
            if rows[i].survey().start_date != earliest {
                rows[i].set_qaqc(QaqcFlag::Duplicate);
            }
        }
    }
}

/// Weather and assessability rules, in order. Each overwrites any flag
/// already on the row, including `Duplicate`.
pub fn flag_conditions<T: Flaggable>(rows: &mut [T]) {
    for row in rows.iter_mut() {
        if row.survey().visibility == Some(VISIBILITY_POOR) {
            row.set_qaqc(QaqcFlag::PoorVisibility);
        }
    }
    for row in rows.iter_mut() {
        if row.survey().beaufort == Some(BEAUFORT_POOR) {
            row.set_qaqc(QaqcFlag::PoorSeaState);
        }
    }
    for row in rows.iter_mut() {
        if row.survey().assessable.as_deref() == Some("n") {
            row.set_qaqc(QaqcFlag::NotAssessable);
        }
    }
}

/// Flags clean rows whose survey day covered fewer than 60% of the area's
/// count blocks. Coverage is the number of distinct blocks among the clean
/// rows of the same (date, group_name, survey_area).
pub fn flag_block_coverage<T: Flaggable>(rows: &mut [T], config: &QaqcConfig) {
    let mut blocks: HashMap<(chrono::NaiveDate, String, String), HashSet<i32>> = HashMap::new();
    for row in rows.iter().filter(|r| r.is_clean()) {
        blocks
            .entry(coverage_key(row))
            .or_default()
            .insert(row.survey().count_block);
    }

    for row in rows.iter_mut().filter(|r| r.is_clean()) {
        let counted = blocks.get(&coverage_key(&*row)).map_or(0, HashSet::len);
        let expected = config.expected_blocks_for(&row.survey().survey_area);
        if (counted as f64) < f64::from(expected) * BLOCK_COVERAGE_THRESHOLD {
            row.set_qaqc(QaqcFlag::LowBlockCoverage);
        }
    }
}

fn coverage_key<T: Flaggable>(row: &T) -> (chrono::NaiveDate, String, String) {
    (
        row.calendar().date,
        row.survey().group_name.clone(),
        row.survey().survey_area.clone(),
    )
}

// ---------------------------------------------------------------------------
// Observation merge
// ---------------------------------------------------------------------------

/// Joins every annotated survey with its observations. Observations whose
/// parent is not an annotated survey are dropped; surveys without any
/// observation are kept once with no observation. Rows come out ordered by
/// survey `globalid`, observations in input order within a survey.
pub fn merge_observations(
    surveys: Vec<AnnotatedSurvey>,
    observations: Vec<ObservationRecord>,
) -> Vec<ObservationRow> {
    let mut by_parent: HashMap<String, Vec<ObservationRecord>> = HashMap::new();
    for obs in observations {
        if let Some(parent) = obs.parentglobalid.clone() {
            by_parent.entry(parent).or_default().push(obs);
        }
    }

    let mut surveys = surveys;
    surveys.sort_by(|a, b| a.survey.globalid.cmp(&b.survey.globalid));

    let mut rows = Vec::with_capacity(surveys.len());
    for annotated in surveys {
        let matched = by_parent.get(&annotated.survey.globalid);
        match matched {
            Some(list) if !list.is_empty() => {
                for obs in list {
                    rows.push(ObservationRow {
                        survey: annotated.survey.clone(),
                        calendar: annotated.calendar.clone(),
                        observation: Some(obs.clone()),
                        qaqc: annotated.qaqc,
                    });
                }
            }
            _ => rows.push(ObservationRow {
                survey: annotated.survey,
                calendar: annotated.calendar,
                observation: None,
                qaqc: annotated.qaqc,
            }),
        }
    }
    rows
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Count of rows per flag, in flag order.
pub fn flag_counts<T: Flaggable>(rows: &[T]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<QaqcFlag, usize> = BTreeMap::new();
    for flag in rows.iter().filter_map(|r| r.qaqc()) {
        *counts.entry(flag).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(flag, n)| (flag.label().to_string(), n))
        .collect()
}
