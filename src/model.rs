/// Core data types for the seabird results pipeline.
///
/// This module defines the shared domain model imported by all other modules:
/// raw feature-service records, QAQC-annotated rows, and result records.
/// It contains no I/O.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Raw records
// ---------------------------------------------------------------------------

/// One observation session at a count block, as delivered by the survey layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyRecord {
    pub globalid: String,
    /// Observer organization code.
    pub group_name: String,
    /// Site code, e.g. "shell_beach".
    pub survey_area: String,
    /// Sub-site zone within the survey area.
    pub count_block: i32,
    pub start_date: NaiveDateTime, // UTC
    pub end_date: Option<NaiveDateTime>,
    pub approved: Option<String>,        // "a" = approved
    pub visibility: Option<i32>,         // 1-5, 5 = poor
    pub beaufort: Option<i32>,           // 0-8 sea state
    pub assessable: Option<String>,      // "y" / "n"
    pub disturbance_obs: Option<String>, // "yes" / "no" / unknown
}

impl SurveyRecord {
    pub fn is_approved(&self) -> bool {
        self.approved.as_deref() == Some("a")
    }

    /// Whether the observer recorded disturbance presence either way.
    /// Surveys with an unknown disturbance observation carry no rate.
    pub fn records_disturbance(&self) -> bool {
        matches!(self.disturbance_obs.as_deref(), Some("yes") | Some("no"))
    }
}

/// A disturbance occurrence attached to a survey by `parentglobalid`.
#[derive(Debug, Clone, PartialEq)]
pub struct DisturbanceEvent {
    pub globalid: String,
    pub parentglobalid: Option<String>,
}

/// A species count attached to a survey by `parentglobalid`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    pub parentglobalid: Option<String>,
    pub species: Option<String>,
    pub sp_count: Option<f64>,
    pub nest_count: Option<f64>,
}

// ---------------------------------------------------------------------------
// QAQC annotation
// ---------------------------------------------------------------------------

/// Reason a row is excluded from analysis. A row without a flag is clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QaqcFlag {
    Duplicate,
    PoorVisibility,
    PoorSeaState,
    NotAssessable,
    LowBlockCoverage,
}

impl QaqcFlag {
    pub fn label(&self) -> &'static str {
        match self {
            QaqcFlag::Duplicate => "Duplicate",
            QaqcFlag::PoorVisibility => "Poor Visibility",
            QaqcFlag::PoorSeaState => "Poor Sea State",
            QaqcFlag::NotAssessable => "Not Assessable",
            QaqcFlag::LowBlockCoverage => "<60% of blocks counted",
        }
    }
}

impl fmt::Display for QaqcFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Calendar fields derived from a survey's `start_date`.
///
/// `date_m_d` and `week` are kept in their textual form because the
/// population rules compare and group on the text, not on the date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyCalendar {
    pub date: NaiveDate,
    /// Month-day, day not zero-padded: "06-1", "05-31".
    pub date_m_d: String,
    pub year: i32,
    /// Year and Sunday-based week of year: "2021-22".
    pub week: String,
}

/// An approved survey with derived calendar fields and its QAQC state.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedSurvey {
    pub survey: SurveyRecord,
    pub calendar: SurveyCalendar,
    pub qaqc: Option<QaqcFlag>,
}

/// A survey joined with one of its observations. Surveys without any
/// observation appear once with `observation: None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRow {
    pub survey: SurveyRecord,
    pub calendar: SurveyCalendar,
    pub observation: Option<ObservationRecord>,
    pub qaqc: Option<QaqcFlag>,
}

impl ObservationRow {
    pub fn species(&self) -> Option<&str> {
        self.observation.as_ref().and_then(|o| o.species.as_deref())
    }

    pub fn sp_count(&self) -> Option<f64> {
        self.observation.as_ref().and_then(|o| o.sp_count)
    }

    pub fn nest_count(&self) -> Option<f64> {
        self.observation.as_ref().and_then(|o| o.nest_count)
    }
}

/// Rows that carry a survey and a QAQC state, so the same flagging rules
/// apply before and after the observation merge.
pub trait Flaggable {
    fn survey(&self) -> &SurveyRecord;
    fn calendar(&self) -> &SurveyCalendar;
    fn qaqc(&self) -> Option<QaqcFlag>;
    fn set_qaqc(&mut self, flag: QaqcFlag);

    fn is_clean(&self) -> bool {
        self.qaqc().is_none()
    }
}

impl Flaggable for AnnotatedSurvey {
    fn survey(&self) -> &SurveyRecord {
        &self.survey
    }
    fn calendar(&self) -> &SurveyCalendar {
        &self.calendar
    }
    fn qaqc(&self) -> Option<QaqcFlag> {
        self.qaqc
    }
    fn set_qaqc(&mut self, flag: QaqcFlag) {
        self.qaqc = Some(flag);
    }
}

impl Flaggable for ObservationRow {
    fn survey(&self) -> &SurveyRecord {
        &self.survey
    }
    fn calendar(&self) -> &SurveyCalendar {
        &self.calendar
    }
    fn qaqc(&self) -> Option<QaqcFlag> {
        self.qaqc
    }
    fn set_qaqc(&mut self, flag: QaqcFlag) {
        self.qaqc = Some(flag);
    }
}

// ---------------------------------------------------------------------------
// Result records
// ---------------------------------------------------------------------------

/// Mean daily disturbance rate for a group, area and year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisturbanceResult {
    pub group_name: String,
    pub survey_area: String,
    pub year: i32,
    /// `None` when every contributing survey had an undefined rate.
    pub disturbs_per_day: Option<f64>,
}

/// Breeding population estimate for a count block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreedingResult {
    pub group_name: String,
    pub survey_area: String,
    pub count_block: i32,
    pub year: i32,
    pub species: String,
    pub population: Option<f64>,
}

/// Roosting/rafting/hauled-out annual mean for a count block, rounded up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RrhResult {
    pub group_name: String,
    pub survey_area: String,
    pub count_block: i32,
    pub year: i32,
    pub species: String,
    pub rrh: Option<f64>,
}

/// A record of the frozen historical results snapshot. It carries both
/// measures and is projected onto each result table before the union.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub group_name: String,
    pub survey_area: String,
    pub count_block: i32,
    pub year: i32,
    pub species: String,
    #[serde(default)]
    pub population: Option<f64>,
    #[serde(default)]
    pub rrh: Option<f64>,
}

impl From<&HistoricalRecord> for BreedingResult {
    fn from(record: &HistoricalRecord) -> Self {
        BreedingResult {
            group_name: record.group_name.clone(),
            survey_area: record.survey_area.clone(),
            count_block: record.count_block,
            year: record.year,
            species: record.species.clone(),
            population: record.population,
        }
    }
}

impl From<&HistoricalRecord> for RrhResult {
    fn from(record: &HistoricalRecord) -> Self {
        RrhResult {
            group_name: record.group_name.clone(),
            survey_area: record.survey_area.clone(),
            count_block: record.count_block,
            year: record.year,
            species: record.species.clone(),
            rrh: record.rrh,
        }
    }
}
