//! Result table schemas.
//!
//! Every published table is described by a static column list. Result rows
//! are converted to typed cells against that list before they reach a sink,
//! so the breeding and roosting unions never rely on column labels lining up.

use crate::error::SinkError;
use crate::model::{BreedingResult, DisturbanceResult, RrhResult};

pub const DISTURBANCE_TABLE: &str = "Disturb_Results";
pub const BREEDING_TABLE: &str = "b_results";
pub const RRH_TABLE: &str = "rrh_results";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Double,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Double => "DOUBLE PRECISION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnType,
    pub nullable: bool,
}

const fn column(name: &'static str, kind: ColumnType, nullable: bool) -> Column {
    Column { name, kind, nullable }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i32),
    Double(f64),
    Null,
}

impl CellValue {
    fn matches(&self, kind: ColumnType) -> bool {
        matches!(
            (self, kind),
            (CellValue::Text(_), ColumnType::Text)
                | (CellValue::Integer(_), ColumnType::Integer)
                | (CellValue::Double(_), ColumnType::Double)
                | (CellValue::Null, _)
        )
    }

    /// Text form used by the delimited exports. Null is an empty field.
    pub fn to_field(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Double(d) => d.to_string(),
            CellValue::Null => String::new(),
        }
    }
}

impl From<Option<f64>> for CellValue {
    fn from(value: Option<f64>) -> Self {
        value.map(CellValue::Double).unwrap_or(CellValue::Null)
    }
}

/// A record type that maps onto one result table.
pub trait ResultRow {
    const TABLE: &'static str;
    const COLUMNS: &'static [Column];

    /// Cells in `COLUMNS` order.
    fn cells(&self) -> Vec<CellValue>;
}

pub const DISTURBANCE_COLUMNS: &[Column] = &[
    column("group_name", ColumnType::Text, false),
    column("survey_area", ColumnType::Text, false),
    column("year", ColumnType::Integer, false),
    column("disturbs_per_day", ColumnType::Double, true),
];

pub const BREEDING_COLUMNS: &[Column] = &[
    column("group_name", ColumnType::Text, false),
    column("survey_area", ColumnType::Text, false),
    column("count_block", ColumnType::Integer, false),
    column("year", ColumnType::Integer, false),
    column("species", ColumnType::Text, false),
    column("population", ColumnType::Double, true),
];

pub const RRH_COLUMNS: &[Column] = &[
    column("group_name", ColumnType::Text, false),
    column("survey_area", ColumnType::Text, false),
    column("count_block", ColumnType::Integer, false),
    column("year", ColumnType::Integer, false),
    column("species", ColumnType::Text, false),
    column("rrh", ColumnType::Double, true),
];

impl ResultRow for DisturbanceResult {
    const TABLE: &'static str = DISTURBANCE_TABLE;
    const COLUMNS: &'static [Column] = DISTURBANCE_COLUMNS;

    fn cells(&self) -> Vec<CellValue> {
        vec![
            CellValue::Text(self.group_name.clone()),
            CellValue::Text(self.survey_area.clone()),
            CellValue::Integer(self.year),
            self.disturbs_per_day.into(),
        ]
    }
}

impl ResultRow for BreedingResult {
    const TABLE: &'static str = BREEDING_TABLE;
    const COLUMNS: &'static [Column] = BREEDING_COLUMNS;

    fn cells(&self) -> Vec<CellValue> {
        vec![
            CellValue::Text(self.group_name.clone()),
            CellValue::Text(self.survey_area.clone()),
            CellValue::Integer(self.count_block),
            CellValue::Integer(self.year),
            CellValue::Text(self.species.clone()),
            self.population.into(),
        ]
    }
}

impl ResultRow for RrhResult {
    const TABLE: &'static str = RRH_TABLE;
    const COLUMNS: &'static [Column] = RRH_COLUMNS;

    fn cells(&self) -> Vec<CellValue> {
        vec![
            CellValue::Text(self.group_name.clone()),
            CellValue::Text(self.survey_area.clone()),
            CellValue::Integer(self.count_block),
            CellValue::Integer(self.year),
            CellValue::Text(self.species.clone()),
            self.rrh.into(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Table data
// ---------------------------------------------------------------------------

/// A fully materialized result table, ready for a replace-on-write sink.
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub name: String,
    pub columns: &'static [Column],
    pub rows: Vec<Vec<CellValue>>,
}

impl TableData {
    pub fn from_rows<R: ResultRow>(rows: &[R]) -> Self {
        TableData {
            name: R::TABLE.to_string(),
            columns: R::COLUMNS,
            rows: rows.iter().map(ResultRow::cells).collect(),
        }
    }

    /// Checks row width, cell types, nullability and that every double is
    /// finite. Sinks call this before touching the destination.
    pub fn validate(&self) -> Result<(), SinkError> {
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(self.invalid(format!(
                    "row {} has {} cells, expected {}",
                    i,
                    row.len(),
                    self.columns.len()
                )));
            }
            for (cell, col) in row.iter().zip(self.columns) {
                if !cell.matches(col.kind) {
                    return Err(self.invalid(format!(
                        "row {} column {}: {:?} is not {}",
                        i,
                        col.name,
                        cell,
                        col.kind.sql_type()
                    )));
                }
                if *cell == CellValue::Null && !col.nullable {
                    return Err(self.invalid(format!("row {} column {} is null", i, col.name)));
                }
                if let CellValue::Double(d) = cell {
                    if !d.is_finite() {
                        return Err(self.invalid(format!(
                            "row {} column {} is not finite: {}",
                            i, col.name, d
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn invalid(&self, message: String) -> SinkError {
        SinkError::Validation {
            table: self.name.clone(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breeding(population: Option<f64>) -> BreedingResult {
        BreedingResult {
            group_name: "mcas".to_string(),
            survey_area: "shell_beach".to_string(),
            count_block: 3,
            year: 2019,
            species: "wegu".to_string(),
            population,
        }
    }

    #[test]
    fn test_table_data_uses_row_schema() {
        let table = TableData::from_rows(&[breeding(Some(8.0))]);
        assert_eq!(table.name, BREEDING_TABLE);
        assert_eq!(table.columns.len(), 6);
        assert_eq!(table.columns[5].name, "population");
        assert_eq!(table.rows[0][5], CellValue::Double(8.0));
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_nullable_measure_validates() {
        let table = TableData::from_rows(&[breeding(None)]);
        assert_eq!(table.rows[0][5], CellValue::Null);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_infinite_rate_fails_validation() {
        let result = DisturbanceResult {
            group_name: "A".to_string(),
            survey_area: "X".to_string(),
            year: 2021,
            disturbs_per_day: Some(f64::INFINITY),
        };
        let table = TableData::from_rows(&[result]);
        match table.validate() {
            Err(SinkError::Validation { table, .. }) => assert_eq!(table, DISTURBANCE_TABLE),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_cell_type_fails_validation() {
        let mut table = TableData::from_rows(&[breeding(Some(2.0))]);
        table.rows[0][2] = CellValue::Text("3".to_string());
        assert!(matches!(table.validate(), Err(SinkError::Validation { .. })));
    }

    #[test]
    fn test_null_key_fails_validation() {
        let mut table = TableData::from_rows(&[breeding(Some(2.0))]);
        table.rows[0][0] = CellValue::Null;
        assert!(matches!(table.validate(), Err(SinkError::Validation { .. })));
    }

    #[test]
    fn test_short_row_fails_validation() {
        let mut table = TableData::from_rows(&[breeding(Some(2.0))]);
        table.rows[0].pop();
        assert!(matches!(table.validate(), Err(SinkError::Validation { .. })));
    }

    #[test]
    fn test_result_tables_share_key_columns() {
        let key: Vec<_> = BREEDING_COLUMNS[..5].iter().map(|c| c.name).collect();
        let rrh_key: Vec<_> = RRH_COLUMNS[..5].iter().map(|c| c.name).collect();
        assert_eq!(key, rrh_key);
        assert_eq!(RRH_COLUMNS[5].name, "rrh");
        assert_eq!(DISTURBANCE_COLUMNS[3].name, "disturbs_per_day");
    }
}
