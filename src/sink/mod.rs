/// Result publication.
///
/// Every job output fully replaces a named table; there are no incremental
/// updates. The `ResultSink` trait is the seam between the jobs and the
/// results store.
///
/// Submodules:
/// - `postgres` - drop-and-recreate writer for the website database.
/// - `csv_export` - delimited debug export and the manual loader input.

pub mod csv_export;
pub mod postgres;

use crate::error::SinkError;
use crate::schema::TableData;
use std::collections::BTreeMap;

pub trait ResultSink {
    /// Replaces `table.name` with exactly `table.rows`. Returns the number
    /// of rows written.
    fn replace_table(&mut self, table: &TableData) -> Result<usize, SinkError>;
}

/// Keeps published tables in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: BTreeMap<String, TableData>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&TableData> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

impl ResultSink for MemorySink {
    fn replace_table(&mut self, table: &TableData) -> Result<usize, SinkError> {
        table.validate()?;
        self.tables.insert(table.name.clone(), table.clone());
        Ok(table.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DisturbanceResult;
    use crate::schema::{CellValue, DISTURBANCE_TABLE};

    fn result(year: i32, rate: Option<f64>) -> DisturbanceResult {
        DisturbanceResult {
            group_name: "A".to_string(),
            survey_area: "X".to_string(),
            year,
            disturbs_per_day: rate,
        }
    }

    #[test]
    fn test_replace_discards_previous_rows() {
        let mut sink = MemorySink::new();
        sink.replace_table(&TableData::from_rows(&[result(2020, Some(1.0)), result(2021, None)]))
            .unwrap();
        let written = sink
            .replace_table(&TableData::from_rows(&[result(2022, Some(0.5))]))
            .unwrap();

        assert_eq!(written, 1);
        let table = sink.table(DISTURBANCE_TABLE).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][2], CellValue::Integer(2022));
    }

    #[test]
    fn test_invalid_table_leaves_previous_contents() {
        let mut sink = MemorySink::new();
        sink.replace_table(&TableData::from_rows(&[result(2020, Some(1.0))]))
            .unwrap();

        let mut bad = TableData::from_rows(&[result(2021, Some(2.0))]);
        bad.rows[0][3] = CellValue::Double(f64::NAN);
        assert!(matches!(
            sink.replace_table(&bad),
            Err(SinkError::Validation { .. })
        ));
        assert_eq!(sink.table(DISTURBANCE_TABLE).unwrap().rows[0][2], CellValue::Integer(2020));
    }
}
