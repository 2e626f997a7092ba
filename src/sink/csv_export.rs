/// Delimited copies of result tables.
///
/// The disturbance job writes its results next to the database publish so a
/// run can be checked by hand, and the manual loader reads the same shape
/// back. Null measures are empty fields.

use crate::error::SinkError;
use crate::model::DisturbanceResult;
use crate::schema::TableData;
use std::path::Path;

/// Writes a header of column names followed by every row.
pub fn write_csv(table: &TableData, path: &Path) -> Result<usize, SinkError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.columns.iter().map(|c| c.name))?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.to_field()))?;
    }
    writer.flush()?;
    Ok(table.rows.len())
}

/// Reads a headed file with the `Disturb_Results` columns. Extra columns,
/// such as a leading row-index column, are ignored.
pub fn read_disturbance_csv(path: &Path) -> Result<Vec<DisturbanceResult>, SinkError> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<Result<Vec<DisturbanceResult>, csv::Error>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_write_csv_with_null_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disturbance.csv");
        let rows = vec![
            DisturbanceResult {
                group_name: "A".to_string(),
                survey_area: "X".to_string(),
                year: 2021,
                disturbs_per_day: Some(1.5),
            },
            DisturbanceResult {
                group_name: "A".to_string(),
                survey_area: "Y".to_string(),
                year: 2021,
                disturbs_per_day: None,
            },
        ];

        let written = write_csv(&TableData::from_rows(&rows), &path).unwrap();
        assert_eq!(written, 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "group_name,survey_area,year,disturbs_per_day\nA,X,2021,1.5\nA,Y,2021,\n"
        );
    }

    #[test]
    fn test_read_file_with_index_column() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, ",group_name,survey_area,year,disturbs_per_day").unwrap();
        writeln!(file, "0,mcas,shell_beach,2019,0.42").unwrap();
        writeln!(file, "1,mcas,pigeon_point,2019,").unwrap();

        let rows = read_disturbance_csv(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].survey_area, "shell_beach");
        assert_eq!(rows[0].disturbs_per_day, Some(0.42));
        assert_eq!(rows[1].disturbs_per_day, None);
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "group_name,year").unwrap();
        writeln!(file, "mcas,2019").unwrap();
        assert!(matches!(read_disturbance_csv(file.path()), Err(SinkError::Csv(_))));
    }
}
