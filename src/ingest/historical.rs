/// Frozen historical population results.
///
/// Results from before the field app existed live in a static snapshot that
/// is appended to every published population table. The snapshot is a JSON
/// array of records, or a headed CSV when the file ends in `.csv`.

use crate::error::PipelineError;
use crate::model::HistoricalRecord;
use std::path::Path;

pub fn load_snapshot(path: &Path) -> Result<Vec<HistoricalRecord>, PipelineError> {
    let snapshot_error = |message: String| PipelineError::Snapshot {
        path: path.display().to_string(),
        message,
    };

    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    if is_csv {
        let mut reader = csv::Reader::from_path(path).map_err(|e| snapshot_error(e.to_string()))?;
        reader
            .deserialize()
            .collect::<Result<Vec<HistoricalRecord>, csv::Error>>()
            .map_err(|e| snapshot_error(e.to_string()))
    } else {
        let text = std::fs::read_to_string(path).map_err(|e| snapshot_error(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| snapshot_error(e.to_string()))
    }
}
