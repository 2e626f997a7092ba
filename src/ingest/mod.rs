/// Raw data acquisition for the seabird results pipeline.
///
/// The jobs in `pipeline` read survey data through the `FeatureSource`
/// trait so the transforms never see HTTP. The production implementation
/// is the ArcGIS REST client in `arcgis`; tests supply in-memory sources.
///
/// Submodules:
/// - `arcgis` - paged queries against the survey feature service.
/// - `historical` - the frozen population results snapshot.

pub mod arcgis;
pub mod historical;

use crate::error::SourceError;
use crate::model::{DisturbanceEvent, ObservationRecord, SurveyRecord};

/// The three survey feature sets.
///
/// Each call returns the full feature set; implementations are not
/// expected to cache between calls.
pub trait FeatureSource {
    fn surveys(&self) -> Result<Vec<SurveyRecord>, SourceError>;
    fn events(&self) -> Result<Vec<DisturbanceEvent>, SourceError>;
    fn observations(&self) -> Result<Vec<ObservationRecord>, SourceError>;
}
