/// Aggregation of QAQC-clean survey rows into published results.
///
/// The functions here are pure: they take annotated rows and return result
/// records in a deterministic order. Fetching and publishing are handled by
/// `ingest`, `sink` and `pipeline`.
///
/// Submodules:
/// - `groupings` - keyed grouping, sums, means and ranks shared by both jobs.
/// - `disturbance` - disturbance events per survey day, averaged per year.
/// - `population` - breeding and roosting/rafting/hauled-out estimates.

pub mod disturbance;
pub mod groupings;
pub mod population;
