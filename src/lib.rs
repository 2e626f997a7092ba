/// Seabird survey results pipeline.
///
/// Pulls survey records from the field-app feature service, applies QAQC
/// flags, computes disturbance rates and population estimates, and replaces
/// the result tables read by the public website.

pub mod analysis;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod qaqc;
pub mod schema;
pub mod sink;
pub mod species;
