//! Pipeline configuration.
//!
//! Everything a job needs is carried in one `PipelineConfig` value that is
//! passed to the entry points in `pipeline`. The environment is read only in
//! `PipelineConfig::from_env`, which the binaries call once at startup:
//!
//! - `SEABIRD_DATABASE_URL` (required): results database connection string.
//! - `SEABIRD_CONFIG` (optional): TOML file path, default `seabird.toml`.
//!
//! Every TOML field has a default, so a missing file is not an error.

use crate::error::ConfigError;
use crate::logging::LogLevel;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DATABASE_URL_VAR: &str = "SEABIRD_DATABASE_URL";
pub const CONFIG_PATH_VAR: &str = "SEABIRD_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "seabird.toml";

/// Fraction of a survey area's count blocks that must be surveyed on a day.
pub const BLOCK_COVERAGE_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Filled from the environment, never from the file.
    #[serde(skip)]
    pub database_url: String,
    pub source: SourceConfig,
    pub qaqc: QaqcConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Loads `.env`, then the TOML file named by `SEABIRD_CONFIG`, then the
    /// database URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let path =
            std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load(Path::new(&path))?;
        config.database_url =
            std::env::var(DATABASE_URL_VAR).map_err(|_| ConfigError::MissingVar(DATABASE_URL_VAR))?;
        Ok(config)
    }

    /// Reads a TOML file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

// ---------------------------------------------------------------------------
// Feature service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Layer,
    Table,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Layer => "layer",
            LayerKind::Table => "table",
        }
    }
}

/// Position of a feature set in the service's `layers` or `tables` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LayerRef {
    pub kind: LayerKind,
    pub index: usize,
}

impl LayerRef {
    pub const fn layer(index: usize) -> Self {
        LayerRef { kind: LayerKind::Layer, index }
    }

    pub const fn table(index: usize) -> Self {
        LayerRef { kind: LayerKind::Table, index }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LayerMapping {
    pub surveys: LayerRef,
    pub observations: LayerRef,
    pub events: LayerRef,
}

impl Default for LayerMapping {
    fn default() -> Self {
        LayerMapping {
            surveys: LayerRef::layer(0),
            observations: LayerRef::table(0),
            events: LayerRef::table(1),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub portal_url: String,
    /// Portal item ID of the survey feature service.
    pub content_id: String,
    /// Records requested per query page.
    pub page_size: usize,
    pub timeout_secs: u64,
    pub layers: LayerMapping,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            portal_url: "https://www.arcgis.com".to_string(),
            content_id: "e40fcb8191c1427ab09836f62ccd8340".to_string(),
            page_size: 2000,
            timeout_secs: 60,
            layers: LayerMapping::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// QAQC
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QaqcConfig {
    /// Count blocks expected in areas without an explicit entry.
    pub default_expected_blocks: u32,
    /// Count blocks per survey area. Add entries as new sites are added.
    pub expected_blocks: BTreeMap<String, u32>,
}

impl Default for QaqcConfig {
    fn default() -> Self {
        QaqcConfig {
            default_expected_blocks: 10,
            expected_blocks: BTreeMap::from([("shell_beach".to_string(), 7)]),
        }
    }
}

impl QaqcConfig {
    pub fn expected_blocks_for(&self, survey_area: &str) -> u32 {
        self.expected_blocks
            .get(survey_area)
            .copied()
            .unwrap_or(self.default_expected_blocks)
    }
}

// ---------------------------------------------------------------------------
// Output and logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Frozen historical results (`.json` or `.csv`). None = no historical rows.
    pub historical_snapshot: Option<PathBuf>,
    /// Debug copy of the disturbance table. None disables the export.
    pub disturbance_csv: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            historical_snapshot: None,
            disturbance_csv: Some(PathBuf::from("disturbance.csv")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            file: None,
            console_timestamps: false,
        }
    }
}
