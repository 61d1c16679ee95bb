//! Run configuration, read from a JSON file and passed explicitly to the
//! pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::reference::{DistanceMetric, ReferenceKey};

/// Kilometres subtracted from the 3D distance for gas compensation.
pub const GAS_COMPENSATION_KM: f64 = 6.0;

/// Kilometres added to the 3D distance for the chicken-way penalty.
pub const CHICKEN_PENALTY_KM: f64 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceConfig {
    pub folders: Folders,
    #[serde(default)]
    pub excel_params: ExportParams,
    #[serde(default)]
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folders {
    pub input_files_folder: PathBuf,
    pub reference_distance_folder: PathBuf,
    #[serde(default)]
    pub competitors_db: Option<CompetitorsDb>,
    pub output_file_folder: PathBuf,
}

/// Location of the competitor registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorsDb {
    #[serde(alias = "file")]
    pub competitors_file: PathBuf,
    #[serde(default, alias = "sheet")]
    pub competitors_sheet: Option<String>,
    #[serde(default, alias = "table")]
    pub competitors_table: Option<String>,
}

/// Presentation options for the export. CSV exports carry no sheets,
/// tables or styles, so these are informational there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportParams {
    #[serde(default = "default_table_name")]
    pub table_name: String,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    #[serde(default = "default_table_style_name")]
    pub table_style_name: String,
}

fn default_table_name() -> String {
    "RaceResults".to_string()
}

fn default_sheet_name() -> String {
    "Race Data".to_string()
}

fn default_table_style_name() -> String {
    "TableStyleMedium9".to_string()
}

impl Default for ExportParams {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            sheet_name: default_sheet_name(),
            table_style_name: default_table_style_name(),
        }
    }
}

/// Primary distance and whether registry adjustments apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationMode {
    /// 2D distance only, no registry lookups or adjustments.
    Planar,
    /// 3D distance with registry metadata and adjustments.
    #[default]
    #[serde(rename = "adjusted-3d")]
    Adjusted3d,
}

impl ValidationMode {
    pub fn distance_metric(self) -> DistanceMetric {
        match self {
            ValidationMode::Planar => DistanceMetric::Planar,
            ValidationMode::Adjusted3d => DistanceMetric::Spatial,
        }
    }

    pub fn uses_registry(self) -> bool {
        matches!(self, ValidationMode::Adjusted3d)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordGranularity {
    /// One record per file; all tracks in the file are joined.
    #[default]
    PerFile,
    /// One record per track (GPX segment) in the file.
    PerSegment,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileErrorPolicy {
    /// The first bad file fails the whole run and nothing is exported.
    #[default]
    Abort,
    /// Bad files are reported and the rest are still exported.
    Collect,
}

/// Turns the permissive defaults for unresolved lookups into errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strictness {
    #[serde(default)]
    pub unknown_category: bool,
    #[serde(default)]
    pub unknown_competitor: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Adjustments {
    pub gas_compensation_km: f64,
    pub chicken_way_penalty_km: f64,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self {
            gas_compensation_km: GAS_COMPENSATION_KM,
            chicken_way_penalty_km: CHICKEN_PENALTY_KM,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub mode: ValidationMode,
    pub record_granularity: RecordGranularity,
    pub reference_key: ReferenceKey,
    #[serde(flatten)]
    pub adjustments: Adjustments,
    pub strictness: Strictness,
    pub on_file_error: FileErrorPolicy,
    /// Worker threads for validation; `None` lets rayon decide.
    pub workers: Option<usize>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            mode: ValidationMode::default(),
            record_granularity: RecordGranularity::default(),
            reference_key: ReferenceKey::default(),
            adjustments: Adjustments::default(),
            strictness: Strictness::default(),
            on_file_error: FileErrorPolicy::default(),
            workers: None,
        }
    }
}

impl RaceConfig {
    pub fn new(
        input_files_folder: impl Into<PathBuf>,
        reference_distance_folder: impl Into<PathBuf>,
        output_file_folder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            folders: Folders {
                input_files_folder: input_files_folder.into(),
                reference_distance_folder: reference_distance_folder.into(),
                competitors_db: None,
                output_file_folder: output_file_folder.into(),
            },
            excel_params: ExportParams::default(),
            validation: ValidationConfig::default(),
        }
    }

    pub fn with_competitors_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.folders.competitors_db = Some(CompetitorsDb {
            competitors_file: path.into(),
            competitors_sheet: None,
            competitors_table: None,
        });
        self
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: RaceConfig = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let adjustments = &self.validation.adjustments;
        for (name, value) in [
            ("gas_compensation_km", adjustments.gas_compensation_km),
            ("chicken_way_penalty_km", adjustments.chicken_way_penalty_km),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.validation.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "folders": {
            "input_files_folder": "race/input",
            "reference_distance_folder": "race/reference",
            "competitors_db": {
                "competitors_file": "race/competitors.csv",
                "competitors_sheet": "Competitors",
                "competitors_table": "CompetitorsList"
            },
            "output_file_folder": "race/results"
        },
        "excel_params": {
            "table_name": "Results",
            "sheet_name": "Race Data",
            "table_style_name": "TableStyleMedium2"
        },
        "validation": {
            "mode": "planar",
            "record_granularity": "per-segment",
            "reference_key": "parent-dir",
            "gas_compensation_km": 5.5,
            "strictness": { "unknown_category": true },
            "on_file_error": "collect",
            "workers": 2
        }
    }"#;

    #[test]
    fn test_parse_full_config() {
        let config: RaceConfig = serde_json::from_str(FULL).unwrap();
        config.validate().unwrap();

        let adjusted: ValidationMode = serde_json::from_str(r#""adjusted-3d""#).unwrap();
        assert_eq!(adjusted, ValidationMode::Adjusted3d);

        assert_eq!(config.folders.input_files_folder, PathBuf::from("race/input"));
        let db = config.folders.competitors_db.as_ref().unwrap();
        assert_eq!(db.competitors_sheet.as_deref(), Some("Competitors"));
        assert_eq!(config.excel_params.table_style_name, "TableStyleMedium2");

        let validation = &config.validation;
        assert_eq!(validation.mode, ValidationMode::Planar);
        assert_eq!(validation.record_granularity, RecordGranularity::PerSegment);
        assert_eq!(validation.reference_key, ReferenceKey::ParentDir);
        assert_eq!(validation.adjustments.gas_compensation_km, 5.5);
        assert_eq!(validation.adjustments.chicken_way_penalty_km, CHICKEN_PENALTY_KM);
        assert!(validation.strictness.unknown_category);
        assert!(!validation.strictness.unknown_competitor);
        assert_eq!(validation.on_file_error, FileErrorPolicy::Collect);
        assert_eq!(validation.workers, Some(2));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: RaceConfig = serde_json::from_str(
            r#"{
                "folders": {
                    "input_files_folder": "in",
                    "reference_distance_folder": "ref",
                    "competitors_db": { "file": "db.csv", "sheet": "S", "table": "T" },
                    "output_file_folder": "out"
                }
            }"#,
        )
        .unwrap();

        let db = config.folders.competitors_db.unwrap();
        assert_eq!(db.competitors_file, PathBuf::from("db.csv"));
        assert_eq!(db.competitors_table.as_deref(), Some("T"));
        assert_eq!(config.validation, ValidationConfig::default());
        assert_eq!(config.validation.adjustments.gas_compensation_km, GAS_COMPENSATION_KM);
        assert_eq!(config.excel_params.sheet_name, "Race Data");
    }

    #[test]
    fn test_rejects_negative_adjustment() {
        let mut config = RaceConfig::new("in", "ref", "out");
        config.validation.adjustments.chicken_way_penalty_km = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_reports_path() {
        let err = RaceConfig::load("/no/such/config.json").unwrap_err();
        assert!(err.to_string().contains("/no/such/config.json"));
    }
}
