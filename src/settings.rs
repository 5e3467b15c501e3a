use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buckets::HourBandMapping;
use crate::error::{ReportError, Result};

pub const DEFAULT_SETTINGS_FILE: &str = "card_report.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub hour_band_mapping: HourBandMapping,
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
    #[serde(default = "default_write_outputs")]
    pub write_outputs: bool,
}

fn default_data_path() -> PathBuf {
    PathBuf::from("sampled_card_sales.csv")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_preview_rows() -> usize {
    5
}

fn default_write_outputs() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            output_dir: default_output_dir(),
            hour_band_mapping: HourBandMapping::default(),
            preview_rows: default_preview_rows(),
            write_outputs: default_write_outputs(),
        }
    }
}

/// Explicit path must exist; the default file is optional.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
    };
    if !path.exists() {
        if required {
            return Err(ReportError::Settings(format!("{} not found", path.display())));
        }
        debug!(path = %path.display(), "no settings file, using defaults");
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(&path)?;
    serde_json::from_str(&content)
        .map_err(|e| ReportError::Settings(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"hour_band_mapping": "legacy", "preview_rows": 2}"#).unwrap();
        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.hour_band_mapping, HourBandMapping::Legacy);
        assert_eq!(settings.preview_rows, 2);
        assert_eq!(settings.data_path, PathBuf::from("sampled_card_sales.csv"));
        assert!(settings.write_outputs);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, ReportError::Settings(_)));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"hour_band_mapping": "hourly"}"#).unwrap();
        assert!(matches!(load_settings(Some(&path)), Err(ReportError::Settings(_))));
    }

    #[test]
    fn roundtrip() {
        let settings = Settings { preview_rows: 9, ..Settings::default() };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
