//! Calibration record and persistence.
//!
//! The calibrated zero is the raw servo position observed at the first
//! confirmed hard-stop contact. It is persisted keyed by servo serial so a
//! restart can skip the contact drive when asked to. The predictor movement
//! speed is configuration, not a calibration product — the record carries it
//! only so consumers get both scaling inputs from one place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::units::PositionScale;

/// Output of a successful calibration, combined with the configured speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRecord {
    /// Raw position at first confirmed hard-stop contact.
    pub zero_raw: i32,
    /// Predictor speed [%/s], from configuration.
    pub movement_speed_pct_per_s: f64,
}

impl CalibrationRecord {
    /// Position scaling anchored at this record's zero.
    pub fn scale(&self, span_ticks: i32) -> PositionScale {
        PositionScale {
            zero_raw: self.zero_raw,
            span_ticks,
        }
    }
}

// ─── Persistence ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct StoredCalibration {
    zero_raw: i32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    grippers: BTreeMap<String, StoredCalibration>,
}

/// TOML-backed calibration store, one entry per servo serial.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored zero for a serial, if any. A missing file is not an
    /// error — it just means no servo has been calibrated yet.
    pub fn load_zero(&self, serial: &str) -> Result<Option<i32>, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ConfigError::Io {
                    path: self.path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };
        let file: StoreFile =
            toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(file.grippers.get(serial).map(|c| c.zero_raw))
    }

    /// Persist a freshly calibrated zero, keeping other serials' entries.
    pub fn save_zero(&self, serial: &str, zero_raw: i32) -> Result<(), ConfigError> {
        let mut file = match std::fs::read_to_string(&self.path) {
            Ok(text) => toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreFile::default(),
            Err(e) => {
                return Err(ConfigError::Io {
                    path: self.path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        file.grippers
            .insert(serial.to_string(), StoredCalibration { zero_raw });

        let text = toml::to_string_pretty(&file).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(&self.path, text).map_err(|e| ConfigError::Io {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!(serial, zero_raw, "calibration zero persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CalibrationStore::new(dir.path().join("cal.toml"));
        assert_eq!(store.load_zero("GRIP-0042").unwrap(), None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CalibrationStore::new(dir.path().join("cal.toml"));

        store.save_zero("GRIP-0042", 1234).unwrap();
        assert_eq!(store.load_zero("GRIP-0042").unwrap(), Some(1234));
        assert_eq!(store.load_zero("GRIP-9999").unwrap(), None);

        // Re-calibration overwrites without touching other serials.
        store.save_zero("GRIP-9999", 900).unwrap();
        store.save_zero("GRIP-0042", 1301).unwrap();
        assert_eq!(store.load_zero("GRIP-0042").unwrap(), Some(1301));
        assert_eq!(store.load_zero("GRIP-9999").unwrap(), Some(900));
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cal.toml");
        std::fs::write(&path, "not toml [").unwrap();
        let store = CalibrationStore::new(&path);
        assert!(matches!(
            store.load_zero("GRIP-0042"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn record_scale() {
        let record = CalibrationRecord {
            zero_raw: 1200,
            movement_speed_pct_per_s: 952.43,
        };
        let scale = record.scale(2000);
        assert_eq!(scale.pct_to_raw(50.0), 2200);
    }
}
