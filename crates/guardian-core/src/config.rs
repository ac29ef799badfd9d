//! Configuration types for the guardian engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the guardian moderation engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardianConfig {
    /// Detector configuration.
    pub detector: DetectorConfig,

    /// Ledger configuration.
    pub ledger: LedgerConfig,
}

/// Detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Path to the JSON rule catalog. A missing or unparseable catalog
    /// disables detection rather than failing startup.
    pub catalog_path: PathBuf,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("config/detection_rules.json"),
        }
    }
}

/// Ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Path to the ledger database directory.
    pub db_path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./guardian_ledger.db"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths() {
        let config = GuardianConfig::default();
        assert_eq!(
            config.detector.catalog_path,
            PathBuf::from("config/detection_rules.json")
        );
        assert_eq!(config.ledger.db_path, PathBuf::from("./guardian_ledger.db"));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = GuardianConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: GuardianConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.ledger.db_path, config.ledger.db_path);
    }
}
