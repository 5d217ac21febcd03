//! Application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CyclewatchError, CyclewatchResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where the database, reports and clips are written.
    pub output_dir: PathBuf,

    /// File name of the SQLite cycle store inside `output_dir`.
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Measured zones, in reporting order.
    pub zones: Vec<ZoneConfig>,

    /// Detector classes and their confidence thresholds.
    pub classes: Vec<ClassConfig>,

    /// Which class ids drive activity, completion and occupancy.
    pub roles: ClassRoles,

    /// Debounce and crowding settings.
    pub measurement: MeasurementSettings,

    /// Longest-cycle clip extraction settings.
    #[serde(default)]
    pub clip: ClipSettings,

    /// Reporting settings.
    #[serde(default)]
    pub report: ReportSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// A named zone rectangle in pixel coordinates `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub name: String,
    pub rect: [i32; 4],
}

/// A detector class with its minimum accepted confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassConfig {
    pub id: u32,
    pub name: String,
    pub confidence_threshold: f32,
}

/// Class ids assigned to each signal role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRoles {
    /// In-progress marker (e.g. "Assembling").
    pub activity: u32,
    /// Finished-unit marker (e.g. "Pallet").
    pub completion: u32,
    /// Actor counted for crowding (e.g. "Worker").
    pub occupancy: u32,
}

/// Debounce thresholds and crowding limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementSettings {
    /// Frame rate used when the detection stream does not declare one.
    pub fps: f64,

    /// Consecutive activity frames required to start measuring.
    pub start_threshold: u32,

    /// Consecutive completion frames required to stop measuring.
    pub stop_threshold: u32,

    /// Occupancy count at which in-progress cycles become invalid.
    pub crowding_threshold: u32,
}

/// Clip extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipSettings {
    /// Seconds of context added before and after the cycle.
    pub margin_secs: f64,

    /// Whether to cut clips when a processed video is available.
    pub enabled: bool,
}

/// Reporting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Target cycle time written for every zone.
    pub target_secs: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "cyclewatch=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            database_file: default_database_file(),
            zones: vec![
                ZoneConfig::new("A_Assemble", [140, 260, 150, 310]),
                ZoneConfig::new("A2_Assemble", [550, 260, 560, 310]),
                ZoneConfig::new("B_Assemble", [750, 260, 760, 310]),
                ZoneConfig::new("B2_Assemble", [1150, 260, 1160, 310]),
            ],
            classes: vec![
                ClassConfig::new(0, "Worker", 0.40),
                ClassConfig::new(1, "Pallet", 0.30),
                ClassConfig::new(2, "Assembling", 0.10),
            ],
            roles: ClassRoles {
                activity: 2,
                completion: 1,
                occupancy: 0,
            },
            measurement: MeasurementSettings::default(),
            clip: ClipSettings::default(),
            report: ReportSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for MeasurementSettings {
    fn default() -> Self {
        Self {
            fps: 24.0,
            start_threshold: 1,
            stop_threshold: 5,
            crowding_threshold: 3,
        }
    }
}

impl Default for ClipSettings {
    fn default() -> Self {
        Self {
            margin_secs: 2.0,
            enabled: true,
        }
    }
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self { target_secs: 5.0 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Raise the level to `debug` when `verbose` is set. Output format and
    /// file target are kept.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.level = "debug".to_string();
        }
        self
    }
}

impl ZoneConfig {
    pub fn new(name: impl Into<String>, rect: [i32; 4]) -> Self {
        Self {
            name: name.into(),
            rect,
        }
    }
}

impl ClassConfig {
    pub fn new(id: u32, name: impl Into<String>, confidence_threshold: f32) -> Self {
        Self {
            id,
            name: name.into(),
            confidence_threshold,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Unlike [`AppConfig::load`], any
    /// read or parse failure is returned to the caller.
    pub fn load_from(path: impl AsRef<Path>) -> CyclewatchResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CyclewatchError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config as pretty JSON to `path`.
    pub fn save_to(&self, path: impl AsRef<Path>) -> CyclewatchResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check the numeric settings. Zone geometry is validated separately
    /// when the zone set is built.
    pub fn validate(&self) -> CyclewatchResult<()> {
        let m = &self.measurement;
        if !m.fps.is_finite() || m.fps <= 0.0 {
            return Err(CyclewatchError::config(format!(
                "fps must be positive, got {}",
                m.fps
            )));
        }
        if m.start_threshold == 0 || m.stop_threshold == 0 {
            return Err(CyclewatchError::config(
                "start_threshold and stop_threshold must be at least 1",
            ));
        }
        if m.crowding_threshold == 0 {
            return Err(CyclewatchError::config(
                "crowding_threshold must be at least 1",
            ));
        }
        if m.stop_threshold < m.start_threshold {
            tracing::warn!(
                start = m.start_threshold,
                stop = m.stop_threshold,
                "stop_threshold is below start_threshold; bias correction will be negative"
            );
        }
        if !self.clip.margin_secs.is_finite() || self.clip.margin_secs < 0.0 {
            return Err(CyclewatchError::config(format!(
                "clip margin must be non-negative, got {}",
                self.clip.margin_secs
            )));
        }
        for role in [self.roles.activity, self.roles.completion, self.roles.occupancy] {
            if !self.classes.iter().any(|c| c.id == role) {
                return Err(CyclewatchError::config(format!(
                    "class {role} is assigned a role but has no confidence threshold"
                )));
            }
        }
        Ok(())
    }

    /// Human-readable name for a class id.
    pub fn class_name(&self, id: u32) -> &str {
        self.classes
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
            .unwrap_or("Unknown")
    }

    /// Full path of the SQLite store.
    pub fn database_path(&self) -> PathBuf {
        self.output_dir.join(&self.database_file)
    }
}

fn default_database_file() -> String {
    "cycle_time_data.db".to_string()
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("cyclewatch").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.zones.len(), 4);
        assert_eq!(config.class_name(2), "Assembling");
        assert_eq!(config.class_name(99), "Unknown");
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let mut config = AppConfig::default();
        config.measurement.start_threshold = 0;
        assert!(matches!(
            config.validate(),
            Err(CyclewatchError::Config { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_fps() {
        let mut config = AppConfig::default();
        config.measurement.fps = f64::NAN;
        assert!(config.validate().is_err());
        config.measurement.fps = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_role_without_class_is_rejected() {
        let mut config = AppConfig::default();
        config.roles.occupancy = 7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join("cyclewatch_test_config");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.json");

        let mut config = AppConfig::default();
        config.measurement.stop_threshold = 8;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.measurement.stop_threshold, 8);
        assert_eq!(loaded.zones, config.zones);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_optional_sections_default() {
        let raw = r#"{
            "output_dir": "out",
            "zones": [{"name": "Z", "rect": [0, 0, 10, 10]}],
            "classes": [{"id": 0, "name": "Worker", "confidence_threshold": 0.4}],
            "roles": {"activity": 0, "completion": 0, "occupancy": 0},
            "measurement": {"fps": 30.0, "start_threshold": 2, "stop_threshold": 6, "crowding_threshold": 3}
        }"#;
        let parsed: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.database_file, "cycle_time_data.db");
        assert!((parsed.clip.margin_secs - 2.0).abs() < 1e-9);
        assert!((parsed.report.target_secs - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_logging_section() {
        let mut value = serde_json::to_value(AppConfig::default()).unwrap();
        value["logging"] = serde_json::json!({"json": true, "file": "logs/cyclewatch.log"});
        let parsed: AppConfig = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.logging.level, "info");
        assert!(parsed.logging.json);
        assert_eq!(parsed.logging.file, Some(PathBuf::from("logs/cyclewatch.log")));
    }

    #[test]
    fn test_verbose_raises_level_only() {
        let logging = LoggingConfig {
            level: "warn".to_string(),
            json: true,
            file: Some(PathBuf::from("run.log")),
        };
        assert_eq!(logging.clone().with_verbose(false), logging);

        let verbose = logging.with_verbose(true);
        assert_eq!(verbose.level, "debug");
        assert!(verbose.json);
        assert_eq!(verbose.file, Some(PathBuf::from("run.log")));
    }

    #[test]
    fn test_load_from_missing_path() {
        let missing = std::env::temp_dir().join("cyclewatch_no_such_config.json");
        let _ = std::fs::remove_file(&missing);
        assert!(matches!(
            AppConfig::load_from(&missing),
            Err(CyclewatchError::FileNotFound { .. })
        ));
    }
}
