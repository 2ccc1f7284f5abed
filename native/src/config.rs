use log::{info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const APP_DIR_NAME: &str = "VarjoEyeModule";
const CONFIG_FILE_NAME: &str = "config.json";

/// Named pipe published by the vendor's background service while a headset is attached.
pub const VARJO_INFO_SERVICE_PIPE: &str = r"\\.\pipe\Varjo\InfoService";

static DEFAULT_MODULE_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join("CustomLibs")
        .join("Varjo")
});

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Config directory not accessible")]
    ConfigDirError,
}

/// Which telemetry backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// Native library when present in the module directory, companion otherwise.
    #[default]
    Auto,
    Native,
    Companion,
    Simulated,
}

/// Settings for locating and connecting to the vendor runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub backend: BackendPreference,
    /// Directory holding the vendor library and the companion executable.
    pub module_dir: Option<PathBuf>,
    pub library_name: String,
    pub companion_executable: String,
    /// Expect an already running companion instead of launching one.
    pub require_running_companion: bool,
    pub shared_memory_name: String,
    pub device_probe_path: PathBuf,
    pub connect_attempts: u32,
    pub connect_retry_delay_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            module_dir: None,
            library_name: "VarjoLib.dll".to_string(),
            companion_executable: "VarjoCompanion.exe".to_string(),
            require_running_companion: false,
            shared_memory_name: "VarjoEyeTracking".to_string(),
            device_probe_path: PathBuf::from(VARJO_INFO_SERVICE_PIPE),
            connect_attempts: 5,
            connect_retry_delay_ms: 500,
        }
    }
}

impl BackendConfig {
    pub fn module_dir(&self) -> PathBuf {
        self.module_dir
            .clone()
            .unwrap_or_else(|| DEFAULT_MODULE_DIR.clone())
    }

    pub fn library_path(&self) -> PathBuf {
        self.module_dir().join(&self.library_name)
    }

    pub fn companion_path(&self) -> PathBuf {
        self.module_dir().join(&self.companion_executable)
    }

    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_millis(self.connect_retry_delay_ms)
    }

    /// Probe for the vendor service. Gate only, not a connection.
    pub fn device_present(&self) -> bool {
        self.device_probe_path.exists()
    }
}

/// Thresholds for eyelid decomposition and pupil scaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub squeeze_threshold: f32,
    pub widen_threshold: f32,
    /// Largest openness jump accepted from an eye with Invalid status.
    pub max_untracked_openness_delta: f32,
    /// Pupil diameter (mm) that maps to a normalized value of 1.
    pub pupil_scale_mm: f32,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            squeeze_threshold: 0.15,
            widen_threshold: 0.90,
            max_untracked_openness_delta: 0.1,
            pupil_scale_mm: 10.0,
        }
    }
}

impl NormalizationConfig {
    pub fn is_valid(&self) -> bool {
        self.squeeze_threshold > 0.0
            && self.squeeze_threshold < self.widen_threshold
            && self.widen_threshold < 1.0
            && self.max_untracked_openness_delta >= 0.0
            && self.pupil_scale_mm > 0.0
    }

    /// Return this config, or the defaults if the thresholds can't be used.
    pub fn validated(self) -> Self {
        if self.is_valid() {
            self
        } else {
            warn!(
                "[CONFIG] Invalid normalization thresholds {:?} - using defaults",
                self
            );
            Self::default()
        }
    }
}

/// Top-level module configuration stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    pub poll_interval_ms: u64,
    pub backend: BackendConfig,
    pub normalization: NormalizationConfig,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            backend: BackendConfig::default(),
            normalization: NormalizationConfig::default(),
        }
    }
}

impl ModuleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let mut config: ModuleConfig = serde_json::from_str(content)?;
        config.normalization = config.normalization.validated();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load the user config, falling back to defaults on any problem.
    pub fn load_or_default() -> Self {
        let path = match get_config_path() {
            Ok(path) => path,
            Err(e) => {
                warn!("[CONFIG] {} - using defaults", e);
                return Self::default();
            }
        };

        if !path.exists() {
            info!("[CONFIG] No config at {:?} - using defaults", path);
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                info!("[CONFIG] Loaded {:?}", path);
                config
            }
            Err(e) => {
                warn!("[CONFIG] Failed to read {:?}: {} - using defaults", path, e);
                Self::default()
            }
        }
    }
}

pub fn get_config_directory() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or(ConfigError::ConfigDirError)
}

pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    Ok(get_config_directory()?.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModuleConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.backend.connect_attempts, 5);
        assert_eq!(config.backend.connect_retry_delay(), Duration::from_millis(500));
        assert_eq!(config.normalization.squeeze_threshold, 0.15);
        assert_eq!(config.normalization.widen_threshold, 0.90);
        assert!(config.normalization.is_valid());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ModuleConfig::from_json(r#"{ "backend": { "backend": "companion" } }"#)
            .expect("config should parse");
        assert_eq!(config.backend.backend, BackendPreference::Companion);
        assert_eq!(config.backend.shared_memory_name, "VarjoEyeTracking");
        assert_eq!(config.poll_interval_ms, 10);
    }

    #[test]
    fn test_invalid_thresholds_fall_back() {
        let config = ModuleConfig::from_json(
            r#"{ "normalization": { "squeeze_threshold": 0.95, "widen_threshold": 0.5 } }"#,
        )
        .expect("config should parse");
        assert_eq!(config.normalization, NormalizationConfig::default());
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(matches!(
            ModuleConfig::from_json("{ not json"),
            Err(ConfigError::JsonError(_))
        ));
    }

    #[test]
    fn test_module_dir_paths() {
        let mut backend = BackendConfig::default();
        backend.module_dir = Some(PathBuf::from("libs"));
        assert_eq!(backend.library_path(), PathBuf::from("libs").join("VarjoLib.dll"));
        assert_eq!(
            backend.companion_path(),
            PathBuf::from("libs").join("VarjoCompanion.exe")
        );
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = ModuleConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }
}
