use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_VAR: &str = "TREERANGE_CONFIG";

/// Longest checksum a serialized range can carry (hex digits of SHA-256).
pub const MAX_CHECKSUM_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Engine options, read from `config.toml`. Every field has a default, so
/// a partial (or empty) file is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub selection: SelectionConfig,
    pub serialization: SerializationConfig,
}

/// `[selection]`: how a selection set talks to its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// After adding a range, compare it with what the backend holds and keep
    /// the backend's version when they differ.
    pub check_selection_ranges: bool,
    /// Add backwards ranges through collapse and extend when the backend
    /// supports it; otherwise they are added forwards.
    pub prefer_backwards_extend: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            check_selection_ranges: true,
            prefer_backwards_extend: true,
        }
    }
}

/// `[serialization]`: the saved range format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializationConfig {
    /// Append a `{checksum}` of the root's shape to serialized ranges.
    pub include_checksum: bool,
    /// Number of hex digits kept from the checksum.
    pub checksum_len: usize,
}

impl Default for SerializationConfig {
    fn default() -> Self {
        Self {
            include_checksum: true,
            checksum_len: 8,
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;
        config.validate()?;

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// The loaded config, or the defaults when no file exists.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        Ok(Self::load()?.unwrap_or_default())
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        self.validate()?;
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let len = self.serialization.checksum_len;
        if len == 0 || len > MAX_CHECKSUM_LEN {
            return Err(ConfigError::InvalidValue {
                field: "serialization.checksum_len",
                reason: format!("must be between 1 and {MAX_CHECKSUM_LEN}, got {len}"),
            });
        }
        Ok(())
    }

    /// `$TREERANGE_CONFIG` when set (with shell variables and tilde
    /// expanded), otherwise `~/.config/treerange/config.toml`.
    pub fn config_path() -> PathBuf {
        if let Ok(custom) = std::env::var(CONFIG_PATH_VAR) {
            let custom = PathBuf::from(custom);
            return Self::expand_path(&custom).unwrap_or(custom);
        }
        let config_dir = shellexpand::tilde("~/.config/treerange");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        assert!(!path_str.starts_with('~'));
        if env::var(CONFIG_PATH_VAR).is_err() {
            assert!(path_str.ends_with(".config/treerange/config.toml"));
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.selection.check_selection_ranges);
        assert!(config.selection.prefer_backwards_extend);
        assert!(config.serialization.include_checksum);
        assert_eq!(config.serialization.checksum_len, 8);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let original = Config {
            selection: SelectionConfig {
                check_selection_ranges: false,
                prefer_backwards_extend: true,
            },
            serialization: SerializationConfig {
                include_checksum: false,
                checksum_len: 12,
            },
        };

        let toml_str = toml::to_string(&original).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config_content = r#"
[serialization]
checksum_len = 16
"#;

        let config: Config = toml::from_str(config_content).unwrap();

        assert_eq!(config.serialization.checksum_len, 16);
        assert!(config.serialization.include_checksum);
        assert_eq!(config.selection, SelectionConfig::default());
    }

    #[test]
    fn test_empty_file_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test/path");
        let expanded = Config::expand_path(&path);

        assert!(expanded.is_some());
        let expanded = expanded.unwrap();
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_with_env_var() {
        unsafe {
            env::set_var("TREERANGE_TEST_VAR", "/test/env/path");
        }

        let path = PathBuf::from("$TREERANGE_TEST_VAR/subdir");
        let expanded = Config::expand_path(&path);

        assert!(expanded.is_some());
        let expanded = expanded.unwrap();
        assert_eq!(expanded, PathBuf::from("/test/env/path/subdir"));

        unsafe {
            env::remove_var("TREERANGE_TEST_VAR");
        }
    }

    #[test]
    fn test_expand_path_with_absolute_path() {
        let path = PathBuf::from("/absolute/path");
        let expanded = Config::expand_path(&path).unwrap();

        assert_eq!(expanded, path);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested/config.toml");
        let mut test_config = Config::default();
        test_config.selection.check_selection_ranges = false;

        test_config.save_to_path(&config_file).unwrap();
        let loaded_config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded_config, test_config);
    }

    #[test]
    fn test_load_rejects_bad_checksum_len() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "[serialization]\nchecksum_len = 0\n").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();

        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "serialization.checksum_len",
                ..
            }
        ));
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "[selection\n").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();

        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
    }

    #[test]
    fn test_save_rejects_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        let mut config = Config::default();
        config.serialization.checksum_len = MAX_CHECKSUM_LEN + 1;

        assert!(config.save_to_path(&config_file).is_err());
        assert!(!config_file.exists());
    }
}
