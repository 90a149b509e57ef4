use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::spec::legacy::LEGACY_SPEC_FILE;

/// Environment variable naming a JSON configuration file.
pub const CONFIG_ENV: &str = "TABULAR_VIEWER_CONFIG";
/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "TABULAR_VIEWER_DATA_DIR";
/// Configuration file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tabular-viewer.json";

/// Viewer settings. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory listed on start-up.
    pub data_dir: PathBuf,
    /// File name parsed with the `$`-delimited legacy format.
    pub legacy_spec_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            legacy_spec_file: LEGACY_SPEC_FILE.to_string(),
        }
    }
}

impl Config {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Resolve the configuration from the process environment and the first
    /// command-line argument.
    pub fn load() -> Result<Self> {
        Self::resolve(
            std::env::var_os(CONFIG_ENV).map(PathBuf::from),
            std::env::var_os(DATA_DIR_ENV).map(PathBuf::from),
            std::env::args_os().nth(1).map(PathBuf::from),
        )
    }

    /// Precedence, lowest first: defaults, config file, `DATA_DIR_ENV`,
    /// positional argument.
    fn resolve(
        config_file: Option<PathBuf>,
        data_dir_env: Option<PathBuf>,
        data_dir_arg: Option<PathBuf>,
    ) -> Result<Self> {
        let mut config = match config_file {
            Some(path) => Self::from_json_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_json_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        if let Some(dir) = data_dir_env.filter(|d| !d.as_os_str().is_empty()) {
            config.data_dir = dir;
        }
        if let Some(dir) = data_dir_arg {
            config.data_dir = dir;
        }
        log::debug!("configuration: {config:?}");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let config: Config = serde_json::from_str(r#"{"data_dir": "/srv/study"}"#).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/study"));
        assert_eq!(config.legacy_spec_file, "SDTM_spec_Variables.csv");

        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn overrides_apply_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        std::fs::write(&path, r#"{"data_dir": "from_file", "legacy_spec_file": "legacy.csv"}"#).unwrap();

        let config = Config::resolve(Some(path.clone()), None, None).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("from_file"));
        assert_eq!(config.legacy_spec_file, "legacy.csv");

        let config = Config::resolve(Some(path.clone()), Some("from_env".into()), None).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("from_env"));

        let config =
            Config::resolve(Some(path), Some("from_env".into()), Some("from_arg".into())).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("from_arg"));
        assert_eq!(config.legacy_spec_file, "legacy.csv");
    }

    #[test]
    fn broken_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = Config::resolve(Some(path), None, None).unwrap_err();
        assert!(format!("{err:#}").contains("parsing config"));

        let missing = dir.path().join("missing.json");
        assert!(Config::resolve(Some(missing), None, None).is_err());
    }
}
