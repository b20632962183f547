//! Service configuration loaded from TOML.

use std::fs;

use serde::Deserialize;

use weir::WeirError;

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    /// Persistence settings.
    #[serde(default)]
    persist: PersistConfig,
}

impl ServiceConfig {
    pub fn persist(&self) -> &PersistConfig {
        &self.persist
    }
}

/// Persistence settings; the `BPMN_PERSIST_DIR` environment variable and
/// the `--persist-dir` flag both override the file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersistConfig {
    #[serde(default)]
    directory: Option<String>,
}

impl PersistConfig {
    pub fn directory(&self) -> Option<&str> {
        self.directory.as_deref()
    }
}

/// Loads the configuration file, or defaults when no path is given.
///
/// # Errors
///
/// Returns `InvalidArgument` when the file exists but cannot be parsed,
/// and `Io` when it cannot be read.
pub fn load_config(path: Option<&String>) -> Result<ServiceConfig, WeirError> {
    let Some(path) = path else {
        return Ok(ServiceConfig::default());
    };
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|err| WeirError::InvalidArgument(err.to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = load_config(None).unwrap();
        assert!(config.persist().directory().is_none());
    }

    #[test]
    fn test_parses_persist_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[persist]\ndirectory = \"/tmp/diagrams\"").unwrap();
        let path = file.path().to_string_lossy().to_string();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.persist().directory(), Some("/tmp/diagrams"));
    }

    #[test]
    fn test_bad_toml_is_invalid_argument() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not [valid").unwrap();
        let path = file.path().to_string_lossy().to_string();
        assert!(load_config(Some(&path)).is_err());
    }
}
