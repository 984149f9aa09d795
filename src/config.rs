use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::interpreter::DEFAULT_LIB_PATH;

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed library configuration {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Library settings read from `<lib dir>/config.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    pub lib_path: PathBuf,
    /// Modules imported before any user code runs.
    pub autoload: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            lib_path: PathBuf::from(DEFAULT_LIB_PATH),
            autoload: vec![],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConfigFile {
    lib_path: Option<PathBuf>,
    autoload: Vec<String>,
}

impl ConfigFile {
    fn into_config(self, lib_dir: &Path) -> LibraryConfig {
        LibraryConfig {
            lib_path: self.lib_path.unwrap_or_else(|| lib_dir.to_path_buf()),
            autoload: self.autoload,
        }
    }
}

impl LibraryConfig {
    /// Reads the configuration in `lib_dir`. A missing file yields the
    /// defaults with `lib_path` set to `lib_dir`.
    pub fn load(lib_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let lib_dir = lib_dir.as_ref();
        let path = lib_dir.join(CONFIG_FILE);
        if !path.is_file() {
            debug!(path = %path.display(), "no library configuration, using defaults");
            return Ok(Self {
                lib_path: lib_dir.to_path_buf(),
                ..Self::default()
            });
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = serde_json::from_str::<ConfigFile>(&text)
            .map_err(|source| ConfigError::Malformed {
                path: path.clone(),
                source,
            })?
            .into_config(lib_dir);
        debug!(
            path = %path.display(),
            lib_path = %config.lib_path.display(),
            autoload = ?config.autoload,
            "loaded library configuration"
        );
        Ok(config)
    }

    /// Parses a configuration document; `libPath` defaults to `./lib/bcc`.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let file: ConfigFile = serde_json::from_str(text)?;
        Ok(file.into_config(Path::new(DEFAULT_LIB_PATH)))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_full() {
        let config = LibraryConfig::parse(r#"{ "libPath": "modules", "autoload": ["a.bcm", "b.bcm"] }"#)
            .expect("valid configuration");
        assert_eq!(config.lib_path, PathBuf::from("modules"));
        assert_eq!(config.autoload, vec!["a.bcm".to_string(), "b.bcm".to_string()]);
    }

    #[test]
    fn test_parse_defaults() {
        let config = LibraryConfig::parse("{}").expect("valid configuration");
        assert_eq!(config, LibraryConfig::default());
        assert_eq!(config.lib_path, PathBuf::from("./lib/bcc"));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(LibraryConfig::parse("{ \"autoload\": 3 }").is_err());
        assert!(LibraryConfig::parse("not json").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = LibraryConfig::load(dir.path()).expect("missing file is tolerated");
        assert_eq!(config.lib_path, dir.path());
        assert!(config.autoload.is_empty());
    }

    #[test]
    fn test_load_keeps_directory_without_lib_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join(CONFIG_FILE), r#"{ "autoload": ["m.bcm"] }"#)
            .expect("write config");
        let config = LibraryConfig::load(dir.path()).expect("valid configuration");
        assert_eq!(config.lib_path, dir.path());
        assert_eq!(config.autoload, vec!["m.bcm".to_string()]);
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join(CONFIG_FILE), "{ libPath: }").expect("write config");
        let err = LibraryConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }
}
