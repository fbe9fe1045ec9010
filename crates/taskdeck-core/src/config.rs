//! Viewer configuration.
//!
//! Loaded from `~/.taskdeck/config.yaml` (or an explicit path). Every field
//! has a default, so a partial file, or none at all, is fine.
//!
//! ```yaml
//! storage_dir: /home/me/.taskdeck/tasks
//! page_size: 100
//! default_layout: split-horizontal
//! search:
//!   debounce_ms: 300
//!   threshold: 0.1
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TaskDeckError};
use crate::logging::taskdeck_home;

/// Pane arrangement the viewer starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefaultLayout {
    Single,
    #[default]
    SplitHorizontal,
    SplitVertical,
}

impl DefaultLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefaultLayout::Single => "single",
            DefaultLayout::SplitHorizontal => "split-horizontal",
            DefaultLayout::SplitVertical => "split-vertical",
        }
    }
}

impl fmt::Display for DefaultLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DefaultLayout {
    type Err = TaskDeckError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single" => Ok(DefaultLayout::Single),
            "split-horizontal" => Ok(DefaultLayout::SplitHorizontal),
            "split-vertical" => Ok(DefaultLayout::SplitVertical),
            other => Err(TaskDeckError::ConfigValidation {
                message: format!(
                    "unknown layout {other:?} (expected single, split-horizontal or split-vertical)"
                ),
            }),
        }
    }
}

/// Fuzzy search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Idle time after the last keystroke before a query fires
    pub debounce_ms: u64,
    /// Minimum score a result needs, in `[0, 1]`
    pub threshold: f64,
    pub ignore_case: bool,
    pub ignore_whitespace: bool,
    /// Queries shorter than this (after normalization) return nothing
    pub min_match_length: usize,
    /// Maximum results shown
    pub result_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            threshold: 0.1,
            ignore_case: true,
            ignore_whitespace: false,
            min_match_length: 1,
            result_limit: 20,
        }
    }
}

/// Top-level viewer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Directory of task JSON files; `~/.taskdeck/tasks` when unset
    pub storage_dir: Option<PathBuf>,
    /// Tasks loaded per page on initial load and refresh
    pub page_size: usize,
    pub default_layout: DefaultLayout,
    pub search: SearchConfig,
    pub min_terminal_width: u16,
    pub min_terminal_height: u16,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            page_size: 100,
            default_layout: DefaultLayout::default(),
            search: SearchConfig::default(),
            min_terminal_width: 80,
            min_terminal_height: 24,
        }
    }
}

impl ViewerConfig {
    /// Default config path: `~/.taskdeck/config.yaml`.
    pub fn default_path() -> Result<PathBuf> {
        Ok(taskdeck_home()?.join("config.yaml"))
    }

    /// Load configuration.
    ///
    /// With an explicit `path` the file must exist. Without one, the default
    /// path is used if present and defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_yaml(path),
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::from_yaml(&path)
                } else {
                    debug!(path = %path.display(), "no config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TaskDeckError::ConfigNotFound {
                    path: path.to_path_buf(),
                    source: Some(e),
                }
            } else {
                TaskDeckError::io("reading config", path, e)
            }
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| TaskDeckError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(TaskDeckError::ConfigValidation {
                message: "page_size must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.search.threshold) {
            return Err(TaskDeckError::ConfigValidation {
                message: format!("search.threshold {} is outside [0, 1]", self.search.threshold),
            });
        }
        if self.search.result_limit == 0 {
            return Err(TaskDeckError::ConfigValidation {
                message: "search.result_limit must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Resolved storage directory.
    pub fn storage_dir(&self) -> Result<PathBuf> {
        match &self.storage_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(taskdeck_home()?.join("tasks")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_validate() {
        let config = ViewerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.debounce_ms, 300);
        assert_eq!(config.default_layout, DefaultLayout::SplitHorizontal);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "page_size: 25\ndefault_layout: single\nsearch:\n  debounce_ms: 150\n";
        let config: ViewerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.default_layout, DefaultLayout::Single);
        assert_eq!(config.search.debounce_ms, 150);
        assert!(config.search.ignore_case);
    }

    #[test]
    fn test_from_yaml_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = ViewerConfig::from_yaml(&tmp.path().join("nope.yaml")).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_from_yaml_invalid() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "page_size: [oops").unwrap();
        assert!(matches!(
            ViewerConfig::from_yaml(&path),
            Err(TaskDeckError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_bad_threshold() {
        let mut config = ViewerConfig::default();
        config.search.threshold = 1.5;
        assert!(config.validate().is_err());
        config.search.threshold = 0.5;
        config.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_layout_from_str() {
        assert_eq!("split-vertical".parse::<DefaultLayout>().unwrap(), DefaultLayout::SplitVertical);
        assert!("diagonal".parse::<DefaultLayout>().is_err());
    }
}
