use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Scroll distance above which re-centering animates instead of snapping
    #[serde(default = "default_smooth_scroll_threshold")]
    pub smooth_scroll_threshold_px: f64,
    /// Line height assumed when no rendered line can be measured
    #[serde(default = "default_fallback_line_height")]
    pub fallback_line_height_px: f64,
}

const fn default_smooth_scroll_threshold() -> f64 {
    8.0
}

const fn default_fallback_line_height() -> f64 {
    24.0
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            smooth_scroll_threshold_px: default_smooth_scroll_threshold(),
            fallback_line_height_px: default_fallback_line_height(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Base URL that relative lyric paths are resolved against
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Ask caches not to store lyric responses
    #[serde(default = "default_true")]
    pub no_store: bool,
}

const fn default_timeout() -> u64 {
    10
}

const fn default_connect_timeout() -> u64 {
    5
}

fn default_user_agent() -> String {
    format!("lyrisync/{}", env!("CARGO_PKG_VERSION"))
}

const fn default_true() -> bool {
    true
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_agent: default_user_agent(),
            no_store: true,
        }
    }
}

impl Config {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or a value is out of range.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file supplied by the host
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| CoreError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Check value ranges that serde cannot express
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigInvalid`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.sync.smooth_scroll_threshold_px;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "sync.smooth_scroll_threshold_px must be a non-negative number, got {threshold}"
                ),
            });
        }

        let line_height = self.sync.fallback_line_height_px;
        if !line_height.is_finite() || line_height <= 0.0 {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "sync.fallback_line_height_px must be a positive number, got {line_height}"
                ),
            });
        }

        if self.fetch.timeout_secs == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "fetch.timeout_secs must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
