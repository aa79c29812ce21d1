//! Capture configuration
//!
//! Every option has a default, so a TOML file only needs the keys it changes:
//!
//! ```toml
//! race_window_ms = 2500
//! large_response_kb = 1024
//! log_socket_messages = true
//! ```

use crate::error::{Result, SondaError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options recognized by a capture session
///
/// # Example
/// ```
/// use sonda::config::CaptureConfig;
///
/// let config = CaptureConfig::default();
/// assert_eq!(config.large_response_kb, 512);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Keep a text preview of response bodies
    pub capture_response_preview: bool,

    /// Maximum characters kept in a response preview
    pub preview_limit: usize,

    /// Maximum characters kept in a request body preview
    pub body_limit: usize,

    /// Log each persistent-connection message as its own entry
    pub log_socket_messages: bool,

    /// Attach the overlay tally on start
    pub overlay: bool,

    /// Race detection window in milliseconds
    pub race_window_ms: f64,

    /// Responses at or above this many kilobytes are tagged Memory
    pub large_response_kb: u64,

    /// Base for resolving relative request URLs
    pub base_url: Option<String>,

    /// Identifier that marks the interceptor's own stack frames
    pub own_marker: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_response_preview: true,
            preview_limit: 2000,
            body_limit: 4000,
            log_socket_messages: false,
            overlay: true,
            race_window_ms: 1000.0,
            large_response_kb: 512,
            base_url: None,
            own_marker: "sonda".to_string(),
        }
    }
}

impl CaptureConfig {
    /// No response previews and no overlay
    pub fn quiet() -> Self {
        Self {
            capture_response_preview: false,
            overlay: false,
            ..Self::default()
        }
    }

    /// Log every persistent-connection message as well
    pub fn verbose() -> Self {
        Self {
            log_socket_messages: true,
            ..Self::default()
        }
    }

    /// Parse a TOML document and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: CaptureConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.preview_limit == 0 {
            return Err(SondaError::Config(
                "preview_limit must be >= 1".to_string(),
            ));
        }

        if self.body_limit == 0 {
            return Err(SondaError::Config("body_limit must be >= 1".to_string()));
        }

        if !self.race_window_ms.is_finite() || self.race_window_ms < 0.0 {
            return Err(SondaError::Config(format!(
                "race_window_ms must be a finite value >= 0, got {}",
                self.race_window_ms
            )));
        }

        if self.large_response_kb == 0 {
            return Err(SondaError::Config(
                "large_response_kb must be >= 1".to_string(),
            ));
        }

        if let Some(base) = &self.base_url {
            url::Url::parse(base)
                .map_err(|e| SondaError::Config(format!("base_url '{}': {}", base, e)))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = CaptureConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.capture_response_preview);
        assert!(!config.log_socket_messages);
        assert_eq!(config.race_window_ms, 1000.0);
        assert_eq!(config.own_marker, "sonda");
    }

    #[test]
    fn test_presets() {
        assert!(!CaptureConfig::quiet().overlay);
        assert!(!CaptureConfig::quiet().capture_response_preview);
        assert!(CaptureConfig::verbose().log_socket_messages);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CaptureConfig::from_toml_str("race_window_ms = 2500.0\noverlay = false\n")
            .unwrap();
        assert_eq!(config.race_window_ms, 2500.0);
        assert!(!config.overlay);
        assert_eq!(config.body_limit, 4000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(CaptureConfig::from_toml_str("body_limit = 0").is_err());
        assert!(CaptureConfig::from_toml_str("preview_limit = 0").is_err());
        assert!(CaptureConfig::from_toml_str("race_window_ms = -1.0").is_err());
        assert!(CaptureConfig::from_toml_str("large_response_kb = 0").is_err());
        assert!(CaptureConfig::from_toml_str("base_url = \"not a url\"").is_err());
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = CaptureConfig::from_toml_str("overlay = maybe").unwrap_err();
        assert!(matches!(err, SondaError::Toml(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "large_response_kb = 64").unwrap();
        writeln!(file, "base_url = \"https://app.example/\"").unwrap();
        let config = CaptureConfig::from_file(file.path()).unwrap();
        assert_eq!(config.large_response_kb, 64);
        assert_eq!(config.base_url.as_deref(), Some("https://app.example/"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = CaptureConfig::from_file("/nonexistent/sonda.toml").unwrap_err();
        assert!(matches!(err, SondaError::Io(_)));
    }
}
