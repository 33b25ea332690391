//! Framework options.
//!
//! Options are read once at startup and shared read-only afterwards.
//! Sources, in order of precedence (last wins):
//!
//! 1. built-in defaults,
//! 2. a TOML or JSON file ([`GirderOptions::load`]),
//! 3. `GIRDER_*` environment variables ([`GirderOptions::with_env_overrides`]).
//!
//! ```
//! use girder_core::GirderOptions;
//!
//! let options = GirderOptions::from_toml_str(
//!     r#"
//!     controller_suffix = "Endpoint"
//!     max_model_state_errors = 50
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(options.controller_suffix, "Endpoint");
//! assert_eq!(options.reserved_controller_names, vec!["Controller".to_string()]);
//! ```

use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Default cap on recorded model-state errors per request.
pub const DEFAULT_MAX_MODEL_STATE_ERRORS: usize = 200;

/// Default request body limit (30 MiB).
pub const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 30 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GirderOptions {
    /// Conventional suffix identifying controller types.
    pub controller_suffix: String,
    /// Type names that can never be controllers (compared case-insensitively).
    pub reserved_controller_names: Vec<String>,
    /// Maximum number of model-state errors recorded per request.
    pub max_model_state_errors: usize,
    /// Maximum request body size in bytes. 0 disables the limit.
    pub max_request_body_size: usize,
    /// Skip the bridge filters for controllers that are their own filters.
    pub suppress_implicit_controller_filters: bool,
}

impl Default for GirderOptions {
    fn default() -> Self {
        Self {
            controller_suffix: "Controller".to_string(),
            reserved_controller_names: vec!["Controller".to_string()],
            max_model_state_errors: DEFAULT_MAX_MODEL_STATE_ERRORS,
            max_request_body_size: DEFAULT_MAX_REQUEST_BODY_SIZE,
            suppress_implicit_controller_filters: false,
        }
    }
}

impl GirderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let options: Self = toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("TOML parse error: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(content)
            .map_err(|e| Error::Configuration(format!("JSON parse error: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a `.toml` or `.json` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::from_toml_str(&content),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&content),
            other => Err(Error::Configuration(format!(
                "unsupported options format: {:?}",
                other
            ))),
        }
    }

    /// Apply `GIRDER_CONTROLLER_SUFFIX`, `GIRDER_MAX_MODEL_ERRORS` and
    /// `GIRDER_MAX_BODY_SIZE` from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(suffix) = lookup("GIRDER_CONTROLLER_SUFFIX") {
            self.controller_suffix = suffix;
        }
        if let Some(value) = lookup("GIRDER_MAX_MODEL_ERRORS") {
            self.max_model_state_errors = parse_usize("GIRDER_MAX_MODEL_ERRORS", &value)?;
        }
        if let Some(value) = lookup("GIRDER_MAX_BODY_SIZE") {
            self.max_request_body_size = parse_usize("GIRDER_MAX_BODY_SIZE", &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.controller_suffix.trim().is_empty() {
            return Err(Error::Configuration(
                "controller_suffix must not be empty".to_string(),
            ));
        }
        if self.max_model_state_errors == 0 {
            return Err(Error::Configuration(
                "max_model_state_errors must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Builder-style setter for the controller suffix.
    pub fn controller_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.controller_suffix = suffix.into();
        self
    }

    pub fn max_model_state_errors(mut self, max: usize) -> Self {
        self.max_model_state_errors = max;
        self
    }

    pub fn max_request_body_size(mut self, bytes: usize) -> Self {
        self.max_request_body_size = bytes;
        self
    }

    pub fn suppress_implicit_controller_filters(mut self, suppress: bool) -> Self {
        self.suppress_implicit_controller_filters = suppress;
        self
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Configuration(format!("{} must be a number, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let options = GirderOptions::default();
        assert_eq!(options.controller_suffix, "Controller");
        assert_eq!(options.max_model_state_errors, 200);
        assert!(!options.suppress_implicit_controller_filters);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let options = GirderOptions::from_json_str(r#"{"max_request_body_size": 0}"#).unwrap();
        assert_eq!(options.max_request_body_size, 0);
        assert_eq!(options.controller_suffix, "Controller");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            GirderOptions::from_toml_str("controller_suffix = \"\""),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            GirderOptions::from_toml_str("max_model_state_errors = 0"),
            Err(Error::Configuration(_))
        ));
        assert!(GirderOptions::from_toml_str("max_model_state_errors = \"many\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("GIRDER_CONTROLLER_SUFFIX", "Handler"),
            ("GIRDER_MAX_MODEL_ERRORS", "10"),
        ]
        .into_iter()
        .collect();

        let options = GirderOptions::default()
            .with_overrides_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(options.controller_suffix, "Handler");
        assert_eq!(options.max_model_state_errors, 10);
        assert_eq!(options.max_request_body_size, DEFAULT_MAX_REQUEST_BODY_SIZE);
    }

    #[test]
    fn test_env_override_not_a_number() {
        let result = GirderOptions::default().with_overrides_from(|key| {
            (key == "GIRDER_MAX_BODY_SIZE").then(|| "big".to_string())
        });
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "reserved_controller_names = [\"Controller\", \"Base\"]").unwrap();

        let options = GirderOptions::load(file.path()).unwrap();
        assert_eq!(options.reserved_controller_names.len(), 2);

        let unknown = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(GirderOptions::load(unknown.path()).is_err());
    }
}
