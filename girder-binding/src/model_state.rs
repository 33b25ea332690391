//! Model state: the per-request map of binding and validation diagnostics,
//! keyed by model name.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Key under which the "too many errors" marker is recorded.
pub const TOO_MANY_ERRORS_KEY: &str = "";

/// Why an entry was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelErrorKind {
    /// No formatter could read the declared content type.
    UnsupportedMediaType,
    /// A formatter failed while reading the body.
    ReadFailure,
    /// A raw value could not be converted to the target type.
    ValueConversion,
    /// The error cap was reached; later errors were dropped.
    TooManyErrors,
    Custom,
}

/// A single diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelError {
    pub kind: ModelErrorKind,
    pub message: String,
}

impl ModelError {
    pub fn new(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelValidationState {
    #[default]
    Unvalidated,
    Invalid,
    Valid,
    Skipped,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelStateEntry {
    pub errors: Vec<ModelError>,
    pub validation_state: ModelValidationState,
    /// Raw value the binder tried to convert, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempted_value: Option<String>,
}

/// Ordered map of model-state entries with an error cap.
#[derive(Debug, Clone, Serialize)]
pub struct ModelStateDictionary {
    entries: BTreeMap<String, ModelStateEntry>,
    #[serde(skip)]
    max_allowed_errors: usize,
    #[serde(skip)]
    error_count: usize,
}

impl Default for ModelStateDictionary {
    fn default() -> Self {
        Self::with_max_errors(girder_core::options::DEFAULT_MAX_MODEL_STATE_ERRORS)
    }
}

impl ModelStateDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_errors(max_allowed_errors: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            max_allowed_errors,
            error_count: 0,
        }
    }

    pub fn max_allowed_errors(&self) -> usize {
        self.max_allowed_errors
    }

    /// Record an error under `key`.
    ///
    /// Returns `false` when the cap has been reached. The first rejected
    /// error leaves a single [`ModelErrorKind::TooManyErrors`] marker under
    /// [`TOO_MANY_ERRORS_KEY`]; the marker does not count toward the cap.
    pub fn add_model_error(&mut self, key: impl Into<String>, error: ModelError) -> bool {
        if self.has_reached_max_errors() {
            self.record_too_many_errors();
            return false;
        }

        let entry = self.entries.entry(key.into()).or_default();
        entry.errors.push(error);
        entry.validation_state = ModelValidationState::Invalid;
        self.error_count += 1;
        true
    }

    pub fn add_error(
        &mut self,
        key: impl Into<String>,
        kind: ModelErrorKind,
        message: impl Into<String>,
    ) -> bool {
        self.add_model_error(key, ModelError::new(kind, message))
    }

    /// Record the failure of a bind attempt for `key`.
    ///
    /// Unlike [`add_error`](Self::add_error), a key without errors always
    /// receives this one, even past the cap, so a failed bind stays
    /// distinguishable from a bind that produced no value. Once the key
    /// carries an error, further failures fall back to the capped path.
    pub fn add_binding_failure(
        &mut self,
        key: impl Into<String>,
        kind: ModelErrorKind,
        message: impl Into<String>,
    ) {
        let key = key.into();
        if !self.has_reached_max_errors() || !self.errors_for(&key).is_empty() {
            self.add_model_error(key, ModelError::new(kind, message));
            return;
        }

        self.record_too_many_errors();
        let entry = self.entries.entry(key).or_default();
        entry.errors.push(ModelError::new(kind, message));
        entry.validation_state = ModelValidationState::Invalid;
        self.error_count += 1;
    }

    fn record_too_many_errors(&mut self) {
        let entry = self
            .entries
            .entry(TOO_MANY_ERRORS_KEY.to_string())
            .or_default();
        if entry
            .errors
            .iter()
            .all(|e| e.kind != ModelErrorKind::TooManyErrors)
        {
            entry.errors.push(ModelError::new(
                ModelErrorKind::TooManyErrors,
                format!(
                    "The maximum number of allowed model errors ({}) has been reached.",
                    self.max_allowed_errors
                ),
            ));
            entry.validation_state = ModelValidationState::Invalid;
        }
    }

    pub fn has_reached_max_errors(&self) -> bool {
        self.error_count >= self.max_allowed_errors
    }

    /// Errors recorded under `key`; empty if none.
    pub fn errors_for(&self, key: &str) -> &[ModelError] {
        self.entries
            .get(key)
            .map(|entry| entry.errors.as_slice())
            .unwrap_or(&[])
    }

    pub fn get(&self, key: &str) -> Option<&ModelStateEntry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of counted errors (the cap marker excluded).
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// True when no entry carries an error.
    pub fn is_valid(&self) -> bool {
        self.entries.values().all(|entry| entry.errors.is_empty())
    }

    pub fn validation_state(&self, key: &str) -> ModelValidationState {
        self.entries
            .get(key)
            .map(|entry| entry.validation_state)
            .unwrap_or_default()
    }

    /// Mark `key` valid unless it already carries errors.
    pub fn mark_valid(&mut self, key: impl Into<String>) {
        let entry = self.entries.entry(key.into()).or_default();
        if entry.errors.is_empty() {
            entry.validation_state = ModelValidationState::Valid;
        }
    }

    pub fn mark_skipped(&mut self, key: impl Into<String>) {
        let entry = self.entries.entry(key.into()).or_default();
        if entry.errors.is_empty() {
            entry.validation_state = ModelValidationState::Skipped;
        }
    }

    pub fn set_attempted_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(key.into()).or_default().attempted_value = Some(value.into());
    }

    /// Copy every entry of `other` into `self`, honouring the error cap.
    pub fn merge(&mut self, other: &ModelStateDictionary) {
        for (key, entry) in &other.entries {
            if entry.errors.is_empty() {
                let target = self.entries.entry(key.clone()).or_default();
                if target.errors.is_empty() {
                    target.validation_state = entry.validation_state;
                }
                if target.attempted_value.is_none() {
                    target.attempted_value = entry.attempted_value.clone();
                }
                continue;
            }
            for error in &entry.errors {
                if error.kind == ModelErrorKind::TooManyErrors {
                    self.record_too_many_errors();
                } else {
                    self.add_model_error(key.clone(), error.clone());
                }
            }
        }
    }

    /// `{"errors": {"key": ["message", ...]}}` for keys that carry errors.
    pub fn to_json(&self) -> serde_json::Value {
        let errors: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.errors.is_empty())
            .map(|(key, entry)| {
                let messages = entry
                    .errors
                    .iter()
                    .map(|e| serde_json::Value::String(e.message.clone()))
                    .collect();
                (key.clone(), serde_json::Value::Array(messages))
            })
            .collect();
        serde_json::json!({ "errors": errors })
    }
}
