//! Validation Configuration
//!
//! Every CSS hook and attribute name the component reads or writes. Built once
//! at initialization and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Config must be a JSON object")]
    NotObject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationConfig {
    /// Field attribute holding the message shown when a required value is missing
    pub attribute_empty: String,
    /// Field attribute holding the message shown when a value breaks a constraint
    pub attribute_invalid: String,
    pub invalid_class: String,
    pub row_class: String,
    pub row_invalid_class: String,
    pub validation_summary_class: String,
    pub validation_summary_list_class: String,
    pub validation_summary_hidden_class: String,
    pub validation_summary_error_class: String,
    pub inline_error_class: String,
    /// Prepended to a field id to build its inline error anchor
    pub inline_error_prefix: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            attribute_empty: "data-dough-validation-empty".to_string(),
            attribute_invalid: "data-dough-validation-invalid".to_string(),
            invalid_class: "is-invalid".to_string(),
            row_class: "form__row".to_string(),
            row_invalid_class: "is-errored".to_string(),
            validation_summary_class: "validation-summary".to_string(),
            validation_summary_list_class: "js-validation-summary-list".to_string(),
            validation_summary_hidden_class: "validation-summary--hidden".to_string(),
            validation_summary_error_class: "validation-summary__error".to_string(),
            inline_error_class: "js-inline-error".to_string(),
            inline_error_prefix: "error-".to_string(),
        }
    }
}

impl ValidationConfig {
    /// Parse a (possibly partial) JSON object; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(Self::load_overrides(path)?)?)
    }

    /// Read a config file as the raw object it contains. Keys the file leaves
    /// out stay absent, so merging it never resets other layers to defaults.
    pub fn load_overrides(path: &Path) -> Result<serde_json::Value, ConfigError> {
        let content = fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        if !value.is_object() {
            return Err(ConfigError::NotObject);
        }
        Self::deserialize(&value)?;
        Ok(value)
    }

    /// Id of the inline error element for a field.
    pub fn anchor_id(&self, field_id: &str) -> String {
        format!("{}{}", self.inline_error_prefix, field_id)
    }
}
