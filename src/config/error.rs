//! Configuration Error Types
//!
//! Specific, actionable error messages for configuration loading and validation.

use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A configuration source could not be read or merged
    #[error("Failed to load configuration for environment '{environment}': {error}")]
    LoadError { environment: String, error: String },

    /// Merged configuration does not match the expected structure
    #[error("Failed to deserialize configuration: {error}")]
    DeserializeError { error: String },

    /// Missing required configuration field
    #[error("Missing required configuration field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },
}

impl ConfigurationError {
    pub fn load_error(environment: impl Into<String>, error: impl ToString) -> Self {
        Self::LoadError {
            environment: environment.into(),
            error: error.to_string(),
        }
    }

    pub fn deserialize_error(error: impl ToString) -> Self {
        Self::DeserializeError {
            error: error.to_string(),
        }
    }

    pub fn missing_required_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
