//! Error types and handling for the risk calculation engine

use thiserror::Error;

/// Main error type for a risk calculation run
///
/// Only the fatal categories of a run surface here. Per-zone data failures are
/// recovered inside the orchestrator and never become a `RiskError`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The municipality bounding box could not be determined
    #[error("Resolution error: {message}")]
    Resolution { message: String },

    /// The bounding box could not be partitioned into zones
    #[error("Partition error: {message}")]
    Partition { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// External service communication errors
    #[error("API error: {message}")]
    Api { message: String },

    /// The run was abandoned in favour of a newer request
    #[error("Calculation for {city_code} was superseded by a newer request")]
    Superseded { city_code: String },

    /// General application errors
    #[error("Application error: {message}")]
    General { message: String },
}

impl RiskError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new resolution error
    pub fn resolution<S: Into<String>>(message: S) -> Self {
        Self::Resolution {
            message: message.into(),
        }
    }

    /// Create a new partition error
    pub fn partition<S: Into<String>>(message: S) -> Self {
        Self::Partition {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a new supersession error
    pub fn superseded<S: Into<String>>(city_code: S) -> Self {
        Self::Superseded {
            city_code: city_code.into(),
        }
    }

    /// Create a new general error
    pub fn general<S: Into<String>>(message: S) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    /// Whether this error aborts a run before any zone could be scored
    #[must_use]
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            RiskError::Resolution { .. } | RiskError::Partition { .. } | RiskError::Validation { .. }
        )
    }

    /// Get a short user-facing error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            RiskError::Config { .. } => {
                "Configuration error. Please check your config file.".to_string()
            }
            RiskError::Resolution { message } => {
                format!("Could not locate the municipality: {message}. Please try again.")
            }
            RiskError::Partition { message } => {
                format!("Could not divide the municipality into zones: {message}. Please try again.")
            }
            RiskError::Validation { message } => format!("Invalid input: {message}"),
            RiskError::Api { .. } => {
                "Unable to reach the geodata services. Please check your internet connection."
                    .to_string()
            }
            RiskError::Superseded { .. } => {
                "This calculation was replaced by a newer request.".to_string()
            }
            RiskError::General { message } => message.clone(),
        }
    }
}
