use std::time::Duration;
use thiserror::Error;

/// Error domain used for failures reported by an OAuth 2.0 authorization server.
pub const OAUTH2_ERROR_DOMAIN: &str = "oauth2";

/// Main error type for the helper library
#[derive(Error, Debug)]
pub enum HelperError {
    /// Failure reported by the identity provider or the broker
    #[error("Authentication failed: {description} (domain: {domain}, code: {code})")]
    Authentication {
        domain: String,
        code: String,
        description: String,
    },

    /// A required input value was not supplied
    #[error("Missing '{name}' input")]
    MissingInput { name: String },

    /// An input value was supplied but cannot be used
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Timeout errors
    #[error("Timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// The event loop hosting the authentication flow could not run
    #[error("Run loop error: {message}")]
    RunLoop { message: String },

    /// A platform component the flow depends on is unavailable
    #[error("Platform error: {message}")]
    Platform { message: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HelperError {
    /// Create an authentication error
    pub fn authentication(
        domain: impl Into<String>,
        code: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::Authentication {
            domain: domain.into(),
            code: code.into(),
            description: description.into(),
        }
    }

    /// Create a missing input error
    pub fn missing_input(name: impl Into<String>) -> Self {
        Self::MissingInput { name: name.into() }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a timeout error
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Create a run loop error
    pub fn run_loop(message: impl Into<String>) -> Self {
        Self::RunLoop {
            message: message.into(),
        }
    }

    /// Create a platform error
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }

    /// Provider-specific error domain, if the error carries one
    pub fn domain(&self) -> Option<&str> {
        match self {
            Self::Authentication { domain, .. } => Some(domain),
            _ => None,
        }
    }

    /// Provider-specific error code, if the error carries one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Authentication { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Human-readable description suitable for reporting to the parent process
    pub fn description(&self) -> String {
        match self {
            Self::Authentication { description, .. } => description.clone(),
            other => other.to_string(),
        }
    }

    /// Whether the process has no way to recover from this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RunLoop { .. } | Self::Platform { .. })
    }
}

/// Convert from reqwest errors
impl From<reqwest::Error> for HelperError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HelperError::network_with_source("Request timed out", err)
        } else if err.is_connect() {
            HelperError::network_with_source("Connection failed", err)
        } else if err.is_decode() {
            HelperError::network_with_source("Failed to decode response", err)
        } else {
            HelperError::network_with_source("HTTP request failed", err)
        }
    }
}
