//! CLI error type.

use std::fmt;

use geomosaic::{AffineError, ConfigError, LoggingError, ServiceError};

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid argument combination or value
    Args(String),
    /// Configuration file problem
    Config(String),
    /// Logging setup failed
    Logging(LoggingError),
    /// Fetch, mosaic or vectorize failure
    Service(ServiceError),
    /// Interrupted with Ctrl+C
    Cancelled,
    /// Reading or writing a file failed
    Io { path: String, reason: String },
}

impl CliError {
    pub fn io(path: impl AsRef<std::path::Path>, reason: impl fmt::Display) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Args(_) => 2,
            Self::Cancelled => 130,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Args(msg) => write!(f, "Invalid arguments: {}", msg),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Logging(e) => write!(f, "Logging error: {}", e),
            Self::Service(e) => write!(f, "{}", e),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Io { path, reason } => write!(f, "{}: {}", path, reason),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Logging(e) => Some(e),
            Self::Service(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ServiceError> for CliError {
    fn from(e: ServiceError) -> Self {
        if e.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Service(e)
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<AffineError> for CliError {
    fn from(e: AffineError) -> Self {
        Self::Args(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        Self::Logging(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geomosaic::FetchError;

    #[test]
    fn test_cancelled_fetch_maps_to_cancelled() {
        let err: CliError = ServiceError::Fetch(FetchError::Cancelled).into();
        assert!(matches!(err, CliError::Cancelled));
        assert_eq!(err.exit_code(), 130);
    }

    #[test]
    fn test_affine_error_is_argument_error() {
        let err: CliError = AffineError::CoefficientCount(4).into();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("6 affine coefficients"));
    }
}
