//! Shared provider types and errors.

use thiserror::Error;

/// Errors raised by an HTTP client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// Transport-level failure: connection, TLS, body read.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    ClientBuild(String),
}

/// Errors in a tile source descriptor.
///
/// These are configuration errors and are raised before any network call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("unknown tile provider '{0}'")]
    UnknownProvider(String),

    #[error("tile provider '{provider}' requires parameter '{param}'")]
    MissingParameter { provider: String, param: String },

    #[error("unresolved placeholder '{{{placeholder}}}' in URL template '{template}'")]
    UnresolvedPlaceholder {
        template: String,
        placeholder: String,
    },

    #[error("URL template '{template}' lacks the '{{{placeholder}}}' placeholder")]
    MissingCoordinate {
        template: String,
        placeholder: &'static str,
    },

    #[error("unbalanced braces in URL template '{0}'")]
    UnbalancedBraces(String),

    #[error("zoom {zoom} exceeds maximum {max_zoom} of tile source '{source_name}'")]
    UnsupportedZoom {
        source_name: String,
        zoom: u8,
        max_zoom: u8,
    },
}

/// Status and body of a completed HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Convenience constructor for a `200 OK` response.
    pub fn ok(body: Vec<u8>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_response_success_range() {
        assert!(HttpResponse::ok(vec![]).is_success());
        assert!(HttpResponse::new(204, vec![]).is_success());
        assert!(!HttpResponse::new(404, vec![]).is_success());
        assert!(!HttpResponse::new(500, vec![]).is_success());
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::UnresolvedPlaceholder {
            template: "https://a/{z}/{x}/{y}?k={key}".to_string(),
            placeholder: "key".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unresolved placeholder '{key}' in URL template 'https://a/{z}/{x}/{y}?k={key}'"
        );
    }
}
