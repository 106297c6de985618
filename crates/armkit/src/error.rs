//! Error types for Azure Resource Manager operations.
//!
//! Errors are categorized so the CLI can give appropriate feedback. A
//! missing resource on a `get_*` call is not an error at all: those calls
//! return `Ok(None)` and only real failures surface here.

use serde::Deserialize;
use std::fmt;
use std::io;

/// Result type alias for ARM operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of ARM errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection, DNS or transport failure.
    Network,
    /// Resource does not exist where one was required.
    NotFound,
    /// Optimistic concurrency conflict (stale or missing etag).
    Conflict,
    /// Authentication or authorization failure.
    Auth,
    /// Credential could not be obtained.
    Credential,
    /// Response body was not what the API promised.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::NotFound => "Resource not found",
            Self::Conflict => "Resource was modified concurrently",
            Self::Auth => "Not authorized",
            Self::Credential => "No usable credential",
            Self::Format => "Unexpected response format",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your internet connection and try again",
            Self::NotFound => "Verify the resource name, resource group and workspace",
            Self::Conflict => "Re-run the deployment so the latest etag is fetched",
            Self::Auth => "Check that your account has Sentinel Contributor on the workspace",
            Self::Credential => "Run 'az login' or set AZURE_ACCESS_TOKEN",
            Self::Format => "The service returned an unexpected payload, try again",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to Azure Resource Manager.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A resource required by the operation does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Kind of resource (e.g. "workflow").
        kind: &'static str,
        /// Resource name.
        name: String,
    },

    /// The service rejected the write because the etag did not match.
    #[error("conflict ({status}): {message}")]
    Conflict {
        /// HTTP status code (409 or 412).
        status: u16,
        /// Service message.
        message: String,
    },

    /// The caller is not authenticated or not authorized.
    #[error("not authorized ({status}): {message}")]
    Unauthorized {
        /// HTTP status code (401 or 403).
        status: u16,
        /// Service message.
        message: String,
    },

    /// Any other non-success response from the service.
    #[error("ARM request failed ({status} {code}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// ARM error code, e.g. `BadRequest`.
        code: String,
        /// Service message.
        message: String,
    },

    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// No access token could be obtained.
    #[error("credential error: {0}")]
    Credential(String),

    /// The response body could not be decoded.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// IO error while running a credential helper.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// ARM error envelope: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl Error {
    /// Build an error from a non-success HTTP status and its response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => (envelope.error.code, envelope.error.message),
            Err(_) => (String::new(), body.trim().to_string()),
        };

        match status {
            401 | 403 => Self::Unauthorized { status, message },
            409 | 412 => Self::Conflict { status, message },
            _ => Self::Api {
                status,
                code,
                message,
            },
        }
    }

    /// Get the category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Unauthorized { .. } => ErrorCategory::Auth,
            Self::Api { status, .. } if *status == 404 => ErrorCategory::NotFound,
            Self::Api { status, .. } if *status >= 500 => ErrorCategory::Network,
            Self::Api { .. } => ErrorCategory::Other,
            Self::Network(_) => ErrorCategory::Network,
            Self::Credential(_) | Self::Io(_) => ErrorCategory::Credential,
            Self::InvalidResponse(_) => ErrorCategory::Format,
        }
    }

    /// Whether this error is typically transient.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::from_response(code, ""),
            other => Self::Network(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
