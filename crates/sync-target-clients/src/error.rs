//! Target client error types.

use serde_json::Value;
use thiserror::Error;

/// Outcome of a delivery attempt that did not succeed.
#[derive(Error, Debug, Clone)]
pub enum DeliveryError {
    /// Network error, timeout, 408/429 or 5xx. Retried with backoff.
    #[error("Transient delivery failure: {message}")]
    Transient {
        message: String,
        response: Option<Value>,
    },

    /// The target rejected the request (4xx). Never retried automatically.
    #[error("Rejected by target: {message}")]
    Permanent {
        message: String,
        response: Option<Value>,
    },
}

impl DeliveryError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            response: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
            response: None,
        }
    }

    /// Classify a non-2xx HTTP status.
    pub fn from_status(status: u16, response: Value) -> Self {
        let message = format!("HTTP {}", status);
        if is_retryable_status(status) {
            Self::Transient {
                message,
                response: Some(response),
            }
        } else {
            Self::Permanent {
                message,
                response: Some(response),
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Transient { message, .. } | Self::Permanent { message, .. } => message,
        }
    }

    /// Response recorded for the failed attempt, if the target answered.
    pub fn response(&self) -> Option<&Value> {
        match self {
            Self::Transient { response, .. } | Self::Permanent { response, .. } => {
                response.as_ref()
            }
        }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        // Transport failures never prove the target rejected the change
        Self::transient(err.to_string())
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

/// Errors building target clients.
#[derive(Error, Debug)]
pub enum TargetError {
    /// Invalid target configuration
    #[error("Configuration error: {0}")]
    Config(#[from] sync_config_and_utils::CoreError),

    /// HTTP client construction failed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias using TargetError.
pub type TargetResult<T> = Result<T, TargetError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn retryable_statuses_are_transient() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(
                DeliveryError::from_status(status, json!({})).is_transient(),
                "{} should be transient",
                status
            );
        }
    }

    #[test]
    fn client_errors_are_permanent() {
        for status in [400, 401, 403, 404, 409, 422] {
            let err = DeliveryError::from_status(status, json!({"error": "invalid"}));
            assert!(!err.is_transient(), "{} should be permanent", status);
            assert_eq!(err.response(), Some(&json!({"error": "invalid"})));
        }
    }

    #[test]
    fn message_includes_status() {
        let err = DeliveryError::from_status(503, json!(null));
        assert_eq!(err.message(), "HTTP 503");
        assert_eq!(err.to_string(), "Transient delivery failure: HTTP 503");
    }
}
