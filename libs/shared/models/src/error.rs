use thiserror::Error;

/// Normalized failure of a call through the API gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Request timeout after {timeout_secs}s. Please try again.")]
    Timeout { timeout_secs: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Authentication expired, please log in again")]
    AuthExpired,

    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
}

impl GatewayError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        GatewayError::ValidationFailed {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True when the failure means the credential is gone or was rejected.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            GatewayError::AuthExpired | GatewayError::Server { status: 401, .. }
        )
    }

    /// Whether re-issuing the same call may succeed without changing its input.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Timeout { .. } | GatewayError::Network(_) => true,
            GatewayError::Server { status, .. } => *status >= 500 || *status == 429,
            GatewayError::InvalidResponse(_) => true,
            GatewayError::AuthExpired | GatewayError::ValidationFailed { .. } => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Server { status, .. } => Some(*status),
            GatewayError::AuthExpired => Some(401),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_classification() {
        assert!(GatewayError::AuthExpired.is_auth());
        assert!(GatewayError::Server { status: 401, message: "nope".into() }.is_auth());
        assert!(!GatewayError::Server { status: 403, message: "forbidden".into() }.is_auth());
        assert!(!GatewayError::Network("down".into()).is_auth());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(GatewayError::Timeout { timeout_secs: 10 }.is_retryable());
        assert!(GatewayError::Server { status: 503, message: "busy".into() }.is_retryable());
        assert!(!GatewayError::Server { status: 400, message: "bad".into() }.is_retryable());
        assert!(!GatewayError::validation("patientAge", "out of range").is_retryable());
    }

    #[test]
    fn test_display_messages() {
        let err = GatewayError::Server { status: 500, message: "Server error".into() };
        assert_eq!(err.to_string(), "Server error (500): Server error");
        assert_eq!(
            GatewayError::Timeout { timeout_secs: 10 }.to_string(),
            "Request timeout after 10s. Please try again."
        );
    }
}
