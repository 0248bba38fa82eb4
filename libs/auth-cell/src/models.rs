use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::GatewayError;
use shared_session::StoreError;

/// Where the session lifecycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated { expires_at: DateTime<Utc> },
    Renewing,
}

/// Answer to the "extend your session?" prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalDecision {
    Extend,
    Decline,
    /// No answer. The session is left to expire on its own.
    Dismissed,
}

/// Failed-login bookkeeping persisted under `loginRateLimit`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRecord {
    pub attempts: u32,
    pub reset_time: Option<DateTime<Utc>>,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Too many login attempts. Please try again in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: i64 },

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Token was rejected by the service")]
    TokenRejected,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AuthError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn is_auth(&self) -> bool {
        match self {
            AuthError::InvalidCredentials | AuthError::NotAuthenticated | AuthError::TokenRejected => true,
            AuthError::Gateway(e) => e.is_auth(),
            _ => false,
        }
    }
}
