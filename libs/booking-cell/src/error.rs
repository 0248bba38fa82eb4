use thiserror::Error;

use shared_models::GatewayError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    #[error("{reason}")]
    Validation { field: String, reason: String },

    #[error("You must be logged in to book an appointment")]
    AuthenticationRequired,

    #[error("A booking is already being submitted")]
    SubmissionInProgress,

    #[error("This booking was already confirmed as {0}")]
    AlreadyConfirmed(String),

    #[error("Review the booking before submitting it")]
    NotAtReview,

    #[error("Unknown booking field '{0}'")]
    UnknownField(String),

    #[error(transparent)]
    Gateway(GatewayError),
}

impl BookingError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BookingError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Failures the user can only fix by signing in again.
    pub fn requires_login(&self) -> bool {
        match self {
            BookingError::AuthenticationRequired => true,
            BookingError::Gateway(e) => e.is_auth(),
            _ => false,
        }
    }
}

impl From<GatewayError> for BookingError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::ValidationFailed { field, reason } => {
                BookingError::Validation { field, reason }
            }
            other => BookingError::Gateway(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_validation_becomes_booking_validation() {
        let err: BookingError = GatewayError::validation("appointmentTime", "bad").into();
        assert_eq!(err, BookingError::validation("appointmentTime", "bad"));
    }

    #[test]
    fn test_requires_login() {
        assert!(BookingError::AuthenticationRequired.requires_login());
        assert!(BookingError::Gateway(GatewayError::AuthExpired).requires_login());
        assert!(!BookingError::Gateway(GatewayError::Network("down".into())).requires_login());
        assert!(!BookingError::SubmissionInProgress.requires_login());
    }
}
