use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::serde_helpers::string_or_number;

/// Payload of a bearer token. Only the fields the client reads are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: Option<String>,
    pub exp: Option<i64>,
    pub iat: Option<i64>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

/// The authenticated user and the validity window of their credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

impl Session {
    /// A session without a token, or whose expiry has passed, is never valid.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && self.expires_at > now
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserProfile,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    #[serde(default = "default_valid")]
    pub valid: bool,
}

fn default_valid() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub gender: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_session_validity() {
        let now = Utc::now();
        let session = Session {
            token: "abc".to_string(),
            expires_at: now + Duration::minutes(5),
            user: UserProfile::default(),
        };
        assert!(session.is_valid_at(now));
        assert!(!session.is_valid_at(now + Duration::minutes(6)));

        let tokenless = Session { token: String::new(), ..session };
        assert!(!tokenless.is_valid_at(now));
    }

    #[test]
    fn test_login_response_accepts_numeric_user_id() {
        let response: LoginResponse = serde_json::from_value(json!({
            "access_token": "mock_token_12345",
            "user": {
                "id": 1,
                "name": "Test User",
                "email": "test@example.com",
                "phone": "9876543210",
                "gender": "male"
            }
        }))
        .unwrap();

        assert_eq!(response.user.id, "1");
        assert_eq!(response.expires_in, None);
    }

    #[test]
    fn test_verify_response_defaults_to_valid() {
        let response: VerifyResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.valid);
    }
}
