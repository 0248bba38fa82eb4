use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::UserProfile;

pub struct TestConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub mock_api: bool,
    pub offline_fallback: bool,
    pub token_refresh_threshold_secs: i64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api".to_string(),
            request_timeout_secs: 10,
            mock_api: false,
            offline_fallback: false,
            token_refresh_threshold_secs: 300,
        }
    }
}

impl TestConfig {
    /// Config pointed at a wiremock server.
    pub fn for_server(uri: &str) -> Self {
        Self {
            api_base_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            api_base_url: self.api_base_url.clone(),
            request_timeout_secs: self.request_timeout_secs,
            mock_api: self.mock_api,
            offline_fallback: self.offline_fallback,
            token_refresh_threshold_secs: self.token_refresh_threshold_secs,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub gender: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            phone: "9876543210".to_string(),
            gender: "male".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            ..Self::default()
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new("Test Patient", email)
    }

    pub fn to_profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            phone: Some(self.phone.clone()),
            gender: Some(self.gender.clone()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
            "phone": self.phone,
            "gender": self.gender
        })
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockApiResponses;

impl MockApiResponses {
    pub fn login_response(user: &TestUser, token: &str, expires_in: Option<i64>) -> serde_json::Value {
        let mut body = json!({
            "access_token": token,
            "user": user.to_json()
        });
        if let Some(secs) = expires_in {
            body["expires_in"] = json!(secs);
        }
        body
    }

    pub fn refresh_response(token: &str, expires_in: i64) -> serde_json::Value {
        json!({
            "access_token": token,
            "expires_in": expires_in
        })
    }

    pub fn hospitals_response() -> serde_json::Value {
        json!([
            { "id": 1, "name": "Care Hospital", "address": "123 Health Avenue, Medical District, City" },
            { "id": 2, "name": "KIMS Hospital", "address": "456 Wellness Road, Healthcare Zone, City" }
        ])
    }

    pub fn services_response() -> serde_json::Value {
        json!([
            { "id": 1, "name": "Cardiology", "description": "Heart care services" },
            { "id": 2, "name": "Neurology", "description": "Brain and nervous system care" }
        ])
    }

    pub fn doctors_response() -> serde_json::Value {
        json!([
            { "id": 1, "name": "Dr. Rajesh Kumar", "hospital_id": 1, "specialization": "Cardiology" },
            { "id": 2, "name": "Dr. Priya Sharma", "hospital_id": 1, "specialization": "Neurology" },
            { "id": 5, "name": "Dr. Rahul Gupta", "hospital_id": 2, "specialization": "Hepatology" }
        ])
    }

    pub fn slots_response(unavailable: &[&str]) -> serde_json::Value {
        let unavailable: Vec<_> = unavailable.iter().map(|t| json!({ "time": t })).collect();
        json!({
            "available_slots": [],
            "unavailable_slots": unavailable
        })
    }

    pub fn appointment_response(id: &str, date: &str, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "hospital_id": 1,
            "service_id": 1,
            "doctor_id": null,
            "appointment_date": date,
            "appointment_time": "10:00",
            "status": status,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str) -> serde_json::Value {
        json!({
            "message": message
        })
    }
}
