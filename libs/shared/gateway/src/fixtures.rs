use std::sync::atomic::{AtomicU32, Ordering};

use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

/// Deterministic responses served in offline/mock mode and as the transport-failure fallback.
pub struct FixtureTable {
    next_appointment: AtomicU32,
}

impl Default for FixtureTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureTable {
    pub fn new() -> Self {
        Self {
            next_appointment: AtomicU32::new(1001),
        }
    }

    pub fn resolve(&self, endpoint: &str, method: &Method, body: Option<&Value>) -> Value {
        debug!("Fixture: {} {}", method, endpoint);

        let path = endpoint.split_once('?').map(|(p, _)| p).unwrap_or(endpoint);
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (method.as_str(), segments.as_slice()) {
            ("POST", ["login"]) => {
                let email = body
                    .and_then(|b| b.get("email"))
                    .cloned()
                    .unwrap_or(Value::Null);
                json!({
                    "access_token": "mock_token_12345",
                    "user": {
                        "id": 1,
                        "name": "Test User",
                        "email": email,
                        "phone": "9876543210",
                        "gender": "male"
                    }
                })
            }
            ("POST", ["register"]) => json!({ "message": "User registered successfully" }),
            ("GET", ["verify-token"]) => json!({ "valid": true }),
            ("POST", ["refresh-token"]) => json!({
                "access_token": "mock_token_refreshed",
                "expires_in": 3600
            }),
            ("GET", ["profile"]) => mock_profile(),
            ("PUT", ["profile"]) => {
                let mut profile = mock_profile();
                if let (Some(target), Some(Value::Object(update))) = (profile.as_object_mut(), body) {
                    for (key, value) in update {
                        target.insert(key.clone(), value.clone());
                    }
                }
                profile
            }
            ("GET", ["hospitals"]) => Value::Array(hospitals()),
            ("GET", ["hospitals", id]) => find_by_id(hospitals(), id)
                .unwrap_or_else(|| json!({ "message": "Hospital not found" })),
            ("GET", ["hospitals", id, "doctors"]) => {
                let hospital_id = parse_id(id);
                Value::Array(
                    doctors()
                        .into_iter()
                        .filter(|d| d["hospital_id"].as_i64() == hospital_id)
                        .collect(),
                )
            }
            ("GET", ["services"]) => Value::Array(services()),
            ("GET", ["services", id]) => find_by_id(services(), id)
                .unwrap_or_else(|| json!({ "message": "Service not found" })),
            ("GET", ["services", id, "doctors"]) => {
                let eligible: &[i64] = match parse_id(id) {
                    Some(1) => &[1, 2],
                    Some(2) => &[2, 5],
                    Some(3) => &[3, 4],
                    Some(4) => &[4],
                    Some(5) => &[5],
                    _ => &[],
                };
                Value::Array(
                    doctors()
                        .into_iter()
                        .filter(|d| d["id"].as_i64().is_some_and(|id| eligible.contains(&id)))
                        .collect(),
                )
            }
            ("POST", ["appointments"]) => {
                let seq = self.next_appointment.fetch_add(1, Ordering::SeqCst);
                json!({
                    "message": "Appointment booked successfully",
                    "appointment_id": format!("APT{}", seq)
                })
            }
            ("GET", ["appointments"]) => json!({ "appointments": appointments() }),
            ("GET", ["appointments", "available-slots"]) => available_slots(),
            ("GET", ["appointments", id]) => find_by_id(appointments(), id)
                .unwrap_or_else(|| json!({ "message": "Appointment not found" })),
            ("PUT", ["appointments", id, "cancel"]) => json!({
                "message": "Appointment cancelled successfully",
                "appointment_id": id,
                "status": "cancelled"
            }),
            _ => json!({ "message": "Mock API response" }),
        }
    }
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.parse().ok()
}

fn find_by_id(items: Vec<Value>, raw_id: &str) -> Option<Value> {
    items.into_iter().find(|item| match &item["id"] {
        Value::Number(n) => n.to_string() == raw_id,
        Value::String(s) => s == raw_id,
        _ => false,
    })
}

fn mock_profile() -> Value {
    json!({
        "id": 1,
        "name": "Test User",
        "email": "test@example.com",
        "phone": "9876543210",
        "gender": "male"
    })
}

fn hospitals() -> Vec<Value> {
    vec![
        json!({ "id": 1, "name": "Care Hospital", "address": "123 Health Avenue, Medical District, City" }),
        json!({ "id": 2, "name": "KIMS Hospital", "address": "456 Wellness Road, Healthcare Zone, City" }),
        json!({ "id": 3, "name": "Apollo Hospital", "address": "789 Medical Park, Healing Center, City" }),
        json!({ "id": 4, "name": "Sunshine Hospital", "address": "101 Recovery Street, Wellness District, City" }),
    ]
}

fn services() -> Vec<Value> {
    vec![
        json!({ "id": 1, "name": "Cardiology", "description": "Heart care services" }),
        json!({ "id": 2, "name": "Neurology", "description": "Brain and nervous system care" }),
        json!({ "id": 3, "name": "Nephrology", "description": "Kidney care services" }),
        json!({ "id": 4, "name": "Pulmonology", "description": "Lung care services" }),
        json!({ "id": 5, "name": "Hepatology", "description": "Liver care services" }),
    ]
}

fn doctors() -> Vec<Value> {
    vec![
        json!({ "id": 1, "name": "Dr. Rajesh Kumar", "hospital_id": 1, "specialization": "Cardiology" }),
        json!({ "id": 2, "name": "Dr. Priya Sharma", "hospital_id": 1, "specialization": "Neurology" }),
        json!({ "id": 3, "name": "Dr. Amit Patel", "hospital_id": 1, "specialization": "Nephrology" }),
        json!({ "id": 4, "name": "Dr. Sunita Verma", "hospital_id": 2, "specialization": "Pulmonology" }),
        json!({ "id": 5, "name": "Dr. Rahul Gupta", "hospital_id": 2, "specialization": "Hepatology" }),
    ]
}

fn appointments() -> Vec<Value> {
    vec![
        json!({
            "id": "APT1234",
            "hospital": "Care Hospital",
            "service": "Cardiology",
            "doctor": "Dr. Rajesh Kumar",
            "date": "2023-12-15",
            "time": "10:00 AM",
            "status": "confirmed"
        }),
        json!({
            "id": "APT5678",
            "hospital": "KIMS Hospital",
            "service": "Neurology",
            "doctor": "Dr. Priya Sharma",
            "date": "2023-12-20",
            "time": "11:30 AM",
            "status": "pending"
        }),
    ]
}

fn available_slots() -> Value {
    json!({
        "available_slots": [
            { "time": "09:30 AM" },
            { "time": "10:00 AM" },
            { "time": "10:30 AM" },
            { "time": "02:30 PM" },
            { "time": "03:00 PM" },
            { "time": "03:30 PM" },
            { "time": "04:00 PM" }
        ],
        "unavailable_slots": [
            { "time": "09:00 AM" },
            { "time": "11:00 AM" },
            { "time": "11:30 AM" },
            { "time": "02:00 PM" },
            { "time": "04:30 PM" }
        ]
    })
}
