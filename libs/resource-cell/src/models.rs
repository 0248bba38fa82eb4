use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use shared_gateway::Provenance;
use shared_models::serde_helpers::{number_or_string, optional_number_or_string, string_or_number};
use shared_models::GatewayError;
use shared_utils::time_format::{parse_clock_time, to_display};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hospital {
    #[serde(deserialize_with = "number_or_string")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalService {
    #[serde(deserialize_with = "number_or_string")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    #[serde(deserialize_with = "number_or_string")]
    pub id: i64,
    pub name: String,
    #[serde(default, alias = "hospitalId", deserialize_with = "optional_number_or_string")]
    pub hospital_id: Option<i64>,
    #[serde(default)]
    pub specialization: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }
}

/// Server-confirmed appointment, normalized from either wire shape
/// (`date`/`time` or `appointment_date`/`appointment_time`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAppointment")]
pub struct Appointment {
    pub id: String,
    pub hospital_id: Option<i64>,
    pub service_id: Option<i64>,
    pub doctor_id: Option<i64>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub hospital_name: Option<String>,
    pub service_name: Option<String>,
    pub doctor_name: Option<String>,
}

impl Appointment {
    pub fn display_time(&self) -> String {
        to_display(self.time)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == AppointmentStatus::Cancelled
    }
}

#[derive(Debug, Deserialize)]
struct RawAppointment {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default, deserialize_with = "optional_number_or_string")]
    hospital_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_number_or_string")]
    service_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_number_or_string")]
    doctor_id: Option<i64>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    appointment_date: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    appointment_time: Option<String>,
    #[serde(default)]
    status: AppointmentStatus,
    #[serde(default)]
    hospital: Option<String>,
    #[serde(default)]
    service: Option<String>,
    #[serde(default)]
    doctor: Option<String>,
}

impl TryFrom<RawAppointment> for Appointment {
    type Error = GatewayError;

    fn try_from(raw: RawAppointment) -> Result<Self, Self::Error> {
        let raw_date = raw
            .date
            .or(raw.appointment_date)
            .ok_or_else(|| GatewayError::InvalidResponse(format!("appointment {} has no date", raw.id)))?;
        let raw_time = raw
            .time
            .or(raw.appointment_time)
            .ok_or_else(|| GatewayError::InvalidResponse(format!("appointment {} has no time", raw.id)))?;

        // Timestamps are cut to their date part.
        let date_part = raw_date.get(..10).unwrap_or(&raw_date);
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| {
            GatewayError::InvalidResponse(format!("unrecognized appointment date '{}'", raw_date))
        })?;
        let time = parse_clock_time(&raw_time).ok_or_else(|| {
            GatewayError::InvalidResponse(format!("unrecognized appointment time '{}'", raw_time))
        })?;

        Ok(Self {
            id: raw.id,
            hospital_id: raw.hospital_id,
            service_id: raw.service_id,
            doctor_id: raw.doctor_id,
            date,
            time,
            status: raw.status,
            hospital_name: raw.hospital,
            service_name: raw.service,
            doctor_name: raw.doctor,
        })
    }
}

/// Body of `POST /appointments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub hospital_id: i64,
    pub service_id: i64,
    pub doctor_id: Option<i64>,
    pub appointment_date: NaiveDate,
    /// 24-hour `HH:MM`.
    pub appointment_time: String,
    pub patient_name: String,
    pub patient_age: u8,
    pub patient_gender: String,
    pub patient_phone: String,
    pub patient_email: String,
    pub symptoms: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentResponse {
    #[serde(alias = "id", deserialize_with = "string_or_number")]
    pub appointment_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTime {
    pub time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableSlotsResponse {
    #[serde(default)]
    pub available_slots: Vec<SlotTime>,
    #[serde(default)]
    pub unavailable_slots: Vec<SlotTime>,
}

impl AvailableSlotsResponse {
    pub fn unavailable_times(&self) -> Vec<&str> {
        self.unavailable_slots.iter().map(|s| s.time.as_str()).collect()
    }
}

/// Slot availability together with where it came from.
#[derive(Debug, Clone)]
pub struct SlotLookup {
    pub slots: AvailableSlotsResponse,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotQuery {
    pub date: NaiveDate,
    pub hospital_id: i64,
    pub service_id: i64,
    pub doctor_id: Option<i64>,
}

impl SlotQuery {
    pub fn to_query_string(&self) -> String {
        let mut query = format!(
            "date={}&hospital={}&service={}",
            self.date.format("%Y-%m-%d"),
            self.hospital_id,
            self.service_id
        );
        if let Some(doctor_id) = self.doctor_id {
            query.push_str(&format!("&doctor={}", doctor_id));
        }
        query
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppointmentFilter {
    #[default]
    All,
    Upcoming,
    Past,
    Cancelled,
}

impl AppointmentFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "all" => Some(AppointmentFilter::All),
            "upcoming" => Some(AppointmentFilter::Upcoming),
            "past" => Some(AppointmentFilter::Past),
            "cancelled" | "canceled" => Some(AppointmentFilter::Cancelled),
            _ => None,
        }
    }
}
