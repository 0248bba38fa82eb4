use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use shared_gateway::{ApiGateway, Method};
use shared_models::GatewayError;

use crate::models::{
    Appointment, AppointmentFilter, AvailableSlotsResponse, CreateAppointmentRequest,
    CreateAppointmentResponse, SlotLookup, SlotQuery,
};

#[derive(Deserialize)]
#[serde(untagged)]
enum AppointmentList {
    Bare(Vec<Appointment>),
    Wrapped { appointments: Vec<Appointment> },
}

impl From<AppointmentList> for Vec<Appointment> {
    fn from(list: AppointmentList) -> Self {
        match list {
            AppointmentList::Bare(items) => items,
            AppointmentList::Wrapped { appointments } => appointments,
        }
    }
}

/// Appointments of the signed-in user plus slot availability.
pub struct AppointmentService {
    gateway: Arc<ApiGateway>,
}

impl AppointmentService {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self { gateway }
    }

    pub async fn create(
        &self,
        request: &CreateAppointmentRequest,
    ) -> Result<CreateAppointmentResponse, GatewayError> {
        debug!(
            "Creating appointment at hospital {} for service {} on {}",
            request.hospital_id, request.service_id, request.appointment_date
        );

        let body = serde_json::to_value(request)?;
        let response = self
            .gateway
            .request("/appointments", Method::POST, Some(body))
            .await?;

        // A fixture confirmation outside mock mode means nothing was booked.
        if response.is_fixture() && !self.gateway.is_mock_mode() {
            warn!("Booking answered from fixtures while offline, not confirming");
            return Err(GatewayError::Network(
                "booking service unreachable, appointment was not created".to_string(),
            ));
        }

        let response: CreateAppointmentResponse = response.decode()?;
        info!("Appointment {} created", response.appointment_id);
        Ok(response)
    }

    pub async fn list_mine(&self) -> Result<Vec<Appointment>, GatewayError> {
        debug!("Fetching appointments for current user");
        let list: AppointmentList = self.gateway.get("/appointments").await?;
        Ok(list.into())
    }

    pub async fn get(&self, appointment_id: &str) -> Result<Appointment, GatewayError> {
        debug!("Fetching appointment {}", appointment_id);
        self.gateway
            .get(&format!("/appointments/{}", appointment_id))
            .await
    }

    /// Returns the server's confirmation message, if it sent one.
    pub async fn cancel(&self, appointment_id: &str) -> Result<Option<String>, GatewayError> {
        info!("Cancelling appointment {}", appointment_id);
        let response = self
            .gateway
            .request(
                &format!("/appointments/{}/cancel", appointment_id),
                Method::PUT,
                None,
            )
            .await?;

        Ok(response
            .body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    pub async fn available_slots(&self, query: &SlotQuery) -> Result<SlotLookup, GatewayError> {
        let endpoint = format!("/appointments/available-slots?{}", query.to_query_string());
        debug!("Fetching slot availability: {}", endpoint);

        let response = self.gateway.request(&endpoint, Method::GET, None).await?;
        let provenance = response.provenance;
        let slots: AvailableSlotsResponse = response.decode()?;

        Ok(SlotLookup { slots, provenance })
    }
}

/// Dashboard view: keep the appointments matching `filter` relative to `today`,
/// newest date first.
pub fn filter_appointments(
    appointments: &[Appointment],
    filter: AppointmentFilter,
    today: NaiveDate,
) -> Vec<Appointment> {
    let mut selected: Vec<Appointment> = appointments
        .iter()
        .filter(|a| match filter {
            AppointmentFilter::All => true,
            AppointmentFilter::Upcoming => a.date >= today && !a.is_cancelled(),
            AppointmentFilter::Past => a.date < today && !a.is_cancelled(),
            AppointmentFilter::Cancelled => a.is_cancelled(),
        })
        .cloned()
        .collect();

    selected.sort_by(|a, b| b.date.cmp(&a.date).then(b.time.cmp(&a.time)));
    selected
}
