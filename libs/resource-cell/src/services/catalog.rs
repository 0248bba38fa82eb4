use std::sync::Arc;

use tracing::debug;

use shared_gateway::ApiGateway;
use shared_models::GatewayError;

use crate::models::{Doctor, Hospital, MedicalService};

/// Read-only reference data: hospitals, services and doctors.
pub struct CatalogService {
    gateway: Arc<ApiGateway>,
}

impl CatalogService {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self { gateway }
    }

    pub async fn list_hospitals(&self) -> Result<Vec<Hospital>, GatewayError> {
        debug!("Fetching hospital list");
        self.gateway.get("/hospitals").await
    }

    pub async fn get_hospital(&self, hospital_id: i64) -> Result<Hospital, GatewayError> {
        debug!("Fetching hospital {}", hospital_id);
        self.gateway.get(&format!("/hospitals/{}", hospital_id)).await
    }

    pub async fn hospital_doctors(&self, hospital_id: i64) -> Result<Vec<Doctor>, GatewayError> {
        debug!("Fetching doctors at hospital {}", hospital_id);
        self.gateway
            .get(&format!("/hospitals/{}/doctors", hospital_id))
            .await
    }

    pub async fn list_services(&self) -> Result<Vec<MedicalService>, GatewayError> {
        debug!("Fetching service list");
        self.gateway.get("/services").await
    }

    pub async fn get_service(&self, service_id: i64) -> Result<MedicalService, GatewayError> {
        debug!("Fetching service {}", service_id);
        self.gateway.get(&format!("/services/{}", service_id)).await
    }

    pub async fn service_doctors(&self, service_id: i64) -> Result<Vec<Doctor>, GatewayError> {
        debug!("Fetching doctors for service {}", service_id);
        self.gateway
            .get(&format!("/services/{}/doctors", service_id))
            .await
    }
}
