use std::env;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Local};
use tracing::{info, warn};

use booking_cell::{fields, BookingWizard};
use resource_cell::{filter_appointments, AppointmentFilter, AppointmentService};
use shared_gateway::ApiGateway;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// The booking to make, read from `BOOKING_*` variables.
#[derive(Debug, Clone)]
pub struct BookingPlan {
    pub hospital_id: i64,
    pub service_id: i64,
    pub doctor_id: Option<i64>,
    pub days_ahead: i64,
    /// First free slot when unset.
    pub time: Option<String>,
    pub patient_name: String,
    pub patient_age: String,
    pub patient_gender: String,
    pub patient_phone: String,
    pub patient_email: String,
    pub symptoms: String,
}

impl BookingPlan {
    pub fn from_env() -> Self {
        Self {
            hospital_id: env_or("BOOKING_HOSPITAL_ID", 1),
            service_id: env_or("BOOKING_SERVICE_ID", 1),
            doctor_id: env::var("BOOKING_DOCTOR_ID").ok().and_then(|v| v.parse().ok()),
            days_ahead: env_or("BOOKING_DAYS_AHEAD", 3),
            time: env::var("BOOKING_TIME").ok().filter(|v| !v.trim().is_empty()),
            patient_name: env_string("BOOKING_PATIENT_NAME", "Test Patient"),
            patient_age: env_string("BOOKING_PATIENT_AGE", "32"),
            patient_gender: env_string("BOOKING_PATIENT_GENDER", "female"),
            patient_phone: env_string("BOOKING_PATIENT_PHONE", "9876543210"),
            patient_email: env_string("BOOKING_PATIENT_EMAIL", "patient@example.com"),
            symptoms: env_string("BOOKING_SYMPTOMS", "Routine check-up"),
        }
    }
}

/// Drive the wizard through all four steps and submit. Returns the appointment id.
pub async fn book(gateway: Arc<ApiGateway>, plan: BookingPlan) -> Result<String> {
    let mut wizard = BookingWizard::new(gateway);

    let load = wizard.start().await;
    if let Err(e) = &load.hospitals {
        warn!("Hospitals unavailable: {}", e);
    }
    if let Err(e) = &load.services {
        warn!("Services unavailable: {}", e);
    }

    // Step 1
    if let Err(e) = wizard.select_hospital(Some(plan.hospital_id)).await {
        warn!("Doctors for hospital {} unavailable: {}", plan.hospital_id, e);
    }
    match wizard.select_service(Some(plan.service_id)).await {
        Ok(doctors) => info!("{} doctors offer this service here", doctors.len()),
        Err(e) => warn!("Doctors for service {} unavailable: {}", plan.service_id, e),
    }
    if plan.doctor_id.is_some() {
        wizard.select_doctor(plan.doctor_id)?;
    }
    wizard.advance()?;

    // Step 2
    let date = Local::now().date_naive() + Duration::days(plan.days_ahead);
    wizard.select_date(date)?;
    let board = wizard.resolve_availability().await?;
    if board.degraded {
        warn!("Live availability unavailable, showing default slots");
    }
    let time = match plan.time {
        Some(time) => time,
        None => board
            .available()
            .next()
            .map(|slot| slot.time.clone())
            .with_context(|| format!("no free slots on {}", date))?,
    };
    wizard.select_slot(&time)?;
    wizard.advance()?;

    // Step 3
    wizard.set_field(fields::PATIENT_NAME, plan.patient_name)?;
    wizard.set_field(fields::PATIENT_AGE, plan.patient_age)?;
    wizard.set_field(fields::PATIENT_GENDER, plan.patient_gender)?;
    wizard.set_field(fields::PATIENT_PHONE, plan.patient_phone)?;
    wizard.set_field(fields::PATIENT_EMAIL, plan.patient_email)?;
    wizard.set_field(fields::SYMPTOMS, plan.symptoms)?;
    wizard.advance()?;

    // Step 4
    let summary = wizard.review_summary().await?;
    info!(
        "Booking {} at {} with {} on {} at {} for {}",
        summary.service, summary.hospital, summary.doctor, summary.date, summary.time, summary.patient_name
    );
    wizard.accept_terms(true)?;

    let appointment_id = wizard.submit().await?;
    info!("Appointment booked, reference {}", appointment_id);
    Ok(appointment_id)
}

pub async fn list_upcoming(gateway: Arc<ApiGateway>) -> Result<()> {
    let appointments = AppointmentService::new(gateway).list_mine().await?;
    let upcoming = filter_appointments(
        &appointments,
        AppointmentFilter::Upcoming,
        Local::now().date_naive(),
    );

    info!("{} upcoming appointments", upcoming.len());
    for appointment in upcoming {
        info!(
            "{} {} {} [{}] {}",
            appointment.id,
            appointment.date,
            appointment.display_time(),
            appointment.status.as_str(),
            appointment.service_name.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
