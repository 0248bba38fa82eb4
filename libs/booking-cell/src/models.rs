use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use resource_cell::CreateAppointmentRequest;
use shared_gateway::Provenance;
use shared_utils::time_format::to_24_hour;

use crate::error::BookingError;

/// Names of the wizard's form fields.
pub mod fields {
    pub const HOSPITAL: &str = "hospital";
    pub const SERVICE: &str = "service";
    pub const DOCTOR: &str = "doctor";
    pub const DATE: &str = "appointmentDate";
    pub const TIME: &str = "appointmentTime";
    pub const PATIENT_NAME: &str = "patientName";
    pub const PATIENT_AGE: &str = "patientAge";
    pub const PATIENT_GENDER: &str = "patientGender";
    pub const PATIENT_PHONE: &str = "patientPhone";
    pub const PATIENT_EMAIL: &str = "patientEmail";
    pub const SYMPTOMS: &str = "symptoms";
    pub const TERMS: &str = "confirmTerms";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WizardStep {
    HospitalService = 1,
    DateTime = 2,
    PatientDetails = 3,
    Review = 4,
}

impl WizardStep {
    pub const ALL: [WizardStep; 4] = [
        WizardStep::HospitalService,
        WizardStep::DateTime,
        WizardStep::PatientDetails,
        WizardStep::Review,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn next(self) -> Option<Self> {
        match self {
            WizardStep::HospitalService => Some(WizardStep::DateTime),
            WizardStep::DateTime => Some(WizardStep::PatientDetails),
            WizardStep::PatientDetails => Some(WizardStep::Review),
            WizardStep::Review => None,
        }
    }

    pub fn previous(self) -> Option<Self> {
        match self {
            WizardStep::HospitalService => None,
            WizardStep::DateTime => Some(WizardStep::HospitalService),
            WizardStep::PatientDetails => Some(WizardStep::DateTime),
            WizardStep::Review => Some(WizardStep::PatientDetails),
        }
    }

    /// The step whose form owns `field`.
    pub fn owning(field: &str) -> Option<Self> {
        match field {
            fields::HOSPITAL | fields::SERVICE | fields::DOCTOR => Some(WizardStep::HospitalService),
            fields::DATE | fields::TIME => Some(WizardStep::DateTime),
            fields::PATIENT_NAME
            | fields::PATIENT_AGE
            | fields::PATIENT_GENDER
            | fields::PATIENT_PHONE
            | fields::PATIENT_EMAIL
            | fields::SYMPTOMS => Some(WizardStep::PatientDetails),
            fields::TERMS => Some(WizardStep::Review),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: WizardStep,
    pub fields: BTreeMap<String, String>,
    pub validated: bool,
}

impl StepRecord {
    fn new(step: WizardStep) -> Self {
        Self {
            step,
            fields: BTreeMap::new(),
            validated: false,
        }
    }
}

/// Field values of every step plus the cursor. Editing a step's field marks
/// that step unvalidated again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardState {
    steps: Vec<StepRecord>,
    current: WizardStep,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            steps: WizardStep::ALL.iter().map(|s| StepRecord::new(*s)).collect(),
            current: WizardStep::HospitalService,
        }
    }
}

impl WizardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> WizardStep {
        self.current
    }

    pub fn step(&self, step: WizardStep) -> &StepRecord {
        &self.steps[usize::from(step.index() - 1)]
    }

    fn step_mut(&mut self, step: WizardStep) -> &mut StepRecord {
        &mut self.steps[usize::from(step.index() - 1)]
    }

    /// The trimmed value of `name`, or None when unset or blank.
    pub fn field(&self, name: &str) -> Option<&str> {
        let step = WizardStep::owning(name)?;
        self.step(step)
            .fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn id_field(&self, name: &str) -> Option<i64> {
        self.field(name).and_then(|v| v.parse().ok())
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<String>) -> Result<(), BookingError> {
        let step = WizardStep::owning(name).ok_or_else(|| BookingError::UnknownField(name.to_string()))?;
        let record = self.step_mut(step);
        record.fields.insert(name.to_string(), value.into());
        record.validated = false;
        Ok(())
    }

    pub fn clear_field(&mut self, name: &str) {
        if let Some(step) = WizardStep::owning(name) {
            let record = self.step_mut(step);
            if record.fields.remove(name).is_some() {
                record.validated = false;
            }
        }
    }

    pub(crate) fn mark_validated(&mut self, step: WizardStep) {
        self.step_mut(step).validated = true;
    }

    pub(crate) fn move_to(&mut self, step: WizardStep) {
        self.current = step;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientDetails {
    pub name: String,
    pub age: u8,
    pub gender: String,
    /// Digits only.
    pub phone: String,
    pub email: String,
}

/// Everything a booking needs, assembled once the first three steps pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentDraft {
    pub hospital_id: i64,
    pub service_id: i64,
    pub doctor_id: Option<i64>,
    pub date: NaiveDate,
    /// As picked from the slot board, e.g. `"02:30 PM"`.
    pub time: String,
    pub patient: PatientDetails,
    pub symptoms: String,
}

impl AppointmentDraft {
    /// The submission body. The slot label is converted to 24-hour `HH:MM`.
    pub fn to_request(&self) -> Result<CreateAppointmentRequest, BookingError> {
        Ok(CreateAppointmentRequest {
            hospital_id: self.hospital_id,
            service_id: self.service_id,
            doctor_id: self.doctor_id,
            appointment_date: self.date,
            appointment_time: to_24_hour(&self.time)?,
            patient_name: self.patient.name.clone(),
            patient_age: self.patient.age,
            patient_gender: self.patient.gender.clone(),
            patient_phone: self.patient.phone.clone(),
            patient_email: self.patient.email.clone(),
            symptoms: self.symptoms.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub time: String,
    pub available: bool,
}

/// The fixed slot template marked against the service's unavailable list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotBoard {
    pub slots: Vec<Slot>,
    pub provenance: Provenance,
    /// True when availability could not be fetched and the fallback set was used.
    pub degraded: bool,
}

impl SlotBoard {
    pub fn available(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| s.available)
    }

    pub fn unavailable(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| !s.available)
    }

    pub fn find(&self, time: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.time == time.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting,
    Confirmed {
        appointment_id: String,
    },
    Failed {
        message: String,
        requires_login: bool,
    },
}

/// What the review step shows before submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewSummary {
    pub hospital: String,
    pub service: String,
    pub doctor: String,
    pub date: String,
    pub time: String,
    pub patient_name: String,
    pub patient_age: u8,
    pub patient_gender: String,
    pub patient_phone: String,
    pub patient_email: String,
    pub symptoms: String,
}
