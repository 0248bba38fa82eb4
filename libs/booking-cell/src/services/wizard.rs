use std::sync::Arc;

use chrono::{Local, Months, NaiveDate};
use tracing::{debug, error, info, instrument, warn};

use resource_cell::{AppointmentService, CatalogService, Doctor, Hospital, MedicalService, SlotQuery};
use shared_gateway::ApiGateway;

use crate::error::BookingError;
use crate::models::{
    fields, AppointmentDraft, PatientDetails, ReviewSummary, SlotBoard, SubmissionState,
    WizardState, WizardStep,
};
use crate::services::availability::{build_board, fallback_board};
use crate::services::validation::{parse_age, parse_date, StepValidator};

pub const ANY_DOCTOR: &str = "Any Available Doctor";
const INTERRUPTED_SUBMISSION: &str = "Booking was interrupted before the service answered";
const BOOKING_HORIZON_MONTHS: u32 = 3;

/// Outcome of the initial catalog load. Each list loads independently.
#[derive(Debug)]
pub struct CatalogLoad {
    pub hospitals: Result<usize, BookingError>,
    pub services: Result<usize, BookingError>,
}

/// First and last bookable dates as seen on `today`.
pub fn booking_horizon(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let last = today
        .checked_add_months(Months::new(BOOKING_HORIZON_MONTHS))
        .unwrap_or(NaiveDate::MAX);
    (today, last)
}

/// Doctors eligible at `hospital_id`. Service listings must name the hospital
/// explicitly; hospital listings only drop doctors recorded elsewhere.
pub fn doctors_at_hospital(doctors: Vec<Doctor>, hospital_id: i64, require_hospital: bool) -> Vec<Doctor> {
    doctors
        .into_iter()
        .filter(|d| match d.hospital_id {
            Some(id) => id == hospital_id,
            None => !require_hospital,
        })
        .collect()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Holds the wizard in `Submitting` while a booking call is outstanding. If
/// the submit future is dropped first, the wizard becomes retryable again.
struct InFlight<'a> {
    state: &'a mut SubmissionState,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn begin(state: &'a mut SubmissionState) -> Self {
        *state = SubmissionState::Submitting;
        Self { state, finished: false }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Booking submission dropped before the service answered");
            *self.state = SubmissionState::Failed {
                message: INTERRUPTED_SUBMISSION.to_string(),
                requires_login: false,
            };
        }
    }
}

/// The four-step booking flow: hospital and service, date and slot, patient
/// details, review and submit.
pub struct BookingWizard {
    gateway: Arc<ApiGateway>,
    catalog: CatalogService,
    appointments: AppointmentService,
    validator: StepValidator,
    state: WizardState,
    hospitals: Vec<Hospital>,
    services: Vec<MedicalService>,
    doctors: Vec<Doctor>,
    slot_board: Option<SlotBoard>,
    draft: Option<AppointmentDraft>,
    submission: SubmissionState,
}

impl BookingWizard {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self {
            catalog: CatalogService::new(Arc::clone(&gateway)),
            appointments: AppointmentService::new(Arc::clone(&gateway)),
            gateway,
            validator: StepValidator::new(),
            state: WizardState::new(),
            hospitals: Vec::new(),
            services: Vec::new(),
            doctors: Vec::new(),
            slot_board: None,
            draft: None,
            submission: SubmissionState::Idle,
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn current_step(&self) -> WizardStep {
        self.state.current()
    }

    pub fn hospitals(&self) -> &[Hospital] {
        &self.hospitals
    }

    pub fn services(&self) -> &[MedicalService] {
        &self.services
    }

    pub fn doctors(&self) -> &[Doctor] {
        &self.doctors
    }

    pub fn slot_board(&self) -> Option<&SlotBoard> {
        self.slot_board.as_ref()
    }

    pub fn draft(&self) -> Option<&AppointmentDraft> {
        self.draft.as_ref()
    }

    pub fn submission(&self) -> &SubmissionState {
        &self.submission
    }

    /// Load hospitals and services concurrently.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> CatalogLoad {
        let (hospitals, services) = futures::join!(
            self.catalog.list_hospitals(),
            self.catalog.list_services()
        );

        let hospitals = match hospitals {
            Ok(list) => {
                self.hospitals = list;
                Ok(self.hospitals.len())
            }
            Err(e) => {
                warn!("Error loading hospitals: {}", e);
                Err(e.into())
            }
        };
        let services = match services {
            Ok(list) => {
                self.services = list;
                Ok(self.services.len())
            }
            Err(e) => {
                warn!("Error loading services: {}", e);
                Err(e.into())
            }
        };

        debug!("Catalog loaded: hospitals {:?}, services {:?}", hospitals, services);
        CatalogLoad { hospitals, services }
    }

    /// Write a form field. Changing a selection drops what depended on it:
    /// the slot board, the picked time and, for hospital or service, the
    /// doctor list until [`refresh_doctors`](Self::refresh_doctors) runs.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) -> Result<(), BookingError> {
        self.state.set_field(name, value)?;

        match name {
            fields::HOSPITAL | fields::SERVICE => {
                self.doctors.clear();
                self.clear_schedule();
            }
            fields::DOCTOR => self.clear_schedule(),
            fields::DATE => {
                self.slot_board = None;
                self.state.clear_field(fields::TIME);
            }
            _ => {}
        }

        if WizardStep::owning(name).is_some_and(|step| step < WizardStep::Review) {
            self.draft = None;
        }
        Ok(())
    }

    fn clear_schedule(&mut self) {
        self.slot_board = None;
        self.state.clear_field(fields::TIME);
    }

    fn set_selection(&mut self, name: &str, id: Option<i64>) -> Result<(), BookingError> {
        match id {
            Some(id) => self.set_field(name, id.to_string()),
            None => self.set_field(name, ""),
        }
    }

    pub async fn select_hospital(&mut self, hospital_id: Option<i64>) -> Result<&[Doctor], BookingError> {
        self.set_selection(fields::HOSPITAL, hospital_id)?;
        self.refresh_doctors().await
    }

    pub async fn select_service(&mut self, service_id: Option<i64>) -> Result<&[Doctor], BookingError> {
        self.set_selection(fields::SERVICE, service_id)?;
        self.refresh_doctors().await
    }

    /// `None` books with any available doctor.
    pub fn select_doctor(&mut self, doctor_id: Option<i64>) -> Result<(), BookingError> {
        if let Some(id) = doctor_id {
            if !self.doctors.iter().any(|d| d.id == id) {
                return Err(BookingError::validation(
                    fields::DOCTOR,
                    "This doctor is not available for the selected hospital and service",
                ));
            }
        }
        self.set_selection(fields::DOCTOR, doctor_id)
    }

    /// Re-resolve the doctors eligible for the current hospital and service.
    /// A selected doctor who is no longer eligible is cleared.
    pub async fn refresh_doctors(&mut self) -> Result<&[Doctor], BookingError> {
        let hospital = self.state.id_field(fields::HOSPITAL);
        let service = self.state.id_field(fields::SERVICE);

        let resolved = match (hospital, service) {
            (None, _) => Ok(Vec::new()),
            (Some(hospital_id), None) => self
                .catalog
                .hospital_doctors(hospital_id)
                .await
                .map(|list| doctors_at_hospital(list, hospital_id, false)),
            (Some(hospital_id), Some(service_id)) => self
                .catalog
                .service_doctors(service_id)
                .await
                .map(|list| doctors_at_hospital(list, hospital_id, true)),
        };

        let outcome = match resolved {
            Ok(list) => {
                self.doctors = list;
                Ok(())
            }
            Err(e) => {
                warn!("Error loading doctors: {}", e);
                self.doctors.clear();
                Err(BookingError::from(e))
            }
        };

        if let Some(doctor_id) = self.state.id_field(fields::DOCTOR) {
            if !self.doctors.iter().any(|d| d.id == doctor_id) {
                debug!("Doctor {} no longer eligible, clearing selection", doctor_id);
                self.set_field(fields::DOCTOR, "")?;
            }
        }

        outcome?;
        Ok(&self.doctors)
    }

    pub fn select_date(&mut self, date: NaiveDate) -> Result<(), BookingError> {
        let (first, last) = booking_horizon(today());
        if date < first {
            return Err(BookingError::validation(fields::DATE, "Please select a future date"));
        }
        if date > last {
            return Err(BookingError::validation(
                fields::DATE,
                "Appointments can be booked up to 3 months ahead",
            ));
        }
        self.set_field(fields::DATE, date.format("%Y-%m-%d").to_string())
    }

    /// Slot board for an explicit date, hospital, service and optional doctor.
    /// Never fails: a gateway error yields the degraded fallback board.
    pub async fn lookup_availability(&self, query: &SlotQuery) -> SlotBoard {
        let board = match self.appointments.available_slots(query).await {
            Ok(lookup) => build_board(lookup.slots.unavailable_times(), lookup.provenance, false),
            Err(e) => {
                warn!("Error fetching available slots, using default availability: {}", e);
                fallback_board()
            }
        };
        debug!(
            "{} of {} slots available on {}",
            board.available().count(),
            board.slots.len(),
            query.date
        );
        board
    }

    /// Fetch availability for the chosen date, hospital, service and doctor.
    /// Any gateway failure degrades to the fallback board; only missing
    /// selections are reported as errors.
    #[instrument(skip(self))]
    pub async fn resolve_availability(&mut self) -> Result<&SlotBoard, BookingError> {
        let missing = "Select a hospital, a service and a date first";
        let hospital_id = self
            .state
            .id_field(fields::HOSPITAL)
            .ok_or_else(|| BookingError::validation(fields::HOSPITAL, missing))?;
        let service_id = self
            .state
            .id_field(fields::SERVICE)
            .ok_or_else(|| BookingError::validation(fields::SERVICE, missing))?;
        let date = self
            .state
            .field(fields::DATE)
            .ok_or_else(|| BookingError::validation(fields::DATE, missing))
            .and_then(parse_date)?;

        let query = SlotQuery {
            date,
            hospital_id,
            service_id,
            doctor_id: self.state.id_field(fields::DOCTOR),
        };

        let board = self.lookup_availability(&query).await;

        let stale_time = self
            .state
            .field(fields::TIME)
            .is_some_and(|time| !board.find(time).is_some_and(|slot| slot.available));
        if stale_time {
            debug!("Previously picked time is no longer available");
            self.state.clear_field(fields::TIME);
        }

        Ok(&*self.slot_board.insert(board))
    }

    pub fn select_slot(&mut self, time: &str) -> Result<(), BookingError> {
        let board = self.slot_board.as_ref().ok_or_else(|| {
            BookingError::validation(fields::TIME, "Check availability before picking a time")
        })?;

        let slot = match board.find(time) {
            Some(slot) if slot.available => slot.time.clone(),
            Some(_) => {
                return Err(BookingError::validation(fields::TIME, "This time slot is not available"))
            }
            None => return Err(BookingError::validation(fields::TIME, "Not a bookable time slot")),
        };
        self.set_field(fields::TIME, slot)
    }

    pub fn accept_terms(&mut self, accepted: bool) -> Result<(), BookingError> {
        self.set_field(fields::TERMS, accepted.to_string())
    }

    /// Move forward if the current step validates. Entering the review step
    /// assembles the draft. At the review step the cursor stays put, and a
    /// draft dropped by an edit made there is assembled again.
    pub fn advance(&mut self) -> Result<WizardStep, BookingError> {
        let current = self.state.current();
        if current == WizardStep::Review && self.draft.is_none() {
            self.rebuild_draft()?;
        }
        self.validator.validate_step(current, &self.state, today())?;
        self.state.mark_validated(current);

        let Some(next) = current.next() else {
            return Ok(current);
        };
        if next == WizardStep::Review {
            self.draft = Some(self.build_draft()?);
        }

        self.state.move_to(next);
        debug!("Wizard moved to step {}", next.index());
        Ok(next)
    }

    fn rebuild_draft(&mut self) -> Result<(), BookingError> {
        let today = today();
        for step in [WizardStep::HospitalService, WizardStep::DateTime, WizardStep::PatientDetails] {
            self.validator.validate_step(step, &self.state, today)?;
            self.state.mark_validated(step);
        }
        self.draft = Some(self.build_draft()?);
        debug!("Review draft rebuilt after an edit");
        Ok(())
    }

    /// Going back is always allowed.
    pub fn retreat(&mut self) -> WizardStep {
        if let Some(previous) = self.state.current().previous() {
            self.state.move_to(previous);
        }
        self.state.current()
    }

    fn build_draft(&self) -> Result<AppointmentDraft, BookingError> {
        let state = &self.state;
        let required = move |name: &'static str| {
            state
                .field(name)
                .ok_or_else(|| BookingError::validation(name, "is required"))
        };
        let id = move |name: &'static str| {
            state
                .id_field(name)
                .ok_or_else(|| BookingError::validation(name, "is required"))
        };

        let phone = self
            .validator
            .normalize_phone(required(fields::PATIENT_PHONE)?)
            .ok_or_else(|| {
                BookingError::validation(fields::PATIENT_PHONE, "Please enter a valid 10-digit phone number")
            })?;

        Ok(AppointmentDraft {
            hospital_id: id(fields::HOSPITAL)?,
            service_id: id(fields::SERVICE)?,
            doctor_id: self.state.id_field(fields::DOCTOR),
            date: parse_date(required(fields::DATE)?)?,
            time: required(fields::TIME)?.to_string(),
            patient: PatientDetails {
                name: required(fields::PATIENT_NAME)?.to_string(),
                age: parse_age(required(fields::PATIENT_AGE)?)?,
                gender: required(fields::PATIENT_GENDER)?.to_string(),
                phone,
                email: required(fields::PATIENT_EMAIL)?.to_string(),
            },
            symptoms: state.field(fields::SYMPTOMS).unwrap_or_default().to_string(),
        })
    }

    /// Display names for the review step. Names missing from the loaded
    /// catalog are fetched individually.
    pub async fn review_summary(&self) -> Result<ReviewSummary, BookingError> {
        let draft = self.draft.as_ref().ok_or(BookingError::NotAtReview)?;

        let hospital = match self.hospitals.iter().find(|h| h.id == draft.hospital_id) {
            Some(hospital) => hospital.name.clone(),
            None => match self.catalog.get_hospital(draft.hospital_id).await {
                Ok(hospital) => hospital.name,
                Err(e) => {
                    warn!("Could not resolve hospital {}: {}", draft.hospital_id, e);
                    format!("Hospital #{}", draft.hospital_id)
                }
            },
        };
        let service = match self.services.iter().find(|s| s.id == draft.service_id) {
            Some(service) => service.name.clone(),
            None => match self.catalog.get_service(draft.service_id).await {
                Ok(service) => service.name,
                Err(e) => {
                    warn!("Could not resolve service {}: {}", draft.service_id, e);
                    format!("Service #{}", draft.service_id)
                }
            },
        };
        let doctor = match draft.doctor_id {
            None => ANY_DOCTOR.to_string(),
            Some(id) => self
                .doctors
                .iter()
                .find(|d| d.id == id)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| format!("Doctor #{}", id)),
        };

        Ok(ReviewSummary {
            hospital,
            service,
            doctor,
            date: draft.date.format("%B %-d, %Y").to_string(),
            time: draft.time.clone(),
            patient_name: draft.patient.name.clone(),
            patient_age: draft.patient.age,
            patient_gender: draft.patient.gender.clone(),
            patient_phone: draft.patient.phone.clone(),
            patient_email: draft.patient.email.clone(),
            symptoms: draft.symptoms.clone(),
        })
    }

    /// Submit the reviewed booking. Every step is re-validated first, and a
    /// missing credential fails before any network call. The draft survives
    /// a failure so the user can retry.
    #[instrument(skip(self))]
    pub async fn submit(&mut self) -> Result<String, BookingError> {
        match &self.submission {
            SubmissionState::Submitting => return Err(BookingError::SubmissionInProgress),
            SubmissionState::Confirmed { appointment_id } => {
                return Err(BookingError::AlreadyConfirmed(appointment_id.clone()))
            }
            SubmissionState::Idle | SubmissionState::Failed { .. } => {}
        }
        if self.state.current() != WizardStep::Review {
            return Err(BookingError::NotAtReview);
        }

        let today = today();
        for step in WizardStep::ALL {
            self.validator.validate_step(step, &self.state, today)?;
        }
        let draft = self.build_draft()?;
        let request = draft.to_request()?;
        self.draft = Some(draft);

        if self.gateway.session().bearer_token().is_none() {
            warn!("Booking attempted without a session");
            return Err(self.fail(BookingError::AuthenticationRequired));
        }

        let outcome = {
            let in_flight = InFlight::begin(&mut self.submission);
            let outcome = self.appointments.create(&request).await;
            in_flight.finish();
            outcome
        };

        match outcome {
            Ok(response) => {
                info!("Booking confirmed as {}", response.appointment_id);
                self.state.mark_validated(WizardStep::Review);
                self.submission = SubmissionState::Confirmed {
                    appointment_id: response.appointment_id.clone(),
                };
                Ok(response.appointment_id)
            }
            Err(e) => {
                error!("Error booking appointment: {}", e);
                Err(self.fail(e.into()))
            }
        }
    }

    fn fail(&mut self, err: BookingError) -> BookingError {
        self.submission = SubmissionState::Failed {
            message: err.to_string(),
            requires_login: err.requires_login(),
        };
        err
    }

    /// Discard the booking in progress. Loaded hospitals and services are kept.
    pub fn reset(&mut self) {
        self.state = WizardState::new();
        self.doctors.clear();
        self.slot_board = None;
        self.draft = None;
        self.submission = SubmissionState::Idle;
        debug!("Wizard reset");
    }
}
