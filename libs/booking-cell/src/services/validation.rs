use chrono::NaiveDate;

use shared_utils::time_format::parse_clock_time;
use shared_utils::validation::InputValidator;

use crate::error::BookingError;
use crate::models::{fields, WizardState, WizardStep};

pub const MIN_PATIENT_AGE: i64 = 1;
pub const MAX_PATIENT_AGE: i64 = 120;

/// Per-step gate of the booking wizard. Each check reports the first
/// violated constraint only.
pub struct StepValidator {
    inputs: InputValidator,
}

impl Default for StepValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl StepValidator {
    pub fn new() -> Self {
        Self {
            inputs: InputValidator::new(),
        }
    }

    pub fn validate_step(
        &self,
        step: WizardStep,
        state: &WizardState,
        today: NaiveDate,
    ) -> Result<(), BookingError> {
        match step {
            WizardStep::HospitalService => self.hospital_service(state),
            WizardStep::DateTime => self.date_time(state, today),
            WizardStep::PatientDetails => self.patient_details(state),
            WizardStep::Review => self.review(state),
        }
    }

    fn hospital_service(&self, state: &WizardState) -> Result<(), BookingError> {
        let message = "Please select both hospital and service";
        for field in [fields::HOSPITAL, fields::SERVICE] {
            if state.id_field(field).is_none() {
                return Err(BookingError::validation(field, message));
            }
        }
        Ok(())
    }

    fn date_time(&self, state: &WizardState, today: NaiveDate) -> Result<(), BookingError> {
        let message = "Please select both date and time";
        let date = state
            .field(fields::DATE)
            .ok_or_else(|| BookingError::validation(fields::DATE, message))?;
        let time = state
            .field(fields::TIME)
            .ok_or_else(|| BookingError::validation(fields::TIME, message))?;

        let date = parse_date(date)?;
        if date < today {
            return Err(BookingError::validation(fields::DATE, "Please select a future date"));
        }
        if parse_clock_time(time).is_none() {
            return Err(BookingError::validation(fields::TIME, message));
        }
        Ok(())
    }

    fn patient_details(&self, state: &WizardState) -> Result<(), BookingError> {
        let required = [
            fields::PATIENT_NAME,
            fields::PATIENT_AGE,
            fields::PATIENT_GENDER,
            fields::PATIENT_PHONE,
            fields::PATIENT_EMAIL,
        ];
        let mut values = [""; 5];
        for (slot, field) in values.iter_mut().zip(required) {
            *slot = state.field(field).ok_or_else(|| {
                BookingError::validation(field, "Please fill in all required patient details")
            })?;
        }
        let [_, age, _, phone, email] = values;

        if !self.inputs.validate_email(email) {
            return Err(BookingError::validation(
                fields::PATIENT_EMAIL,
                "Please enter a valid email address",
            ));
        }
        if self.inputs.normalize_phone(phone).is_none() {
            return Err(BookingError::validation(
                fields::PATIENT_PHONE,
                "Please enter a valid 10-digit phone number",
            ));
        }
        parse_age(age)?;
        Ok(())
    }

    fn review(&self, state: &WizardState) -> Result<(), BookingError> {
        match state.field(fields::TERMS) {
            Some("true") => Ok(()),
            _ => Err(BookingError::validation(
                fields::TERMS,
                "Please accept the terms of service",
            )),
        }
    }

    pub fn normalize_phone(&self, phone: &str) -> Option<String> {
        self.inputs.normalize_phone(phone)
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, BookingError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| BookingError::validation(fields::DATE, "Please select both date and time"))
}

/// Whole years between 1 and 120.
pub fn parse_age(value: &str) -> Result<u8, BookingError> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|age| (MIN_PATIENT_AGE..=MAX_PATIENT_AGE).contains(age))
        .and_then(|age| u8::try_from(age).ok())
        .ok_or_else(|| {
            BookingError::validation(fields::PATIENT_AGE, "Please enter a valid age between 1 and 120")
        })
}
