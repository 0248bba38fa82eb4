use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Local, NaiveDate};
use serde_json::json;
use tokio_test::assert_pending;
use tokio_test::task;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_cell::{fields, BookingError, BookingWizard, SubmissionState, WizardStep, ANY_DOCTOR};
use resource_cell::SlotQuery;
use shared_gateway::{ApiGateway, Provenance, StaticNavigator};
use shared_models::auth::Session;
use shared_session::SessionContext;
use shared_utils::test_utils::{MockApiResponses, TestConfig, TestUser};

fn create_gateway(uri: &str, signed_in: bool) -> Arc<ApiGateway> {
    let config = TestConfig::for_server(uri).to_app_config();
    let session = SessionContext::in_memory();
    if signed_in {
        session
            .authenticate(Session {
                token: "booking-token".to_string(),
                expires_at: chrono::Utc::now() + Duration::hours(1),
                user: TestUser::patient("asha@example.com").to_profile(),
            })
            .unwrap();
    }

    Arc::new(ApiGateway::new(
        &config,
        Arc::new(session),
        Arc::new(StaticNavigator::new("booking.html")),
    ))
}

fn next_week() -> NaiveDate {
    Local::now().date_naive() + Duration::days(7)
}

async fn mount_catalog(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/hospitals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::hospitals_response()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::services_response()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hospitals/1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "name": "Dr. Rajesh Kumar", "hospital_id": 1 },
            { "id": 2, "name": "Dr. Priya Sharma", "hospital_id": 1 }
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/services/1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::doctors_response()))
        .mount(server)
        .await;
}

async fn mount_slots(server: &MockServer, unavailable: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/appointments/available-slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::slots_response(unavailable)))
        .mount(server)
        .await;
}

fn fill_patient(wizard: &mut BookingWizard) {
    wizard.set_field(fields::PATIENT_NAME, "Asha Verma").unwrap();
    wizard.set_field(fields::PATIENT_AGE, "34").unwrap();
    wizard.set_field(fields::PATIENT_GENDER, "female").unwrap();
    wizard.set_field(fields::PATIENT_PHONE, "98765-43210").unwrap();
    wizard.set_field(fields::PATIENT_EMAIL, "asha@example.com").unwrap();
    wizard.set_field(fields::SYMPTOMS, "Chest pain").unwrap();
}

/// Walk the wizard to the review step with `time` picked.
async fn wizard_at_review(server: &MockServer, signed_in: bool, time: &str) -> BookingWizard {
    mount_catalog(server).await;
    mount_slots(server, &["09:00 AM"]).await;

    let mut wizard = BookingWizard::new(create_gateway(&server.uri(), signed_in));
    wizard.start().await;
    wizard.select_hospital(Some(1)).await.unwrap();
    wizard.select_service(Some(1)).await.unwrap();
    assert_eq!(wizard.advance().unwrap(), WizardStep::DateTime);

    wizard.select_date(next_week()).unwrap();
    wizard.resolve_availability().await.unwrap();
    wizard.select_slot(time).unwrap();
    assert_eq!(wizard.advance().unwrap(), WizardStep::PatientDetails);

    fill_patient(&mut wizard);
    assert_eq!(wizard.advance().unwrap(), WizardStep::Review);
    wizard.accept_terms(true).unwrap();
    wizard
}

#[tokio::test]
async fn test_start_loads_catalog_concurrently() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server).await;

    let mut wizard = BookingWizard::new(create_gateway(&mock_server.uri(), true));
    let load = wizard.start().await;

    assert_eq!(load.hospitals, Ok(2));
    assert_eq!(load.services, Ok(2));
    assert_eq!(wizard.hospitals()[0].name, "Care Hospital");
}

#[tokio::test]
async fn test_start_reports_each_list_independently() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hospitals"))
        .respond_with(ResponseTemplate::new(500).set_body_json(MockApiResponses::error_response("down")))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::services_response()))
        .mount(&mock_server)
        .await;

    let mut wizard = BookingWizard::new(create_gateway(&mock_server.uri(), true));
    let load = wizard.start().await;

    assert_matches!(load.hospitals, Err(BookingError::Gateway(_)));
    assert_eq!(load.services, Ok(2));
    assert!(wizard.hospitals().is_empty());
}

#[tokio::test]
async fn test_advance_is_gated_by_validation() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server).await;

    let mut wizard = BookingWizard::new(create_gateway(&mock_server.uri(), true));
    wizard.select_hospital(Some(1)).await.unwrap();

    assert_matches!(
        wizard.advance(),
        Err(BookingError::Validation { ref reason, .. }) if reason == "Please select both hospital and service"
    );
    assert_eq!(wizard.current_step(), WizardStep::HospitalService);

    wizard.select_service(Some(1)).await.unwrap();
    assert_eq!(wizard.advance().unwrap(), WizardStep::DateTime);
    assert!(wizard.state().step(WizardStep::HospitalService).validated);

    assert_eq!(wizard.retreat(), WizardStep::HospitalService);
    assert_eq!(wizard.retreat(), WizardStep::HospitalService);
}

#[tokio::test]
async fn test_doctor_list_follows_hospital_and_service() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server).await;

    let mut wizard = BookingWizard::new(create_gateway(&mock_server.uri(), true));

    let doctors = wizard.select_hospital(Some(1)).await.unwrap();
    assert_eq!(doctors.len(), 2);
    wizard.select_doctor(Some(2)).unwrap();

    // Service 1 doctors at hospital 1 are Kumar and Sharma; Gupta works elsewhere.
    let ids: Vec<i64> = wizard.select_service(Some(1)).await.unwrap().iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_matches!(wizard.select_doctor(Some(5)), Err(BookingError::Validation { .. }));
}

#[tokio::test]
async fn test_ineligible_doctor_is_cleared() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/services/2/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 7, "name": "Dr. Meera Nair", "hospital_id": 1 }
        ])))
        .mount(&mock_server)
        .await;

    let mut wizard = BookingWizard::new(create_gateway(&mock_server.uri(), true));
    wizard.select_hospital(Some(1)).await.unwrap();
    wizard.select_service(Some(1)).await.unwrap();
    wizard.select_doctor(Some(1)).unwrap();
    assert_eq!(wizard.state().id_field(fields::DOCTOR), Some(1));

    wizard.select_service(Some(2)).await.unwrap();
    assert_eq!(wizard.state().id_field(fields::DOCTOR), None);
}

#[tokio::test]
async fn test_slot_board_marks_unavailable_times() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/appointments/available-slots"))
        .and(query_param("hospital", "1"))
        .and(query_param("service", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockApiResponses::slots_response(&["09:00 AM", "11:30 AM"])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut wizard = BookingWizard::new(create_gateway(&mock_server.uri(), true));
    wizard.select_hospital(Some(1)).await.unwrap();
    wizard.select_service(Some(1)).await.unwrap();
    wizard.select_date(next_week()).unwrap();

    let board = wizard.resolve_availability().await.unwrap();
    assert_eq!(board.provenance, Provenance::Live);
    assert!(!board.degraded);
    assert_eq!(board.unavailable().count(), 2);
    assert_eq!(board.available().count(), 9);

    assert_matches!(wizard.select_slot("11:30 AM"), Err(BookingError::Validation { .. }));
    wizard.select_slot("10:00 AM").unwrap();
    assert_eq!(wizard.state().field(fields::TIME), Some("10:00 AM"));
}

#[tokio::test]
async fn test_lookup_passes_doctor_filter() {
    let mock_server = MockServer::start().await;
    let date = next_week();
    Mock::given(method("GET"))
        .and(path("/appointments/available-slots"))
        .and(query_param("date", date.format("%Y-%m-%d").to_string()))
        .and(query_param("doctor", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::slots_response(&["14:30"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let wizard = BookingWizard::new(create_gateway(&mock_server.uri(), true));
    let board = wizard
        .lookup_availability(&SlotQuery {
            date,
            hospital_id: 1,
            service_id: 1,
            doctor_id: Some(2),
        })
        .await;

    assert!(!board.find("02:30 PM").unwrap().available);
    assert_eq!(board.available().count(), 10);
}

#[tokio::test]
async fn test_slot_failure_degrades_to_fallback() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/appointments/available-slots"))
        .respond_with(ResponseTemplate::new(500).set_body_json(MockApiResponses::error_response("boom")))
        .mount(&mock_server)
        .await;

    let mut wizard = BookingWizard::new(create_gateway(&mock_server.uri(), true));
    wizard.select_hospital(Some(1)).await.unwrap();
    wizard.select_service(Some(1)).await.unwrap();
    wizard.select_date(next_week()).unwrap();

    let board = wizard.resolve_availability().await.unwrap();
    assert!(board.degraded);
    let blocked: Vec<&str> = board.unavailable().map(|s| s.time.as_str()).collect();
    assert_eq!(blocked, vec!["09:00 AM", "11:30 AM", "02:00 PM", "04:30 PM"]);
}

#[tokio::test]
async fn test_date_outside_horizon_rejected() {
    let mock_server = MockServer::start().await;
    let mut wizard = BookingWizard::new(create_gateway(&mock_server.uri(), true));
    let today = Local::now().date_naive();

    assert_matches!(wizard.select_date(today - Duration::days(1)), Err(BookingError::Validation { .. }));
    assert_matches!(wizard.select_date(today + Duration::days(120)), Err(BookingError::Validation { .. }));
    assert!(wizard.select_date(today).is_ok());
}

#[tokio::test]
async fn test_patient_age_and_phone_rules() {
    let mock_server = MockServer::start().await;
    let mut wizard = wizard_at_review(&mock_server, true, "10:00 AM").await;
    wizard.retreat();
    assert_eq!(wizard.current_step(), WizardStep::PatientDetails);

    for age in ["0", "121", "abc"] {
        wizard.set_field(fields::PATIENT_AGE, age).unwrap();
        assert_matches!(
            wizard.advance(),
            Err(BookingError::Validation { ref field, .. }) if field == fields::PATIENT_AGE,
            "age {}",
            age
        );
    }
    for age in ["1", "60", "120"] {
        wizard.set_field(fields::PATIENT_AGE, age).unwrap();
        assert_eq!(wizard.advance().unwrap(), WizardStep::Review, "age {}", age);
        wizard.retreat();
    }

    wizard.set_field(fields::PATIENT_PHONE, "12345").unwrap();
    assert_matches!(
        wizard.advance(),
        Err(BookingError::Validation { ref reason, .. }) if reason == "Please enter a valid 10-digit phone number"
    );
}

#[tokio::test]
async fn test_review_summary_defaults_to_any_doctor() {
    let mock_server = MockServer::start().await;
    let wizard = wizard_at_review(&mock_server, true, "02:30 PM").await;

    let summary = wizard.review_summary().await.unwrap();
    assert_eq!(summary.hospital, "Care Hospital");
    assert_eq!(summary.service, "Cardiology");
    assert_eq!(summary.doctor, ANY_DOCTOR);
    assert_eq!(summary.time, "02:30 PM");
    assert_eq!(summary.patient_phone, "9876543210");
}

#[tokio::test]
async fn test_submit_converts_time_and_confirms() {
    for (picked, wire) in [("02:30 PM", "14:30"), ("10:00 AM", "10:00")] {
        let mock_server = MockServer::start().await;
        let mut wizard = wizard_at_review(&mock_server, true, picked).await;

        Mock::given(method("POST"))
            .and(path("/appointments"))
            .and(body_partial_json(json!({
                "hospital_id": 1,
                "service_id": 1,
                "doctor_id": null,
                "appointment_time": wire,
                "patient_phone": "9876543210",
                "patient_age": 34
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "appointment_id": 42,
                "message": "Appointment booked"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let appointment_id = wizard.submit().await.unwrap();
        assert_eq!(appointment_id, "42");
        assert_eq!(
            wizard.submission(),
            &SubmissionState::Confirmed { appointment_id: "42".to_string() }
        );
        assert_matches!(wizard.submit().await, Err(BookingError::AlreadyConfirmed(_)));
    }
}

#[tokio::test]
async fn test_submit_without_session_never_calls_service() {
    let mock_server = MockServer::start().await;
    let mut wizard = wizard_at_review(&mock_server, false, "10:00 AM").await;

    Mock::given(method("POST"))
        .and(path("/appointments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let err = wizard.submit().await.unwrap_err();
    assert_eq!(err, BookingError::AuthenticationRequired);
    assert!(err.requires_login());
    assert_matches!(wizard.submission(), SubmissionState::Failed { requires_login: true, .. });
}

#[tokio::test]
async fn test_submit_requires_terms() {
    let mock_server = MockServer::start().await;
    let mut wizard = wizard_at_review(&mock_server, true, "10:00 AM").await;
    wizard.accept_terms(false).unwrap();

    assert_matches!(
        wizard.submit().await,
        Err(BookingError::Validation { ref field, .. }) if field == fields::TERMS
    );
}

#[tokio::test]
async fn test_failed_submission_keeps_draft_for_retry() {
    let mock_server = MockServer::start().await;
    let mut wizard = wizard_at_review(&mock_server, true, "10:00 AM").await;

    Mock::given(method("POST"))
        .and(path("/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "message": "Slot already taken" })))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "APT-9" })))
        .mount(&mock_server)
        .await;

    let err = wizard.submit().await.unwrap_err();
    assert!(!err.requires_login());
    assert_matches!(
        wizard.submission(),
        SubmissionState::Failed { ref message, requires_login: false } if message.contains("Slot already taken")
    );
    let draft = wizard.draft().cloned().unwrap();
    assert_eq!(draft.time, "10:00 AM");

    assert_eq!(wizard.submit().await.unwrap(), "APT-9");
    assert_eq!(wizard.draft(), Some(&draft));
}

#[tokio::test]
async fn test_expired_session_on_submit_requires_login() {
    let mock_server = MockServer::start().await;
    let mut wizard = wizard_at_review(&mock_server, true, "10:00 AM").await;

    Mock::given(method("POST"))
        .and(path("/appointments"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Token expired" })))
        .mount(&mock_server)
        .await;

    let err = wizard.submit().await.unwrap_err();
    assert!(err.requires_login());
    assert_matches!(wizard.submission(), SubmissionState::Failed { requires_login: true, .. });
}

#[tokio::test]
async fn test_reset_discards_booking() {
    let mock_server = MockServer::start().await;
    let mut wizard = wizard_at_review(&mock_server, true, "10:00 AM").await;

    wizard.reset();

    assert_eq!(wizard.current_step(), WizardStep::HospitalService);
    assert!(wizard.draft().is_none());
    assert!(wizard.slot_board().is_none());
    assert_eq!(wizard.submission(), &SubmissionState::Idle);
    assert_eq!(wizard.state().field(fields::HOSPITAL), None);
    assert_eq!(wizard.hospitals().len(), 2);
}

#[tokio::test]
async fn test_dropped_submission_can_be_retried() {
    let mock_server = MockServer::start().await;
    let mut wizard = wizard_at_review(&mock_server, true, "10:00 AM").await;

    Mock::given(method("POST"))
        .and(path("/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "APT-7" })))
        .mount(&mock_server)
        .await;

    {
        let mut pending = task::spawn(wizard.submit());
        assert_pending!(pending.poll());
    }

    assert_matches!(wizard.submission(), SubmissionState::Failed { requires_login: false, .. });
    assert_eq!(wizard.submit().await.unwrap(), "APT-7");
}

#[tokio::test]
async fn test_edit_on_review_rebuilds_draft_on_advance() {
    let mock_server = MockServer::start().await;
    let mut wizard = wizard_at_review(&mock_server, true, "10:00 AM").await;

    wizard.set_field(fields::PATIENT_NAME, "Asha Rao").unwrap();
    assert!(wizard.draft().is_none());
    assert_matches!(wizard.review_summary().await, Err(BookingError::NotAtReview));

    assert_eq!(wizard.advance().unwrap(), WizardStep::Review);
    let summary = wizard.review_summary().await.unwrap();
    assert_eq!(summary.patient_name, "Asha Rao");

    wizard.set_field(fields::PATIENT_AGE, "200").unwrap();
    assert_matches!(
        wizard.advance(),
        Err(BookingError::Validation { ref field, .. }) if field == fields::PATIENT_AGE
    );
    assert!(wizard.draft().is_none());
    assert_eq!(wizard.current_step(), WizardStep::Review);
}
