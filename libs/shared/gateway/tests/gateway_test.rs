use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use mockall::mock;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_gateway::{ApiGateway, Method, Navigator, Provenance, StaticNavigator};
use shared_models::auth::Session;
use shared_models::GatewayError;
use shared_session::SessionContext;
use shared_utils::test_utils::{MockApiResponses, TestConfig, TestUser};

mock! {
    pub Nav {}

    impl Navigator for Nav {
        fn current_location(&self) -> String;
        fn redirect(&self, target: &str);
    }
}

fn logged_in_session(token: &str) -> Arc<SessionContext> {
    let session = SessionContext::in_memory();
    session
        .authenticate(Session {
            token: token.to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
            user: TestUser::default().to_profile(),
        })
        .unwrap();
    Arc::new(session)
}

fn gateway_with(config: AppConfig, session: Arc<SessionContext>) -> ApiGateway {
    ApiGateway::new(&config, session, Arc::new(StaticNavigator::new("booking.html")))
}

#[tokio::test]
async fn test_bearer_token_is_attached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hospitals"))
        .and(header("Authorization", "Bearer valid-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::hospitals_response()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TestConfig::for_server(&mock_server.uri()).to_app_config();
    let gateway = gateway_with(config, logged_in_session("valid-token"));

    let response = gateway.request("/hospitals", Method::GET, None).await.unwrap();

    assert_eq!(response.provenance, Provenance::Live);
    assert_eq!(response.body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_anonymous_call_has_no_authorization_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services"))
        .and(header("Authorization", "Bearer anything"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::services_response()))
        .mount(&mock_server)
        .await;

    let config = TestConfig::for_server(&mock_server.uri()).to_app_config();
    let gateway = gateway_with(config, Arc::new(SessionContext::in_memory()));

    let services: serde_json::Value = gateway.get("/services").await.unwrap();
    assert_eq!(services[0]["name"], "Cardiology");
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let mock_server = MockServer::start().await;
    let payload = json!({ "email": "patient@example.com", "password": "secret" });

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(&payload))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TestConfig::for_server(&mock_server.uri()).to_app_config();
    let gateway = gateway_with(config, Arc::new(SessionContext::in_memory()));

    let response = gateway
        .request("/login", Method::POST, Some(payload))
        .await
        .unwrap();
    assert_eq!(response.body["ok"], true);
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hospitals"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockApiResponses::hospitals_response())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let mut test_config = TestConfig::for_server(&mock_server.uri());
    test_config.request_timeout_secs = 1;
    let gateway = gateway_with(test_config.to_app_config(), Arc::new(SessionContext::in_memory()));

    let result = gateway.request("/hospitals", Method::GET, None).await;

    assert_matches!(result, Err(GatewayError::Timeout { timeout_secs: 1 }));
}

#[tokio::test]
async fn test_server_error_carries_status_and_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/appointments"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(MockApiResponses::error_response("Slot already booked")),
        )
        .mount(&mock_server)
        .await;

    let config = TestConfig::for_server(&mock_server.uri()).to_app_config();
    let gateway = gateway_with(config, logged_in_session("valid-token"));

    let result = gateway
        .request("/appointments", Method::POST, Some(json!({})))
        .await;

    assert_matches!(
        result,
        Err(GatewayError::Server { status: 409, ref message }) if message == "Slot already booked"
    );
}

#[tokio::test]
async fn test_unparsable_success_body_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hospitals"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let config = TestConfig::for_server(&mock_server.uri()).to_app_config();
    let gateway = gateway_with(config, Arc::new(SessionContext::in_memory()));

    let result = gateway.request("/hospitals", Method::GET, None).await;

    assert_matches!(result, Err(GatewayError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_empty_success_body_is_null() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/appointments/APT1/cancel"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let config = TestConfig::for_server(&mock_server.uri()).to_app_config();
    let gateway = gateway_with(config, logged_in_session("valid-token"));

    let response = gateway
        .request("/appointments/APT1/cancel", Method::PUT, None)
        .await
        .unwrap();
    assert!(response.body.is_null());
}

#[tokio::test]
async fn test_unauthorized_clears_session_and_redirects() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/profile"))
        .and(header("Authorization", "Bearer stale-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(MockApiResponses::error_response("Token expired")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TestConfig::for_server(&mock_server.uri()).to_app_config();
    let session = logged_in_session("stale-token");

    let mut navigator = MockNav::new();
    navigator
        .expect_current_location()
        .returning(|| "booking.html?step=2".to_string());
    navigator
        .expect_redirect()
        .withf(|target| target.to_string() == "login.html?redirect=booking.html%3Fstep%3D2")
        .times(1)
        .return_const(());

    let gateway = ApiGateway::new(&config, Arc::clone(&session), Arc::new(navigator));

    let result = gateway.request("/profile", Method::GET, None).await;

    assert_matches!(result, Err(GatewayError::AuthExpired));
    assert!(session.current().is_none());
    assert!(session.store().get("token").is_none());

    // The stale token is gone, so a second call goes out without it.
    let second = gateway.request("/profile", Method::GET, None).await;
    assert_matches!(second, Err(GatewayError::Server { status: 404, .. }));
}

#[tokio::test]
async fn test_unauthorized_on_login_surface_does_not_redirect() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let config = TestConfig::for_server(&mock_server.uri()).to_app_config();
    let session = logged_in_session("stale-token");

    let mut navigator = MockNav::new();
    navigator
        .expect_current_location()
        .returning(|| "/app/login.html".to_string());
    navigator.expect_redirect().times(0);

    let gateway = ApiGateway::new(&config, Arc::clone(&session), Arc::new(navigator));

    let result = gateway.request("/profile", Method::GET, None).await;

    assert_matches!(result, Err(GatewayError::AuthExpired));
    assert!(session.current().is_none());
}

#[tokio::test]
async fn test_unauthorized_with_explicit_token_is_passed_through() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/verify-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(MockApiResponses::error_response("Invalid token")))
        .mount(&mock_server)
        .await;

    let config = TestConfig::for_server(&mock_server.uri()).to_app_config();
    let session = logged_in_session("current-token");
    let navigator = Arc::new(StaticNavigator::new("booking.html"));
    let gateway = ApiGateway::new(&config, Arc::clone(&session), navigator.clone());

    let result = gateway
        .request_with_token("/verify-token", Method::GET, None, Some("current-token"))
        .await;

    assert_matches!(result, Err(GatewayError::Server { status: 401, .. }));
    assert!(session.current().is_some());
    assert!(navigator.redirects().is_empty());
}

#[tokio::test]
async fn test_mock_mode_never_touches_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hospitals"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut test_config = TestConfig::for_server(&mock_server.uri());
    test_config.mock_api = true;
    let gateway = gateway_with(test_config.to_app_config(), Arc::new(SessionContext::in_memory()));

    assert!(gateway.is_mock_mode());
    let response = gateway.request("/hospitals", Method::GET, None).await.unwrap();

    assert!(response.is_fixture());
    assert_eq!(response.body.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_mock_mode_can_be_toggled_at_runtime() {
    let config = TestConfig::for_server("http://127.0.0.1:1").to_app_config();
    let gateway = gateway_with(config, Arc::new(SessionContext::in_memory()));

    gateway.set_mock_mode(true);
    let response = gateway
        .request("/appointments", Method::POST, Some(json!({})))
        .await
        .unwrap();

    assert_eq!(response.provenance, Provenance::Fixture);
    assert_eq!(response.body["appointment_id"], "APT1001");
}

#[tokio::test]
async fn test_network_failure_falls_back_to_fixture() {
    let mut test_config = TestConfig::for_server("http://127.0.0.1:1");
    test_config.offline_fallback = true;
    let gateway = gateway_with(test_config.to_app_config(), Arc::new(SessionContext::in_memory()));

    let response = gateway.request("/services", Method::GET, None).await.unwrap();

    assert_eq!(response.provenance, Provenance::Fixture);
    assert_eq!(response.body.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_network_failure_without_fallback_is_reported() {
    let config = TestConfig::for_server("http://127.0.0.1:1").to_app_config();
    let gateway = gateway_with(config, Arc::new(SessionContext::in_memory()));

    let result = gateway.request("/services", Method::GET, None).await;

    assert_matches!(result, Err(GatewayError::Network(_)));
}
