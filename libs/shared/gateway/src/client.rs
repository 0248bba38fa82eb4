use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;
use shared_models::GatewayError;
use shared_session::SessionContext;

use crate::fixtures::FixtureTable;
use crate::navigator::Navigator;

/// Where a response body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Live,
    Fixture,
}

#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub body: Value,
    pub provenance: Provenance,
}

impl GatewayResponse {
    pub fn is_fixture(&self) -> bool {
        self.provenance == Provenance::Fixture
    }

    pub fn decode<T: DeserializeOwned>(self) -> Result<T, GatewayError> {
        serde_json::from_value(self.body).map_err(|e| {
            warn!("Response did not match the expected shape: {}", e);
            GatewayError::InvalidResponse(e.to_string())
        })
    }
}

/// How a 401 is treated for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthPolicy {
    /// Clear the session and send the user to the login surface.
    Central,
    /// Report the 401 to the caller untouched.
    Passthrough,
}

/// The single chokepoint for network calls: bearer injection, timeout,
/// error normalization and the offline/mock fallback.
pub struct ApiGateway {
    client: Client,
    base_url: String,
    timeout: Duration,
    mock_mode: AtomicBool,
    offline_fallback: bool,
    login_page: String,
    session: Arc<SessionContext>,
    navigator: Arc<dyn Navigator>,
    fixtures: FixtureTable,
}

impl ApiGateway {
    pub fn new(
        config: &AppConfig,
        session: Arc<SessionContext>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        if config.mock_api {
            info!("API gateway starting in offline/mock mode");
        }

        Self {
            client: Client::new(),
            base_url: config.base_url().to_string(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            mock_mode: AtomicBool::new(config.mock_api),
            offline_fallback: config.offline_fallback,
            login_page: config.login_page.clone(),
            session,
            navigator,
            fixtures: FixtureTable::new(),
        }
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_mock_mode(&self, enabled: bool) {
        info!("Offline/mock mode {}", if enabled { "enabled" } else { "disabled" });
        self.mock_mode.store(enabled, Ordering::SeqCst);
    }

    pub fn is_mock_mode(&self) -> bool {
        self.mock_mode.load(Ordering::SeqCst)
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, GatewayError> {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                GatewayError::validation("Authorization", "token contains invalid header characters")
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    /// Issue a call carrying the current session's token, if any.
    ///
    /// A 401 while a token was presented clears the session, redirects to the
    /// login surface (unless already there) and resolves to `AuthExpired`.
    pub async fn request(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<Value>,
    ) -> Result<GatewayResponse, GatewayError> {
        let token = self.session.bearer_token();
        self.dispatch(endpoint, method, body, token.as_deref(), AuthPolicy::Central)
            .await
    }

    /// Issue a call with an explicit credential. A 401 is returned as
    /// `Server { status: 401 }` and the session is left for the caller to handle.
    pub async fn request_with_token(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Result<GatewayResponse, GatewayError> {
        self.dispatch(endpoint, method, body, token, AuthPolicy::Passthrough)
            .await
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, GatewayError> {
        self.request(endpoint, Method::GET, None).await?.decode()
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Value,
    ) -> Result<T, GatewayError> {
        self.request(endpoint, Method::POST, Some(body)).await?.decode()
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<T, GatewayError> {
        self.request(endpoint, Method::PUT, body).await?.decode()
    }

    async fn dispatch(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<Value>,
        token: Option<&str>,
        policy: AuthPolicy,
    ) -> Result<GatewayResponse, GatewayError> {
        // Only POST and PUT carry a body.
        let body = body.filter(|_| method == Method::POST || method == Method::PUT);

        if self.is_mock_mode() {
            return Ok(self.fixture(endpoint, &method, body.as_ref()));
        }

        match self.send(endpoint, method.clone(), body.as_ref(), token, policy).await {
            Ok(body) => Ok(GatewayResponse {
                body,
                provenance: Provenance::Live,
            }),
            Err(GatewayError::Network(message)) if self.offline_fallback => {
                warn!(
                    "Network failure on {} {} ({}), serving fixture data",
                    method, endpoint, message
                );
                Ok(self.fixture(endpoint, &method, body.as_ref()))
            }
            Err(e) => {
                error!("API request error on {} {}: {}", method, endpoint, e);
                Err(e)
            }
        }
    }

    fn fixture(&self, endpoint: &str, method: &Method, body: Option<&Value>) -> GatewayResponse {
        GatewayResponse {
            body: self.fixtures.resolve(endpoint, method, body),
            provenance: Provenance::Fixture,
        }
    }

    async fn send(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&Value>,
        token: Option<&str>,
        policy: AuthPolicy,
    ) -> Result<Value, GatewayError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Making {} request to {}", method, url);

        let headers = self.get_headers(token)?;
        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(body_data);
        }

        let exchange = async {
            let response = req.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        let (status, text) = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) if e.is_timeout() => {
                return Err(GatewayError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                })
            }
            Ok(Err(e)) => return Err(GatewayError::Network(e.to_string())),
            Err(_) => {
                return Err(GatewayError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        };

        if status == StatusCode::UNAUTHORIZED && token.is_some() && policy == AuthPolicy::Central {
            self.handle_unauthorized();
            return Err(GatewayError::AuthExpired);
        }

        if !status.is_success() {
            let message = error_message(status, &text);
            error!("API error ({}): {}", status, message);
            return Err(GatewayError::Server {
                status: status.as_u16(),
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            warn!("Unparsable success body from {}: {}", endpoint, e);
            GatewayError::InvalidResponse(e.to_string())
        })
    }

    fn handle_unauthorized(&self) {
        warn!("Credential rejected by the service, clearing session");
        self.session.destroy();

        let location = self.navigator.current_location();
        if location.contains(&self.login_page) {
            debug!("Already on the login surface, not redirecting");
            return;
        }

        let target = format!(
            "{}?redirect={}",
            self.login_page,
            urlencoding::encode(&location)
        );
        self.navigator.redirect(&target);
    }
}

fn error_message(status: StatusCode, text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|body| {
            body.get("message")
                .or_else(|| body.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Server error").to_string())
}
