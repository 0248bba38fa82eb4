use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use shared_config::AppConfig;
use shared_gateway::{ApiGateway, GatewayResponse, Method};
use shared_models::auth::{
    LoginCredentials, LoginResponse, MessageResponse, ProfileUpdate, RefreshResponse,
    RegisterRequest, Session, UserProfile, VerifyResponse,
};
use shared_models::GatewayError;
use shared_session::SessionContext;
use shared_utils::jwt::token_expiry;
use shared_utils::validation::InputValidator;

use crate::models::{AuthError, RenewalDecision, SessionState};
use crate::services::prompt::RenewalPrompt;
use crate::services::rate_limit::LoginRateLimiter;
use crate::services::renewal::RenewalScheduler;

/// Lower bound on the wait before a renewal that follows a successful refresh.
pub const MIN_RENEWAL_DELAY_SECS: i64 = 5;

/// Keeps the bearer credential valid for the lifetime of a browsing session.
///
/// The manager is the only writer of [`SessionContext`] besides the gateway's
/// forced logout on 401. Renewal runs as a single deferred job owned by the
/// [`RenewalScheduler`]; results of a renewal started before a logout or a new
/// login are discarded through the session epoch.
pub struct SessionManager {
    gateway: Arc<ApiGateway>,
    session: Arc<SessionContext>,
    prompt: Arc<dyn RenewalPrompt>,
    scheduler: RenewalScheduler,
    rate_limiter: LoginRateLimiter,
    validator: InputValidator,
    refresh_threshold: Duration,
    session_ttl: Duration,
    renewing: AtomicBool,
    this: Weak<SessionManager>,
}

impl SessionManager {
    pub fn new(
        config: &AppConfig,
        gateway: Arc<ApiGateway>,
        prompt: Arc<dyn RenewalPrompt>,
    ) -> Arc<Self> {
        let session = Arc::clone(gateway.session());
        let rate_limiter = LoginRateLimiter::new(config, Arc::clone(session.store()));

        Arc::new_cyclic(|this: &Weak<SessionManager>| {
            // A forced logout by the gateway must not leave a renewal queued.
            let owner = this.clone();
            session.on_destroy(move || {
                if let Some(manager) = owner.upgrade() {
                    if manager.scheduler.cancel() {
                        debug!("Pending renewal cancelled, session was destroyed");
                    }
                }
            });

            Self {
                gateway,
                session,
                prompt,
                scheduler: RenewalScheduler::new(),
                rate_limiter,
                validator: InputValidator::new(),
                refresh_threshold: Duration::seconds(config.token_refresh_threshold_secs),
                session_ttl: Duration::seconds(config.session_ttl_secs),
                renewing: AtomicBool::new(false),
                this: this.clone(),
            }
        })
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn rate_limiter(&self) -> &LoginRateLimiter {
        &self.rate_limiter
    }

    pub fn state(&self) -> SessionState {
        if self.renewing.load(Ordering::SeqCst) {
            return SessionState::Renewing;
        }
        match self.session.current() {
            Some(session) if session.is_valid() => SessionState::Authenticated {
                expires_at: session.expires_at,
            },
            _ => SessionState::Anonymous,
        }
    }

    pub fn is_renewal_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// Credentials are never issued or vouched for by fixtures outside mock mode.
    fn require_live(&self, response: GatewayResponse, service: &str) -> Result<GatewayResponse, GatewayError> {
        if response.is_fixture() && !self.gateway.is_mock_mode() {
            warn!("{} answered from fixtures while offline, refusing it", service);
            return Err(GatewayError::Network(format!("{} service unreachable", service)));
        }
        Ok(response)
    }

    /// Expiry from `expires_in`, else the token's own `exp` claim, else the configured TTL.
    fn derive_expiry(&self, token: &str, expires_in: Option<i64>) -> DateTime<Utc> {
        let now = Utc::now();
        expires_in
            .map(|secs| now + Duration::seconds(secs))
            .or_else(|| token_expiry(token))
            .unwrap_or_else(|| now + self.session_ttl)
    }

    pub async fn login(&self, credentials: LoginCredentials) -> Result<Session, AuthError> {
        let email = credentials.email.trim().to_string();
        if email.is_empty() {
            return Err(AuthError::validation("email", "is required"));
        }
        if credentials.password.is_empty() {
            return Err(AuthError::validation("password", "is required"));
        }

        self.rate_limiter.check(Utc::now())?;

        debug!("Logging in {}", email);
        let body = json!({ "email": email, "password": credentials.password });

        let response = match self
            .gateway
            .request_with_token("/login", Method::POST, Some(body), None)
            .await
        {
            Ok(response) => response,
            Err(GatewayError::Server { status, .. }) if status == 400 || status == 401 => {
                let remaining = self.rate_limiter.record_failure(Utc::now());
                warn!("Login rejected, {} attempts left before lockout", remaining);
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        let login: LoginResponse = self.require_live(response, "authentication")?.decode()?;
        let session = Session {
            expires_at: self.derive_expiry(&login.access_token, login.expires_in),
            token: login.access_token,
            user: login.user,
        };

        self.session.authenticate(session.clone())?;
        self.rate_limiter.reset();
        info!("Logged in user {}, session valid until {}", session.user.id, session.expires_at);

        self.schedule_renewal();
        Ok(session)
    }

    /// Clear the session, any pending renewal and the login bookkeeping. Never fails.
    pub fn logout(&self) {
        if self.scheduler.cancel() {
            debug!("Pending renewal cancelled by logout");
        }
        self.session.destroy();
        self.rate_limiter.reset();
        self.renewing.store(false, Ordering::SeqCst);
        info!("Logged out");
    }

    /// Arrange the next renewal at `expires_at - threshold`, replacing any pending one.
    /// When that moment has already passed the prompt is offered right away.
    pub fn schedule_renewal(&self) {
        self.arrange_renewal(false);
    }

    /// Follow-up of a successful refresh. A token that lives no longer than the
    /// threshold is renewed halfway through its lifetime instead, and never
    /// sooner than [`MIN_RENEWAL_DELAY_SECS`].
    fn schedule_next_renewal(&self) {
        self.arrange_renewal(true);
    }

    fn arrange_renewal(&self, after_refresh: bool) {
        let Some(expires_at) = self.session.expires_at() else {
            debug!("No session, nothing to renew");
            self.scheduler.cancel();
            return;
        };

        let epoch = self.session.epoch();
        let now = Utc::now();
        let lead = if after_refresh {
            self.refresh_threshold.min((expires_at - now) / 2)
        } else {
            self.refresh_threshold
        };
        let renew_at = expires_at - lead;
        let this = self.this.clone();

        if renew_at <= now && !after_refresh {
            debug!("Session inside the refresh window, offering extension");
            self.scheduler.schedule(std::time::Duration::ZERO, async move {
                if let Some(manager) = this.upgrade() {
                    manager.offer_renewal(epoch).await;
                }
            });
        } else {
            let mut wait = renew_at - now;
            if after_refresh {
                wait = wait.max(Duration::seconds(MIN_RENEWAL_DELAY_SECS));
            }
            let delay = wait.to_std().unwrap_or_default();
            self.scheduler.schedule(delay, async move {
                if let Some(manager) = this.upgrade() {
                    manager.run_renewal(epoch).await;
                }
            });
        }
    }

    #[instrument(skip(self))]
    async fn run_renewal(&self, epoch: u64) {
        if self.session.epoch() != epoch {
            debug!("Session changed since renewal was scheduled");
            return;
        }

        self.renewing.store(true, Ordering::SeqCst);
        let outcome = self.renew_chain(epoch).await;
        self.renewing.store(false, Ordering::SeqCst);

        match outcome {
            Ok(true) => self.schedule_next_renewal(),
            Ok(false) => debug!("Renewal result discarded"),
            Err(e) => {
                warn!("Automatic renewal failed: {}", e);
                self.offer_renewal(epoch).await;
            }
        }
    }

    async fn renew_chain(&self, epoch: u64) -> Result<bool, AuthError> {
        let token = self.session.bearer_token().ok_or(AuthError::NotAuthenticated)?;

        if !self.check_token(&token).await? {
            return Err(AuthError::TokenRejected);
        }

        self.refresh(epoch, &token).await
    }

    /// A 2xx counts as accepted unless the body says `"valid": false`.
    async fn check_token(&self, token: &str) -> Result<bool, GatewayError> {
        let response = self
            .gateway
            .request_with_token("/verify-token", Method::GET, None, Some(token))
            .await?;
        let response = self.require_live(response, "verification")?;

        Ok(serde_json::from_value::<VerifyResponse>(response.body)
            .map(|verified| verified.valid)
            .unwrap_or(true))
    }

    /// Exchange `token` for a fresh one. Ok(false) when the session moved on meanwhile.
    async fn refresh(&self, epoch: u64, token: &str) -> Result<bool, AuthError> {
        let response = self
            .gateway
            .request_with_token("/refresh-token", Method::POST, None, Some(token))
            .await?;
        let refreshed: RefreshResponse = self.require_live(response, "refresh")?.decode()?;

        let expires_at = self.derive_expiry(&refreshed.access_token, refreshed.expires_in);
        let renewed = self
            .session
            .renew_if_current(epoch, &refreshed.access_token, expires_at);
        if renewed {
            info!("Session renewed until {}", expires_at);
        }
        Ok(renewed)
    }

    #[instrument(skip(self))]
    async fn offer_renewal(&self, epoch: u64) {
        let decision = self.prompt.offer_extension(self.session.expires_at()).await;

        if self.session.epoch() != epoch {
            debug!("Session changed while the prompt was open, ignoring {:?}", decision);
            return;
        }

        match decision {
            RenewalDecision::Extend => {
                let Some(token) = self.session.bearer_token() else {
                    self.logout();
                    return;
                };
                match self.refresh(epoch, &token).await {
                    Ok(true) => self.schedule_next_renewal(),
                    Ok(false) => debug!("Extension result discarded"),
                    Err(e) => {
                        warn!("Extending the session failed: {}", e);
                        self.logout();
                    }
                }
            }
            RenewalDecision::Decline => self.logout(),
            RenewalDecision::Dismissed => {
                info!("Extension not answered, session will lapse at expiry");
            }
        }
    }

    /// Best-effort check that `token` is still accepted. Any failure logs out.
    pub async fn verify(&self, token: &str) -> bool {
        match self.check_token(token).await {
            Ok(true) => true,
            Ok(false) => {
                warn!("Token reported invalid, logging out");
                self.logout();
                false
            }
            Err(e) => {
                warn!("Token verification failed: {}", e);
                self.logout();
                false
            }
        }
    }

    /// Pick up a session restored from the store: schedule its renewal and verify it.
    pub async fn resume(&self) -> SessionState {
        let Some(token) = self.session.bearer_token().filter(|_| self.session.is_authenticated()) else {
            debug!("No session to resume");
            return SessionState::Anonymous;
        };

        self.schedule_renewal();
        self.verify(&token).await;
        self.state()
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<Option<String>, AuthError> {
        if request.name.trim().is_empty() {
            return Err(AuthError::validation("name", "is required"));
        }
        if !self.validator.validate_email(&request.email) {
            return Err(AuthError::validation("email", "is not a valid email address"));
        }
        let phone = self
            .validator
            .normalize_phone(&request.phone)
            .ok_or_else(|| AuthError::validation("phone", "must contain exactly 10 digits"))?;
        if let Some(reason) = self.validator.password_strength(&request.password).first_unmet() {
            return Err(AuthError::validation("password", reason));
        }

        debug!("Registering {}", request.email);
        let body = serde_json::to_value(RegisterRequest { phone, ..request })
            .map_err(GatewayError::from)?;
        let response = self.gateway.request("/register", Method::POST, Some(body)).await?;
        let response: MessageResponse = self.require_live(response, "registration")?.decode()?;

        info!("Registration accepted");
        Ok(response.message)
    }

    pub async fn profile(&self) -> Result<UserProfile, AuthError> {
        if self.session.bearer_token().is_none() {
            return Err(AuthError::NotAuthenticated);
        }
        Ok(self.gateway.get("/profile").await?)
    }

    pub async fn update_profile(&self, mut update: ProfileUpdate) -> Result<UserProfile, AuthError> {
        if self.session.bearer_token().is_none() {
            return Err(AuthError::NotAuthenticated);
        }

        if let Some(phone) = update.phone.take() {
            let normalized = self
                .validator
                .normalize_phone(&phone)
                .ok_or_else(|| AuthError::validation("phone", "must contain exactly 10 digits"))?;
            update.phone = Some(normalized);
        }

        let body = serde_json::to_value(&update).map_err(GatewayError::from)?;
        let profile: UserProfile = self.gateway.put("/profile", Some(body)).await?;

        self.session.update_user(profile.clone())?;
        info!("Profile updated for user {}", profile.id);
        Ok(profile)
    }
}
