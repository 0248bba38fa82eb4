use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_session::store::{CredentialStore, LOGIN_RATE_LIMIT_KEY};

use crate::models::{AuthError, RateLimitRecord};

/// Locks login out for a while after too many rejected attempts.
pub struct LoginRateLimiter {
    store: Arc<dyn CredentialStore>,
    max_attempts: u32,
    lockout: Duration,
}

impl LoginRateLimiter {
    pub fn new(config: &AppConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            max_attempts: config.login_max_attempts.max(1),
            lockout: Duration::seconds(config.login_lockout_secs),
        }
    }

    pub fn record(&self) -> RateLimitRecord {
        self.store
            .get(LOGIN_RATE_LIMIT_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    fn save(&self, record: &RateLimitRecord) {
        let result = serde_json::to_string(record)
            .map_err(Into::into)
            .and_then(|raw| self.store.set(LOGIN_RATE_LIMIT_KEY, &raw));
        if let Err(e) = result {
            warn!("Failed to persist login rate limit: {}", e);
        }
    }

    /// Err while a lockout is in force. An elapsed lockout starts a fresh window.
    pub fn check(&self, now: DateTime<Utc>) -> Result<(), AuthError> {
        let record = self.record();
        match record.reset_time {
            Some(reset_time) if now < reset_time => {
                let retry_after_secs = (reset_time - now).num_seconds().max(1);
                debug!("Login locked out for another {}s", retry_after_secs);
                Err(AuthError::RateLimited { retry_after_secs })
            }
            Some(_) => {
                debug!("Login lockout elapsed");
                self.reset();
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Count a rejected login. Returns the attempts left before lockout.
    pub fn record_failure(&self, now: DateTime<Utc>) -> u32 {
        let mut record = self.record();
        record.attempts += 1;

        if record.attempts >= self.max_attempts {
            warn!("Too many failed logins, locking out for {}s", self.lockout.num_seconds());
            record.reset_time = Some(now + self.lockout);
        }

        self.save(&record);
        self.max_attempts.saturating_sub(record.attempts)
    }

    pub fn reset(&self) {
        if let Err(e) = self.store.remove(LOGIN_RATE_LIMIT_KEY) {
            warn!("Failed to clear login rate limit: {}", e);
        }
    }
}
