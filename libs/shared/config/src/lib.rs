use std::env;
use tracing::warn;

pub const LOCAL_API_BASE_URL: &str = "http://localhost:3000/api";
pub const PRODUCTION_API_BASE_URL: &str = "https://api.swasthyasetu.com/api";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" | "development" | "dev" => Some(Environment::Local),
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Environment::Local => LOCAL_API_BASE_URL,
            Environment::Production => PRODUCTION_API_BASE_URL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub mock_api: bool,
    pub offline_fallback: bool,
    pub token_refresh_threshold_secs: i64,
    pub session_ttl_secs: i64,
    pub login_page: String,
    pub login_max_attempts: u32,
    pub login_lockout_secs: i64,
    pub credential_store_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Local,
            api_base_url: LOCAL_API_BASE_URL.to_string(),
            request_timeout_secs: 10,
            mock_api: false,
            offline_fallback: true,
            token_refresh_threshold_secs: 300,
            session_ttl_secs: 3600,
            login_page: "login.html".to_string(),
            login_max_attempts: 5,
            login_lockout_secs: 900,
            credential_store_path: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let environment = env::var("CLINIC_ENV")
            .ok()
            .and_then(|value| {
                let parsed = Environment::parse(&value);
                if parsed.is_none() {
                    warn!("CLINIC_ENV has unknown value '{}', using local", value);
                }
                parsed
            })
            .unwrap_or_else(|| {
                warn!("CLINIC_ENV not set, using local");
                Environment::Local
            });

        let config = Self {
            environment,
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("API_BASE_URL not set, using {} default", environment.default_base_url());
                    environment.default_base_url().to_string()
                }),
            request_timeout_secs: parse_var("API_TIMEOUT_SECS", defaults.request_timeout_secs),
            mock_api: parse_var("MOCK_API", defaults.mock_api),
            offline_fallback: parse_var("OFFLINE_FALLBACK", defaults.offline_fallback),
            token_refresh_threshold_secs: parse_var(
                "TOKEN_REFRESH_THRESHOLD_SECS",
                defaults.token_refresh_threshold_secs,
            ),
            session_ttl_secs: parse_var("SESSION_TTL_SECS", defaults.session_ttl_secs),
            login_page: env::var("LOGIN_PAGE").unwrap_or(defaults.login_page),
            login_max_attempts: parse_var("LOGIN_MAX_ATTEMPTS", defaults.login_max_attempts),
            login_lockout_secs: parse_var("LOGIN_LOCKOUT_SECS", defaults.login_lockout_secs),
            credential_store_path: env::var("CREDENTIAL_STORE_PATH").ok(),
        };

        if !config.is_configured() {
            warn!("Client not fully configured - API base URL is empty");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.api_base_url.is_empty() && self.request_timeout_secs > 0
    }

    /// Base URL without a trailing slash, so endpoints can be appended as-is.
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
