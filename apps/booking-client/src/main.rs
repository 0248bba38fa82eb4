use std::sync::Arc;

use anyhow::{Context, Result};
use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod walkthrough;

use auth_cell::{FixedRenewalPrompt, RenewalDecision, SessionManager, SessionState};
use shared_config::AppConfig;
use shared_gateway::{ApiGateway, StaticNavigator};
use shared_models::auth::LoginCredentials;
use shared_session::{CredentialStore, FileCredentialStore, MemoryCredentialStore, SessionContext};

use walkthrough::BookingPlan;

#[tokio::main]
async fn main() -> Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic booking client");

    let config = AppConfig::from_env();
    info!("Using {} (mock mode: {})", config.base_url(), config.mock_api);

    let store: Arc<dyn CredentialStore> = match &config.credential_store_path {
        Some(path) => Arc::new(
            FileCredentialStore::open(path)
                .with_context(|| format!("opening credential store at {}", path))?,
        ),
        None => Arc::new(MemoryCredentialStore::new()),
    };

    let session = Arc::new(SessionContext::init(store));
    let navigator = Arc::new(StaticNavigator::new("index.html"));
    let gateway = Arc::new(ApiGateway::new(&config, session, navigator.clone()));
    let prompt = Arc::new(FixedRenewalPrompt::new(RenewalDecision::Extend));
    let manager = SessionManager::new(&config, Arc::clone(&gateway), prompt);

    if manager.resume().await == SessionState::Anonymous {
        let credentials = LoginCredentials {
            email: std::env::var("CLINIC_EMAIL").unwrap_or_else(|_| "patient@example.com".into()),
            password: std::env::var("CLINIC_PASSWORD").unwrap_or_else(|_| "Password@123".into()),
        };
        manager.login(credentials).await.context("login failed")?;
    } else {
        info!("Resumed stored session");
    }

    navigator.set_location("booking.html");
    let outcome = walkthrough::book(Arc::clone(&gateway), BookingPlan::from_env()).await;
    if let Err(e) = &outcome {
        error!("Booking failed: {:#}", e);
    }

    navigator.set_location("dashboard.html");
    if let Err(e) = walkthrough::list_upcoming(Arc::clone(&gateway)).await {
        error!("Could not list appointments: {:#}", e);
    }

    manager.logout();
    for target in navigator.redirects() {
        info!("Client was redirected to {}", target);
    }

    outcome.map(|_| ())
}
