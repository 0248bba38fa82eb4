use std::sync::{Mutex, PoisonError};
use tracing::info;

/// The view layer the gateway can send the user away from.
pub trait Navigator: Send + Sync {
    /// Location currently shown, used as the return target after login.
    fn current_location(&self) -> String;

    fn redirect(&self, target: &str);
}

/// Navigator that only tracks a location string. Suitable for headless drivers.
pub struct StaticNavigator {
    location: Mutex<String>,
    redirects: Mutex<Vec<String>>,
}

impl StaticNavigator {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: Mutex::new(location.into()),
            redirects: Mutex::new(Vec::new()),
        }
    }

    pub fn set_location(&self, location: impl Into<String>) {
        *self.location.lock().unwrap_or_else(PoisonError::into_inner) = location.into();
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for StaticNavigator {
    fn current_location(&self) -> String {
        self.location
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn redirect(&self, target: &str) {
        info!("Navigating to {}", target);
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target.to_string());
        self.set_location(target);
    }
}
