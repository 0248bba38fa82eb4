use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::RenewalDecision;

/// The interactive "your session is about to expire" decision point.
#[async_trait]
pub trait RenewalPrompt: Send + Sync {
    async fn offer_extension(&self, expires_at: Option<DateTime<Utc>>) -> RenewalDecision;
}

/// Always answers the same way. Used by headless drivers.
pub struct FixedRenewalPrompt {
    decision: RenewalDecision,
    offers: AtomicUsize,
}

impl FixedRenewalPrompt {
    pub fn new(decision: RenewalDecision) -> Self {
        Self {
            decision,
            offers: AtomicUsize::new(0),
        }
    }

    pub fn offers(&self) -> usize {
        self.offers.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenewalPrompt for FixedRenewalPrompt {
    async fn offer_extension(&self, _expires_at: Option<DateTime<Utc>>) -> RenewalDecision {
        self.offers.fetch_add(1, Ordering::SeqCst);
        self.decision
    }
}
