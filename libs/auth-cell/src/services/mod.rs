pub mod prompt;
pub mod rate_limit;
pub mod renewal;
pub mod session;

pub use prompt::{FixedRenewalPrompt, RenewalPrompt};
pub use rate_limit::LoginRateLimiter;
pub use renewal::RenewalScheduler;
pub use session::SessionManager;
