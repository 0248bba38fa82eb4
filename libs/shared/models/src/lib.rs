pub mod auth;
pub mod error;
pub mod serde_helpers;

pub use auth::{Session, UserProfile};
pub use error::GatewayError;
