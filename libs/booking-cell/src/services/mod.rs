pub mod availability;
pub mod validation;
pub mod wizard;

pub use availability::{build_board, fallback_board, FALLBACK_UNAVAILABLE, SLOT_TEMPLATE};
pub use validation::StepValidator;
pub use wizard::{booking_horizon, doctors_at_hospital, BookingWizard, CatalogLoad, ANY_DOCTOR};
