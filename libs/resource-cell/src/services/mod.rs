pub mod appointments;
pub mod catalog;

pub use appointments::{filter_appointments, AppointmentService};
pub use catalog::CatalogService;
