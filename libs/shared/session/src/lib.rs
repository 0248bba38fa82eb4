pub mod context;
pub mod store;

pub use context::SessionContext;
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, StoreError};
