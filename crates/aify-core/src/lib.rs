pub mod api;
pub mod config;
pub mod constants;
pub mod directory;
pub mod models;
pub mod secure_storage;
pub mod session;
pub mod streaming;
pub mod tracing_setup;

pub use api::{ApiClient, ApiError, ChatBackend, RunOpen};
pub use config::{CoreConfig, PersistPolicy};
pub use directory::{Directory, SharedDirectory};
pub use session::{AbortHandle, ChatSession, RunOutcome, RunState, SessionEvent, SessionRunner};
pub use streaming::StreamEvent;
