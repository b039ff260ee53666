pub mod backend;
pub mod client;
pub mod error;

pub use backend::{ChatBackend, RunOpen};
pub use client::ApiClient;
pub use error::ApiError;
