use std::future::Future;

use reqwest::StatusCode;

use super::ApiError;
use crate::models::{MessageCreate, MessageRead};
use crate::streaming::EventStream;

/// Outcome of the run-stream handshake
pub enum RunOpen {
    /// 2xx: events follow
    Accepted(EventStream),
    /// Any other status. The body is not read.
    Rejected { status: StatusCode },
}

impl std::fmt::Debug for RunOpen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOpen::Accepted(_) => f.write_str("Accepted(..)"),
            RunOpen::Rejected { status } => write!(f, "Rejected({})", status),
        }
    }
}

/// The three server calls a chat session makes
pub trait ChatBackend: Send + Sync {
    /// Messages of a thread, newest first
    fn fetch_history(
        &self,
        thread_id: &str,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<MessageRead>, ApiError>> + Send;

    fn save_user_message(
        &self,
        thread_id: &str,
        message: &MessageCreate,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Start a run and return its event stream. `Err` means the request itself failed.
    fn open_run(
        &self,
        assistant_id: &str,
        thread_id: &str,
    ) -> impl Future<Output = Result<RunOpen, ApiError>> + Send;
}
