//! Application-wide constants
//!
//! Centralized location for API paths and defaults that are used across
//! multiple modules.

/// Default API server
pub const DEFAULT_BASE_URL: &str = "http://localhost:2000";

/// Prefix of every versioned API route
pub const API_PREFIX: &str = "/api/v1";

/// Number of messages requested when a thread's history is loaded
pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

/// Marker appended to a reply while it is still streaming
pub const CURSOR_MARKER: &str = "\u{2581}";

/// Length of a thread preview line before it is truncated
pub const PREVIEW_MAX_CHARS: usize = 50;

// Header names understood by the API server
pub mod headers {
    pub const ORGANIZATION: &str = "OpenAI-Organization";
}

// Server-sent event names on the run stream
pub mod sse_events {
    pub const MESSAGE: &str = "message";
    pub const ERROR: &str = "error";
    pub const CLOSE: &str = "close";
}
