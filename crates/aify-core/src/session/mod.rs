pub mod runner;
pub mod state;

pub use runner::{AbortHandle, RunOutcome, RunnerOptions, SessionRunner};
pub use state::{ChatSession, ReplyCommittedCallback, RunId, RunState, SessionEvent};
