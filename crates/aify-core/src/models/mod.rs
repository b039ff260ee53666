pub mod assistant;
pub mod list;
pub mod message;
pub mod thread;
pub mod user;

pub use assistant::{Assistant, AssistantCreate};
pub use list::{DeletionStatus, ListResponse};
pub use message::{Message, MessageContent, MessageCreate, MessageRead, MessageText, Role};
pub use thread::{Thread, ThreadCreate};
pub use user::{LoginRequest, LoginResult, SecretKeyRead, UserRead};
