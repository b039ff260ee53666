use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::{ApiClient, ApiError};
use crate::constants::PREVIEW_MAX_CHARS;
use crate::models::{Assistant, Thread};

pub type SharedDirectory = Arc<Mutex<Directory>>;

/// Cached assistants and threads, plus a one-line preview per thread
#[derive(Debug, Default)]
pub struct Directory {
    assistants: Vec<Assistant>,
    assistant_index: HashMap<String, usize>,
    threads: Vec<Thread>,
    previews: HashMap<String, String>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch assistants and threads from the server
    pub async fn load(client: &ApiClient) -> Result<Self, ApiError> {
        let mut directory = Self::new();
        directory.set_assistants(client.list_assistants().await?);
        directory.set_threads(client.list_threads().await?);
        Ok(directory)
    }

    pub fn into_shared(self) -> SharedDirectory {
        Arc::new(Mutex::new(self))
    }

    pub fn set_assistants(&mut self, assistants: Vec<Assistant>) {
        self.assistant_index = assistants
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id.clone(), i))
            .collect();
        self.assistants = assistants;
    }

    pub fn set_threads(&mut self, threads: Vec<Thread>) {
        self.threads = threads;
    }

    pub fn assistants(&self) -> &[Assistant] {
        &self.assistants
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn assistant(&self, assistant_id: &str) -> Option<&Assistant> {
        self.assistant_index
            .get(assistant_id)
            .and_then(|&i| self.assistants.get(i))
    }

    pub fn thread(&self, thread_id: &str) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == thread_id)
    }

    /// Assistant a thread is bound to through its metadata
    pub fn assistant_for_thread(&self, thread_id: &str) -> Option<&Assistant> {
        self.thread(thread_id)
            .and_then(Thread::assistant_id)
            .and_then(|id| self.assistant(id))
    }

    /// Record the latest reply of a thread as its preview line
    pub fn record_reply(&mut self, thread_id: &str, reply: &str) {
        self.previews
            .insert(thread_id.to_string(), preview_line(reply));
    }

    pub fn preview(&self, thread_id: &str) -> Option<&str> {
        self.previews.get(thread_id).map(String::as_str)
    }

    /// Callback for `SessionRunner::on_reply_committed` that keeps previews current
    pub fn preview_updater(shared: &SharedDirectory) -> impl FnMut(&str, &str) + Send + 'static {
        let shared = Arc::clone(shared);
        move |thread_id: &str, reply: &str| shared.lock().record_reply(thread_id, reply)
    }
}

/// First line, cut to `PREVIEW_MAX_CHARS` characters
pub fn preview_line(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("");
    let truncated: String = first_line.chars().take(PREVIEW_MAX_CHARS).collect();
    if first_line.chars().count() > PREVIEW_MAX_CHARS {
        format!("{truncated}...")
    } else {
        truncated
    }
}
