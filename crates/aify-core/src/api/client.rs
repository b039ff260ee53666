use reqwest::{header, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use super::{ApiError, ChatBackend, RunOpen};
use crate::config::CoreConfig;
use crate::constants::{headers, API_PREFIX};
use crate::models::{
    Assistant, AssistantCreate, DeletionStatus, ListResponse, LoginRequest, LoginResult,
    MessageCreate, MessageRead, Thread, ThreadCreate,
};
use crate::streaming::decode_event_stream;

/// Client for the assistants/threads/messages/runs API
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    secret_key: Option<String>,
    organization: Option<String>,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            organization: config.organization.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_secret_key(&self) -> bool {
        self.secret_key.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(key) = &self.secret_key {
            builder = builder.bearer_auth(key);
        }
        if let Some(org) = &self.organization {
            builder = builder.header(headers::ORGANIZATION, org);
        }
        builder
    }

    async fn check_status(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status { status, body })
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
        let response = Self::check_status(builder.send().await?).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    // Assistants

    pub async fn list_assistants(&self) -> Result<Vec<Assistant>, ApiError> {
        let list: ListResponse<Assistant> =
            Self::send_json(self.request(Method::GET, "/assistants")).await?;
        Ok(list.data)
    }

    pub async fn get_assistant(&self, assistant_id: &str) -> Result<Assistant, ApiError> {
        Self::send_json(self.request(Method::GET, &format!("/assistants/{}", assistant_id))).await
    }

    pub async fn create_assistant(&self, assistant: &AssistantCreate) -> Result<Assistant, ApiError> {
        Self::send_json(self.request(Method::POST, "/assistants").json(assistant)).await
    }

    pub async fn delete_assistant(&self, assistant_id: &str) -> Result<DeletionStatus, ApiError> {
        Self::send_json(self.request(Method::DELETE, &format!("/assistants/{}", assistant_id)))
            .await
    }

    // Threads

    pub async fn list_threads(&self) -> Result<Vec<Thread>, ApiError> {
        let list: ListResponse<Thread> =
            Self::send_json(self.request(Method::GET, "/threads")).await?;
        Ok(list.data)
    }

    pub async fn create_thread(&self, thread: &ThreadCreate) -> Result<Thread, ApiError> {
        Self::send_json(self.request(Method::POST, "/threads").json(thread)).await
    }

    pub async fn delete_thread(&self, thread_id: &str) -> Result<DeletionStatus, ApiError> {
        Self::send_json(self.request(Method::DELETE, &format!("/threads/{}", thread_id))).await
    }

    // Messages

    /// Newest first, as the server returns them
    pub async fn list_messages(
        &self,
        thread_id: &str,
        limit: u32,
    ) -> Result<ListResponse<MessageRead>, ApiError> {
        let builder = self
            .request(Method::GET, &format!("/threads/{}/messages", thread_id))
            .query(&[("limit", limit.to_string()), ("order", "desc".to_string())]);
        Self::send_json(builder).await
    }

    pub async fn create_message(
        &self,
        thread_id: &str,
        message: &MessageCreate,
    ) -> Result<MessageRead, ApiError> {
        let builder = self
            .request(Method::POST, &format!("/threads/{}/messages", thread_id))
            .json(message);
        Self::send_json(builder).await
    }

    // Runs

    /// `POST /threads/{id}/runs?stream=true`. Dropping the returned stream closes the connection.
    pub async fn open_run_stream(
        &self,
        assistant_id: &str,
        thread_id: &str,
    ) -> Result<RunOpen, ApiError> {
        let response = self
            .request(Method::POST, &format!("/threads/{}/runs", thread_id))
            .query(&[("stream", "true")])
            .header(header::ACCEPT, "text/event-stream")
            .json(&json!({ "assistant_id": assistant_id }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, thread_id, assistant_id, "run stream rejected");
            return Ok(RunOpen::Rejected { status });
        }

        debug!(%status, thread_id, "run stream opened");
        Ok(RunOpen::Accepted(decode_event_stream(response.bytes_stream())))
    }

    // Users

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResult, ApiError> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        Self::send_json(
            self.request(Method::POST, &format!("/users/{}/login", username))
                .json(&body),
        )
        .await
    }
}

impl ChatBackend for ApiClient {
    async fn fetch_history(
        &self,
        thread_id: &str,
        limit: u32,
    ) -> Result<Vec<MessageRead>, ApiError> {
        Ok(self.list_messages(thread_id, limit).await?.data)
    }

    async fn save_user_message(
        &self,
        thread_id: &str,
        message: &MessageCreate,
    ) -> Result<(), ApiError> {
        self.create_message(thread_id, message).await.map(|_| ())
    }

    async fn open_run(&self, assistant_id: &str, thread_id: &str) -> Result<RunOpen, ApiError> {
        self.open_run_stream(assistant_id, thread_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building_trims_trailing_slash() {
        let client = ApiClient::new(&CoreConfig::new("http://localhost:2000/"));
        assert_eq!(
            client.url("/threads/t1/messages"),
            "http://localhost:2000/api/v1/threads/t1/messages"
        );
    }

    #[test]
    fn test_secret_key_from_builder() {
        let client = ApiClient::new(&CoreConfig::default());
        assert!(!client.has_secret_key());
        assert!(client.with_secret_key("sk_1").has_secret_key());
    }
}
