use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::api::models::{ChatRequest, ChatResponse, HistoryItem, HistoryResponse, SessionInfo};
use crate::client::state::FailureCause;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server unreachable: {0}")]
    Offline(String),
    #[error("not authorized: {0}")]
    AuthExpired(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
}

impl ClientError {
    pub fn cause(&self) -> FailureCause {
        match self {
            ClientError::Offline(_) => FailureCause::Offline,
            ClientError::AuthExpired(_) => FailureCause::AuthExpired,
            ClientError::Server { .. } => FailureCause::Server,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    code: Option<String>,
}

/// Bearer-authenticated client for the chat HTTP surface.
pub struct HttpChatClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpChatClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Unauthenticated liveness probe.
    pub async fn health(&self) -> bool {
        match self.client.get(format!("{}/health", self.base_url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionInfo>, ClientError> {
        self.send(self.client.get(format!("{}/sessions", self.base_url))).await
    }

    pub async fn create_session(&self) -> Result<SessionInfo, ClientError> {
        self.send(self.client.post(format!("{}/sessions", self.base_url))).await
    }

    pub async fn history(&self, session_id: &str) -> Result<Vec<HistoryItem>, ClientError> {
        let response: HistoryResponse = self
            .send(
                self.client
                    .get(format!("{}/sessions/{}/history", self.base_url, session_id)),
            )
            .await?;
        Ok(response.history)
    }

    pub async fn submit_turn(
        &self,
        session_id: Option<&str>,
        message: &str,
        language: &str,
    ) -> Result<ChatResponse, ClientError> {
        let body = ChatRequest {
            user_message: message.to_string(),
            session_id: session_id.map(str::to_string),
            language: Some(language.to_string()),
        };
        self.send(self.client.post(format!("{}/chat", self.base_url)).json(&body))
            .await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .send(
                self.client
                    .delete(format!("{}/sessions/{}", self.base_url, session_id)),
            )
            .await?;
        Ok(())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ClientError::Offline(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| ClientError::Server {
                status: status.as_u16(),
                message: format!("unreadable response: {}", e),
            });
        }

        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ErrorBody>(&text).ok();
        let message = body
            .as_ref()
            .map(|b| match &b.code {
                Some(code) => format!("{} ({})", b.error, code),
                None => b.error.clone(),
            })
            .unwrap_or(text);

        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::AuthExpired(message));
        }
        Err(ClientError::Server {
            status: status.as_u16(),
            message,
        })
    }
}
