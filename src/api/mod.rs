//! REST client for the messenger API.
//!
//! Every call comes in two flavours: `try_*` returns the failure to the
//! caller, the plain method logs it and returns fixed fallback data from
//! [`fallback`] so the client keeps working without a server.

pub mod fallback;

use crate::config::ApiConfig;
use crate::model::{Ack, Chat, LoginRequest, LoginResponse, Message, ProfileUpdate, User, UserStatus};
use crate::session::TokenProvider;
use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client for the messenger REST API.
///
/// Authenticates with the session's bearer token when one is present.
pub struct ApiClient {
    base_url: String,
    http_client: Client,
    tokens: Arc<dyn TokenProvider>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent("courier/0.1")
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
            tokens,
        })
    }

    /// Create a client with a custom base URL (for testing with a mock server).
    pub fn with_base_url(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let config = ApiConfig {
            base_url: base_url.into(),
            ..ApiConfig::default()
        };
        Self::new(&config, tokens)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http_client
            .request(method.clone(), &url)
            .header("Accept", "application/json");
        if let Some(token) = self.tokens.token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        debug!(method = %method, path = %path, "Sending API request");
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send {} {}", method, path))?;

        check_response_status(&response)?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse {} {} response", method, path))
    }

    // ── strict calls ────────────────────────────────────────────────────────

    /// POST /auth/login
    pub async fn try_login(&self, credentials: &LoginRequest) -> Result<LoginResponse> {
        let body = serde_json::to_value(credentials).context("Failed to encode credentials")?;
        self.request(Method::POST, "/auth/login", Some(body)).await
    }

    /// POST /auth/logout
    pub async fn try_logout(&self) -> Result<Ack> {
        self.request(Method::POST, "/auth/logout", None).await
    }

    /// GET /auth/me
    pub async fn try_current_user(&self) -> Result<User> {
        self.request(Method::GET, "/auth/me", None).await
    }

    /// GET /chats
    pub async fn try_get_chats(&self) -> Result<Vec<Chat>> {
        self.request(Method::GET, "/chats", None).await
    }

    /// GET /chats/:chatId/messages
    pub async fn try_get_messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        let path = format!("/chats/{}/messages", urlencoding::encode(chat_id));
        self.request(Method::GET, &path, None).await
    }

    /// POST /chats/:chatId/messages
    pub async fn try_send_message(&self, chat_id: &str, content: &str) -> Result<Message> {
        let path = format!("/chats/{}/messages", urlencoding::encode(chat_id));
        let body = json!({ "content": content, "type": "text" });
        self.request(Method::POST, &path, Some(body)).await
    }

    /// PUT /users/profile
    pub async fn try_update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        let body = serde_json::to_value(update).context("Failed to encode profile update")?;
        self.request(Method::PUT, "/users/profile", Some(body)).await
    }

    /// PUT /users/status
    pub async fn try_update_status(&self, status: UserStatus) -> Result<Ack> {
        let body = json!({ "status": status });
        self.request(Method::PUT, "/users/status", Some(body)).await
    }

    // ── calls with fallback data ────────────────────────────────────────────

    pub async fn login(&self, credentials: &LoginRequest) -> LoginResponse {
        or_fallback("/auth/login", self.try_login(credentials).await, || {
            fallback::login(credentials)
        })
    }

    pub async fn logout(&self) -> Ack {
        or_fallback("/auth/logout", self.try_logout().await, fallback::ack)
    }

    pub async fn current_user(&self) -> User {
        or_fallback("/auth/me", self.try_current_user().await, || {
            fallback::demo_user(fallback::DEMO_EMAIL)
        })
    }

    pub async fn get_chats(&self) -> Vec<Chat> {
        or_fallback("/chats", self.try_get_chats().await, fallback::chats)
    }

    pub async fn get_messages(&self, chat_id: &str) -> Vec<Message> {
        or_fallback(
            "/chats/:chatId/messages",
            self.try_get_messages(chat_id).await,
            || fallback::messages(chat_id),
        )
    }

    pub async fn send_message(&self, chat_id: &str, content: &str) -> Message {
        or_fallback(
            "/chats/:chatId/messages",
            self.try_send_message(chat_id, content).await,
            || fallback::sent_message(chat_id, content),
        )
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> User {
        or_fallback(
            "/users/profile",
            self.try_update_profile(update).await,
            || fallback::updated_profile(update),
        )
    }

    pub async fn update_status(&self, status: UserStatus) -> Ack {
        or_fallback("/users/status", self.try_update_status(status).await, fallback::ack)
    }
}

fn or_fallback<T>(endpoint: &str, result: Result<T>, fallback: impl FnOnce() -> T) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(endpoint = %endpoint, error = %format!("{:#}", e), "API call failed, using fallback data");
            fallback()
        }
    }
}

/// Map error statuses to descriptive errors.
///
/// - 401 → session token missing or rejected
/// - Other non-2xx → generic API error
fn check_response_status(response: &reqwest::Response) -> Result<()> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(anyhow!("API auth error: session token missing or rejected")),
        s if !s.is_success() => Err(anyhow!("API error: {}", s)),
        _ => Ok(()),
    }
}
