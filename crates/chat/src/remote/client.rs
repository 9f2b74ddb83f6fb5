//! HTTP client for the session backend
//!
//! Uses synchronous HTTP (ureq) to be executor-agnostic. All bodies are JSON.

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::ChatBackend;
use super::api::{
    AddChatRequest, AddChatResponse, ChatsLoadedResponse, INVALID_USER_STATUS, LoginRequest,
    NewChatsResponse, SendMessageRequest,
};
use crate::config::ClientSettings;
use crate::error::{ChatError, ChatResult};
use crate::models::{Message, UserId, format_timestamp};

/// Session backend client speaking JSON over HTTP
pub struct HttpChatBackend {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpChatBackend {
    /// Create a client for the backend configured in `settings`
    pub fn new(settings: &ClientSettings) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(settings.request_timeout()))
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
            base_url: settings.api_root().to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> ChatResult<T> {
        let context = format!("GET /api/{}", path);
        debug!("{}", context);

        let mut response = self
            .agent
            .get(&self.url(path))
            .call()
            .map_err(|e| transport_error(e, &context))?;

        response
            .body_mut()
            .read_json()
            .map_err(|e| ChatError::protocol(format!("{}: unreadable response: {}", context, e)))
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ChatResult<T> {
        let context = format!("POST /api/{}", path);
        debug!("{}", context);

        let mut response = self
            .agent
            .post(&self.url(path))
            .send_json(body)
            .map_err(|e| transport_error(e, &context))?;

        response
            .body_mut()
            .read_json()
            .map_err(|e| ChatError::protocol(format!("{}: unreadable response: {}", context, e)))
    }
}

/// Map a ureq failure onto the transport error taxonomy
fn transport_error(error: ureq::Error, context: &str) -> ChatError {
    match error {
        ureq::Error::StatusCode(code) => ChatError::status(code, context),
        other => ChatError::transport(format!("{} failed: {}", context, other)),
    }
}

/// Percent-encode one path segment
fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn messages_path(user_id: &UserId, partner: &UserId) -> String {
    format!(
        "get_messages/{}/{}",
        segment(user_id.as_str()),
        segment(partner.as_str())
    )
}

fn new_messages_path(user_id: &UserId, partner: &UserId, since: &DateTime<Utc>) -> String {
    format!(
        "get_new_messages/{}/{}/{}",
        segment(user_id.as_str()),
        segment(partner.as_str()),
        segment(&format_timestamp(since))
    )
}

impl ChatBackend for HttpChatBackend {
    fn login(&self, user_id: &UserId, password_digest: &str) -> ChatResult<()> {
        let body = LoginRequest {
            user_id: user_id.clone(),
            password: password_digest.to_string(),
        };
        let _: serde_json::Value = self.post_json("login", &body)?;
        Ok(())
    }

    fn chats_loaded(&self) -> ChatResult<bool> {
        let response: ChatsLoadedResponse = self.get_json("chats_loaded")?;
        Ok(response.loaded)
    }

    fn list_chats(&self, user_id: &UserId) -> ChatResult<Vec<UserId>> {
        self.get_json(&format!("get_chats/{}", segment(user_id.as_str())))
    }

    fn add_chat(&self, user_id: &UserId, target: &UserId) -> ChatResult<()> {
        let body = AddChatRequest {
            user_id: user_id.clone(),
            target_user_id: target.clone(),
        };
        let response: AddChatResponse = self.post_json("add_chat", &body)?;

        if response.status == INVALID_USER_STATUS {
            return Err(ChatError::conflict(format!("invalid user id: {}", target)));
        }
        Ok(())
    }

    fn get_messages(&self, user_id: &UserId, partner: &UserId) -> ChatResult<Vec<Message>> {
        self.get_json(&messages_path(user_id, partner))
    }

    fn get_new_messages(
        &self,
        user_id: &UserId,
        partner: &UserId,
        since: &DateTime<Utc>,
    ) -> ChatResult<Vec<Message>> {
        self.get_json(&new_messages_path(user_id, partner, since))
    }

    fn send_message(
        &self,
        user_id: &UserId,
        target: &UserId,
        text: &str,
        timestamp: &DateTime<Utc>,
    ) -> ChatResult<()> {
        let body = SendMessageRequest {
            user_id: user_id.clone(),
            target_user_id: target.clone(),
            text: text.to_string(),
            timestamp: format_timestamp(timestamp),
        };
        let _: serde_json::Value = self.post_json("send_message", &body)?;
        Ok(())
    }

    fn new_chats(&self) -> ChatResult<Vec<UserId>> {
        let response: NewChatsResponse = self.get_json("new_chats")?;
        Ok(response.new_chats)
    }

    fn close_application(&self) -> ChatResult<()> {
        let _: serde_json::Value = self.post_json("close_application", &serde_json::json!({}))?;
        Ok(())
    }
}
