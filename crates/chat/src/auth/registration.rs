//! Account registration and lookup over the registration socket
//!
//! Each exchange opens a socket, sends one request frame, and reads frames
//! until the matching response type arrives. Frames of other types are
//! skipped.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::hash_password;
use super::validation::{is_valid_email, validate_registration};
use crate::error::{ChatError, ChatResult};
use crate::models::UserId;

const ADD_USER: &str = "add_user_to_data_base";
const GET_USER_INFO: &str = "get_user_info_from_data_base";
const STATUS_SUCCESS: &str = "success";

/// A connected text-frame socket
pub trait SocketTransport {
    fn send_text(&mut self, frame: &str) -> ChatResult<()>;

    /// Next text frame; `None` once the peer has closed
    fn recv_text(&mut self) -> ChatResult<Option<String>>;

    fn close(&mut self);
}

/// Opens a transport for each exchange
pub trait SocketConnector {
    fn connect(&self, url: &str) -> ChatResult<Box<dyn SocketTransport>>;
}

/// WebSocket transport over tungstenite's blocking client
pub struct WsTransport {
    socket: tungstenite::WebSocket<tungstenite::stream::MaybeTlsStream<std::net::TcpStream>>,
}

impl WsTransport {
    pub fn connect(url: &str) -> ChatResult<Self> {
        let (socket, _response) = tungstenite::connect(url)
            .map_err(|e| ChatError::transport(format!("failed to connect to {}: {}", url, e)))?;
        Ok(Self { socket })
    }
}

impl SocketTransport for WsTransport {
    fn send_text(&mut self, frame: &str) -> ChatResult<()> {
        self.socket
            .send(tungstenite::Message::Text(frame.to_string()))
            .map_err(|e| ChatError::transport(format!("socket send failed: {}", e)))
    }

    fn recv_text(&mut self) -> ChatResult<Option<String>> {
        loop {
            match self.socket.read() {
                Ok(tungstenite::Message::Text(text)) => return Ok(Some(text)),
                Ok(tungstenite::Message::Close(_)) => return Ok(None),
                // Pings are answered by tungstenite itself
                Ok(_) => continue,
                Err(tungstenite::Error::ConnectionClosed) => return Ok(None),
                Err(e) => return Err(ChatError::transport(format!("socket read failed: {}", e))),
            }
        }
    }

    fn close(&mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}

/// Connector for real WebSocket endpoints
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl SocketConnector for WsConnector {
    fn connect(&self, url: &str) -> ChatResult<Box<dyn SocketTransport>> {
        Ok(Box::new(WsTransport::connect(url)?))
    }
}

#[derive(Debug, Serialize)]
struct RequestFrame<'a, C: Serialize> {
    #[serde(rename = "type")]
    kind: &'a str,
    user_id: &'a str,
    content: C,
}

#[derive(Debug, Serialize)]
struct NewAccount<'a> {
    user_id: &'a str,
    email: &'a str,
    password: String,
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: String,
}

#[derive(Debug, Deserialize)]
struct ResponseFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Value,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    user_exists: bool,
    #[serde(default)]
    user_id: Option<UserId>,
}

/// Client for the registration socket
pub struct RegistrationClient<C: SocketConnector = WsConnector> {
    url: String,
    connector: C,
}

impl RegistrationClient<WsConnector> {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_connector(url, WsConnector)
    }
}

impl<C: SocketConnector> RegistrationClient<C> {
    pub fn with_connector(url: impl Into<String>, connector: C) -> Self {
        Self {
            url: url.into(),
            connector,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Create an account. The password is validated, then sent as its digest.
    pub fn register(&self, nickname: &str, email: &str, password: &str) -> ChatResult<UserId> {
        let nickname = nickname.trim();
        let email = email.trim();
        validate_registration(nickname, email, password)?;

        let request = RequestFrame {
            kind: ADD_USER,
            user_id: nickname,
            content: NewAccount {
                user_id: nickname,
                email,
                password: hash_password(password),
            },
        };
        let content = self.exchange(&request)?;

        if content.status == STATUS_SUCCESS {
            info!("Registered account {}", nickname);
            Ok(UserId::new(nickname))
        } else {
            Err(ChatError::conflict(
                content
                    .message
                    .unwrap_or_else(|| "registration rejected".to_string()),
            ))
        }
    }

    /// Resolve the user id for an email and password pair
    pub fn lookup_user(&self, email: &str, password: &str) -> ChatResult<UserId> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(ChatError::validation(format!("invalid email address: {}", email)));
        }
        if password.is_empty() {
            return Err(ChatError::validation("password is required"));
        }

        let request = RequestFrame {
            kind: GET_USER_INFO,
            user_id: "temp",
            content: Credentials {
                email,
                password: hash_password(password),
            },
        };
        let content = self.exchange(&request)?;

        match content.user_id {
            Some(user_id) if content.status == STATUS_SUCCESS && content.user_exists => Ok(user_id),
            _ => Err(ChatError::conflict(
                content
                    .message
                    .unwrap_or_else(|| "Incorrect email or password.".to_string()),
            )),
        }
    }

    fn exchange<T: Serialize>(&self, request: &RequestFrame<'_, T>) -> ChatResult<ResponseContent> {
        let frame = serde_json::to_string(request)
            .map_err(|e| ChatError::protocol(format!("failed to encode request: {}", e)))?;
        let expected = format!("{}_response", request.kind);

        let mut socket = self.connector.connect(&self.url)?;
        debug!("Sending {} request to {}", request.kind, self.url);
        let result = send_and_await(socket.as_mut(), &frame, &expected);
        socket.close();
        result
    }
}

fn send_and_await(
    socket: &mut dyn SocketTransport,
    frame: &str,
    expected: &str,
) -> ChatResult<ResponseContent> {
    socket.send_text(frame)?;

    while let Some(text) = socket.recv_text()? {
        let response: ResponseFrame = serde_json::from_str(&text)
            .map_err(|e| ChatError::protocol(format!("invalid response frame: {}", e)))?;
        if response.kind != expected {
            debug!("Ignoring {} frame while waiting for {}", response.kind, expected);
            continue;
        }
        return serde_json::from_value(response.content)
            .map_err(|e| ChatError::protocol(format!("invalid {} content: {}", expected, e)));
    }

    Err(ChatError::transport(format!(
        "socket closed before {} arrived",
        expected
    )))
}
