//! Client configuration loaded from the environment

use crate::runtime::TurnSettings;
use crate::stream::DEFAULT_MAX_FRAME_BYTES;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_CHAT_ENDPOINT: &str = "http://localhost:8001/chat_with_pdf";
const DEFAULT_DOCUMENT_ENDPOINT: &str = "http://localhost:8001/download_document";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;

/// Session credentials attached to every request
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Sent verbatim as the `Cookie` header
    pub session_cookie: Option<String>,
    /// Sent as `Authorization: Bearer <token>`
    pub bearer_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("session_cookie", &self.session_cookie.as_ref().map(|_| "<redacted>"))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Endpoints, credentials and stream limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// `POST <chat_endpoint>/<document id>`
    pub chat_endpoint: String,
    /// `GET <document_endpoint>/<document id>`
    pub document_endpoint: String,
    pub credentials: Credentials,
    pub connect_timeout: Duration,
    /// Longest tolerated gap between response chunks
    pub idle_timeout: Duration,
    pub max_frame_bytes: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ChatConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys use defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            chat_endpoint: get("DOCCHAT_CHAT_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_CHAT_ENDPOINT.to_string()),
            document_endpoint: get("DOCCHAT_DOCUMENT_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_DOCUMENT_ENDPOINT.to_string()),
            credentials: Credentials {
                session_cookie: get("DOCCHAT_SESSION_COOKIE"),
                bearer_token: get("DOCCHAT_BEARER_TOKEN"),
            },
            connect_timeout: Duration::from_secs(parse_or(
                "DOCCHAT_CONNECT_TIMEOUT_SECS",
                get("DOCCHAT_CONNECT_TIMEOUT_SECS"),
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
            idle_timeout: Duration::from_secs(parse_or(
                "DOCCHAT_IDLE_TIMEOUT_SECS",
                get("DOCCHAT_IDLE_TIMEOUT_SECS"),
                DEFAULT_IDLE_TIMEOUT_SECS,
            )),
            max_frame_bytes: parse_or(
                "DOCCHAT_MAX_FRAME_BYTES",
                get("DOCCHAT_MAX_FRAME_BYTES"),
                DEFAULT_MAX_FRAME_BYTES,
            ),
        }
    }

    pub fn turn_settings(&self) -> TurnSettings {
        TurnSettings {
            idle_timeout: self.idle_timeout,
            max_frame_bytes: self.max_frame_bytes,
        }
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> T
where
    T: FromStr + fmt::Display + Copy,
{
    let Some(raw) = value else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(parsed) => parsed,
        Err(_) => {
            tracing::warn!(key, value = %raw, default = %default, "Unparseable setting, using default");
            default
        }
    }
}
