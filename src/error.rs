//! Error types for the chat core
//!
//! Only [`TransportError`] ends a turn. [`ParseError`] is absorbed by the
//! router and [`InvalidStateError`] rejects a call without changing anything.

use std::time::Duration;
use thiserror::Error;

/// Request, connection or mid-stream failure with classification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Auth, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ServerError, message)
    }

    pub fn http_status(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::HttpStatus, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Protocol, message)
    }

    pub fn idle_timeout(after: Duration) -> Self {
        Self::new(
            TransportErrorKind::IdleTimeout,
            format!("no data received for {}s", after.as_secs_f64()),
        )
    }

    /// Classify a non-2xx HTTP status
    pub fn from_status(status: u16, detail: &str) -> Self {
        match status {
            401 | 403 => Self::auth(format!("Authentication failed ({status}): {detail}")),
            429 => Self::rate_limit(format!("Rate limit exceeded: {detail}")),
            500..=599 => Self::server_error(format!("Server error ({status}): {detail}")),
            _ => Self::http_status(format!("HTTP {status}: {detail}")),
        }
    }
}

/// Transport failure classification
///
/// Every kind is fatal for the current turn; a dropped stream is never resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connect failure, reset, or body read error
    Network,
    /// 401/403 from the session/identity provider
    Auth,
    /// 429
    RateLimit,
    /// 5xx
    ServerError,
    /// Any other non-2xx status
    HttpStatus,
    /// Stream violated framing limits
    Protocol,
    /// Gap between chunks exceeded the configured bound
    IdleTimeout,
}

impl TransportErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::ServerError => "server_error",
            Self::HttpStatus => "http_status",
            Self::Protocol => "protocol",
            Self::IdleTimeout => "idle_timeout",
        }
    }
}

/// A frame payload that is not a well-formed event object
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed frame payload ({reason}): {payload}")]
pub struct ParseError {
    pub payload: String,
    pub reason: String,
}

/// A call that is not allowed in the current turn state
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum InvalidStateError {
    #[error("a turn is already in flight")]
    TurnInFlight,
    #[error("message is empty")]
    EmptyMessage,
    #[error("assistant placeholder already exists for this turn")]
    PlaceholderExists,
    #[error("no turn is in flight")]
    NoActiveTurn,
    #[error("assistant handle belongs to a finished turn")]
    StaleHandle,
    #[error("turn has not reached a terminal state")]
    NotTerminal,
}
