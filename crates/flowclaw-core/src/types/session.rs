//! Host session wire types — status, messages, parts.

use serde::{Deserialize, Serialize};

/// State of a host session as reported by `session.status()`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// An agent turn is in flight.
    Active,
    /// The session is waiting for input — the last turn finished.
    Idle,
    /// The session hit an unrecoverable error.
    Error,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Idle => write!(f, "idle"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One entry in the `session.status()` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Host-supplied detail when `state` is `Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionStatus {
    pub fn active() -> Self {
        Self {
            state: SessionState::Active,
            error: None,
        }
    }

    pub fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            state: SessionState::Error,
            error: Some(message.into()),
        }
    }
}

/// Role of a message author inside a session transcript.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// Metadata for one transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInfo {
    pub role: MessageRole,
}

/// One part of a message. Hosts emit more part types than `text`
/// (tool calls, attachments); the adapter only reads the text ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "type")]
    pub part_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            part_type: "text".to_string(),
            text: Some(text.into()),
        }
    }

    pub fn is_text(&self) -> bool {
        self.part_type == "text"
    }
}

/// One transcript entry returned by `session.messages()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    pub info: MessageInfo,
    pub parts: Vec<MessagePart>,
}

impl SessionMessage {
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            info: MessageInfo {
                role: MessageRole::Assistant,
            },
            parts: vec![MessagePart::text(text)],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            info: MessageInfo {
                role: MessageRole::User,
            },
            parts: vec![MessagePart::text(text)],
        }
    }

    /// Concatenate all text parts of this entry.
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter(|p| p.is_text())
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}
