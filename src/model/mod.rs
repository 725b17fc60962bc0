use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;


/// Presence of a user as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Online,
    Offline,
    Away,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStatus::Online => write!(f, "online"),
            UserStatus::Offline => write!(f, "offline"),
            UserStatus::Away => write!(f, "away"),
        }
    }
}

/// Message payload kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
}

/// Delivery status of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    /// Tick marks shown next to an outgoing message
    pub fn ticks(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "✓",
            MessageStatus::Delivered | MessageStatus::Read => "✓✓",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub status: UserStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub status: MessageStatus,
}

/// A conversation, either one-to-one or a group.
///
/// For one-to-one chats the first participant is the other party; groups
/// carry their own name and avatar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub participants: Vec<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    /// Name shown in the sidebar and chat header
    pub fn display_name(&self) -> Option<&str> {
        if self.is_group {
            self.group_name.as_deref()
        } else {
            self.participants.first().map(|p| p.username.as_str())
        }
    }

    pub fn avatar(&self) -> Option<&str> {
        if self.is_group {
            self.group_avatar.as_deref()
        } else {
            self.participants.first().and_then(|p| p.avatar.as_deref())
        }
    }

    /// Header subtitle: participant count for groups, presence otherwise
    pub fn subtitle(&self) -> String {
        if self.is_group {
            format!("{} participants", self.participants.len())
        } else {
            self.participants
                .first()
                .map(|p| p.status)
                .unwrap_or(UserStatus::Offline)
                .to_string()
        }
    }

    /// Preview line under the chat name
    pub fn preview(&self) -> &str {
        match &self.last_message {
            Some(message) if !message.content.is_empty() => &message.content,
            _ => "No messages yet",
        }
    }

    pub fn participant(&self, user_id: &str) -> Option<&User> {
        self.participants.iter().find(|p| p.id == user_id)
    }
}

/// Initial letter used when no avatar image is available
pub fn initial(name: &str) -> Option<char> {
    name.chars().next().and_then(|c| c.to_uppercase().next())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

/// Partial update of the signed-in user's profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
}

/// `{ "success": bool }` acknowledgement returned by several endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}
