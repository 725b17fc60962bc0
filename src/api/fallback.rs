//! Fixed data returned when the API cannot be reached, so the client keeps
//! working offline with a demo account.

use crate::model::{
    Ack, Chat, LoginRequest, LoginResponse, Message, MessageKind, MessageStatus, ProfileUpdate,
    User, UserStatus,
};
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

pub const DEMO_USER_ID: &str = "user_123";
pub const DEMO_USERNAME: &str = "demo_user";
pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_AVATAR: &str = "/avatars/demo_user.png";
pub const DEMO_TOKEN: &str = "demo_token_123456789";

fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .unwrap_or_default()
}

fn contact(id: &str, username: &str, email: &str, status: UserStatus) -> User {
    User {
        id: id.to_string(),
        username: username.to_string(),
        email: email.to_string(),
        avatar: None,
        status,
        last_seen: None,
    }
}

fn message(
    id: &str,
    chat_id: &str,
    sender_id: &str,
    content: &str,
    timestamp: DateTime<Utc>,
    kind: MessageKind,
    status: MessageStatus,
) -> Message {
    Message {
        id: id.to_string(),
        chat_id: chat_id.to_string(),
        sender_id: sender_id.to_string(),
        content: content.to_string(),
        timestamp,
        kind,
        status,
    }
}

pub fn demo_user(email: &str) -> User {
    User {
        id: DEMO_USER_ID.to_string(),
        username: DEMO_USERNAME.to_string(),
        email: email.to_string(),
        avatar: Some(DEMO_AVATAR.to_string()),
        status: UserStatus::Online,
        last_seen: None,
    }
}

pub fn login(request: &LoginRequest) -> LoginResponse {
    LoginResponse {
        user: demo_user(&request.email),
        token: DEMO_TOKEN.to_string(),
    }
}

pub fn ack() -> Ack {
    Ack { success: true }
}

pub fn chats() -> Vec<Chat> {
    vec![
        Chat {
            id: "chat_1".to_string(),
            participants: vec![contact(
                "user_456",
                "Family",
                "family@example.com",
                UserStatus::Online,
            )],
            last_message: Some(message(
                "msg_1",
                "chat_1",
                "user_456",
                "Image",
                at(2025, 8, 20, 14, 30),
                MessageKind::Image,
                MessageStatus::Read,
            )),
            unread_count: 0,
            is_group: true,
            group_name: Some("Family".to_string()),
            group_avatar: None,
            created_at: at(2025, 8, 20, 14, 30),
        },
        Chat {
            id: "chat_2".to_string(),
            participants: vec![contact(
                "user_789",
                "Aaron Philip",
                "aaron@example.com",
                UserStatus::Online,
            )],
            last_message: Some(message(
                "msg_2",
                "chat_2",
                "user_789",
                "everything should work",
                at(2025, 8, 24, 13, 0),
                MessageKind::Text,
                MessageStatus::Delivered,
            )),
            unread_count: 0,
            is_group: false,
            group_name: None,
            group_avatar: None,
            created_at: at(2025, 8, 24, 13, 0),
        },
        Chat {
            id: "chat_3".to_string(),
            participants: vec![contact(
                "user_101",
                "6th floor boys",
                "group@example.com",
                UserStatus::Away,
            )],
            last_message: Some(message(
                "msg_3",
                "chat_3",
                "user_102",
                "🙂 to \"Sax sux\"",
                at(2025, 8, 24, 11, 49),
                MessageKind::Text,
                MessageStatus::Read,
            )),
            unread_count: 2,
            is_group: true,
            group_name: Some("6th floor boys".to_string()),
            group_avatar: None,
            created_at: at(2025, 8, 24, 11, 49),
        },
    ]
}

pub fn messages(chat_id: &str) -> Vec<Message> {
    vec![
        message(
            "msg_1",
            chat_id,
            "user_456",
            "Hey! How are you doing?",
            at(2025, 8, 24, 10, 0),
            MessageKind::Text,
            MessageStatus::Read,
        ),
        message(
            "msg_2",
            chat_id,
            DEMO_USER_ID,
            "I'm doing great! Just working on some new projects.",
            at(2025, 8, 24, 10, 5),
            MessageKind::Text,
            MessageStatus::Read,
        ),
        message(
            "msg_3",
            chat_id,
            "user_456",
            "That sounds awesome! Would love to hear more about it.",
            at(2025, 8, 24, 10, 10),
            MessageKind::Text,
            MessageStatus::Read,
        ),
    ]
}

/// Locally built message standing in for the server's echo
pub fn sent_message(chat_id: &str, content: &str) -> Message {
    Message {
        id: format!("msg_{}", Uuid::now_v7().simple()),
        chat_id: chat_id.to_string(),
        sender_id: DEMO_USER_ID.to_string(),
        content: content.to_string(),
        timestamp: Utc::now(),
        kind: MessageKind::Text,
        status: MessageStatus::Sent,
    }
}

pub fn updated_profile(update: &ProfileUpdate) -> User {
    User {
        id: DEMO_USER_ID.to_string(),
        username: update
            .username
            .clone()
            .unwrap_or_else(|| DEMO_USERNAME.to_string()),
        email: update.email.clone().unwrap_or_else(|| DEMO_EMAIL.to_string()),
        avatar: Some(
            update
                .avatar
                .clone()
                .unwrap_or_else(|| DEMO_AVATAR.to_string()),
        ),
        status: update.status.unwrap_or(UserStatus::Online),
        last_seen: None,
    }
}
