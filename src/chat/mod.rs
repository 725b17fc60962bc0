//! Conversation view model.
//!
//! [`ChatBoard`] holds the chat list and the open conversation and is
//! registered as a realtime [`Listener`], so `new_message` events land in
//! both as they arrive.

pub mod format;

use crate::api::ApiClient;
use crate::config::SharedPreferences;
use crate::model::{initial, Chat, Message};
use crate::realtime::{Inbound, Listener, ServerEvent};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Chats whose display name contains `query`, ignoring case.
///
/// Chats without a display name never match.
pub fn filter_chats<'a>(chats: &'a [Chat], query: &str) -> Vec<&'a Chat> {
    let needle = query.to_lowercase();
    chats
        .iter()
        .filter(|chat| {
            chat.display_name()
                .is_some_and(|name| name.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Messages sharing one calendar day
#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub messages: Vec<Message>,
}

/// Group messages by UTC date.
///
/// Groups appear in order of each date's first message; messages keep their
/// relative order inside a group.
pub fn group_by_date(messages: &[Message]) -> Vec<DayGroup> {
    let mut groups: Vec<DayGroup> = Vec::new();
    for message in messages {
        let date = message.timestamp.date_naive();
        match groups.iter_mut().find(|g| g.date == date) {
            Some(group) => group.messages.push(message.clone()),
            None => groups.push(DayGroup {
                date,
                messages: vec![message.clone()],
            }),
        }
    }
    groups
}

/// Whether the sender avatar is drawn next to `day[index]`.
///
/// Only incoming messages carry one, and only the last of a run of
/// consecutive messages from the same sender within the day.
pub fn show_avatar(day: &[Message], index: usize, own_user_id: Option<&str>) -> bool {
    let Some(message) = day.get(index) else {
        return false;
    };
    if own_user_id == Some(message.sender_id.as_str()) {
        return false;
    }
    match day.get(index + 1) {
        Some(next) => next.sender_id != message.sender_id,
        None => true,
    }
}

/// One line in the chat list
#[derive(Debug, Clone, PartialEq)]
pub struct SidebarEntry {
    pub chat_id: String,
    pub name: String,
    pub avatar: Option<String>,
    /// Shown when there is no avatar image
    pub initial: Option<char>,
    pub preview: String,
    pub timestamp: Option<String>,
    pub unread_count: u32,
    pub selected: bool,
}

/// One message bubble in the open conversation
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub message: Message,
    pub own: bool,
    pub show_avatar: bool,
    /// Sender avatar and initial, set only when `show_avatar` is
    pub sender_avatar: Option<String>,
    pub sender_initial: Option<char>,
    pub time: String,
    /// Delivery ticks, outgoing messages only
    pub ticks: Option<&'static str>,
}

/// A day separator followed by that day's rows
#[derive(Debug, Clone, PartialEq)]
pub struct DaySection {
    pub label: String,
    pub rows: Vec<MessageRow>,
}

/// Notification raised for an incoming message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub chat_id: String,
    pub title: String,
    pub body: String,
    pub sound: bool,
    pub desktop: bool,
}

/// What applying a `new_message` event changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied {
    /// The message's chat is in the list
    pub chat_updated: bool,
    /// The message was appended to the open conversation
    pub appended: bool,
    pub notification: Option<Notification>,
}

#[derive(Default)]
struct BoardState {
    chats: Vec<Chat>,
    selected: Option<String>,
    messages: Vec<Message>,
}

/// Chat list plus the currently open conversation
pub struct ChatBoard {
    own_user_id: Option<String>,
    preferences: SharedPreferences,
    state: Mutex<BoardState>,
    notification_tx: broadcast::Sender<Notification>,
}

impl ChatBoard {
    pub fn new(own_user_id: Option<String>, preferences: SharedPreferences) -> Self {
        let (notification_tx, _) = broadcast::channel(100);
        Self {
            own_user_id,
            preferences,
            state: Mutex::new(BoardState::default()),
            notification_tx,
        }
    }

    /// Receive notifications raised from now on
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notification_tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_chats(&self, chats: Vec<Chat>) {
        let mut state = self.lock();
        if let Some(selected) = &state.selected {
            if !chats.iter().any(|c| &c.id == selected) {
                state.selected = None;
                state.messages.clear();
            }
        }
        state.chats = chats;
    }

    pub fn chats(&self) -> Vec<Chat> {
        self.lock().chats.clone()
    }

    pub fn chat(&self, chat_id: &str) -> Option<Chat> {
        self.lock().chats.iter().find(|c| c.id == chat_id).cloned()
    }

    /// Open a conversation. Clears the message pane until
    /// [`set_messages`](Self::set_messages) delivers its history.
    pub fn select_chat(&self, chat_id: &str) -> bool {
        let mut state = self.lock();
        if !state.chats.iter().any(|c| c.id == chat_id) {
            return false;
        }
        state.selected = Some(chat_id.to_string());
        state.messages.clear();
        true
    }

    pub fn selected(&self) -> Option<String> {
        self.lock().selected.clone()
    }

    /// Install fetched history. Ignored if another chat was opened meanwhile.
    pub fn set_messages(&self, chat_id: &str, messages: Vec<Message>) -> bool {
        let mut state = self.lock();
        if state.selected.as_deref() != Some(chat_id) {
            debug!(chat_id = %chat_id, "Discarding history for a chat that is no longer open");
            return false;
        }
        state.messages = messages;
        true
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    /// Send a draft to the open chat.
    ///
    /// The draft is trimmed; nothing is sent when it is blank, when no chat
    /// is open or when no user is signed in. The returned message is
    /// recorded with [`record_sent`](Self::record_sent).
    pub async fn send(&self, api: &ApiClient, draft: &str) -> Option<Message> {
        let content = draft.trim();
        if content.is_empty() || self.own_user_id.is_none() {
            return None;
        }
        let chat_id = self.selected()?;

        let message = api.send_message(&chat_id, content).await;
        debug!(chat_id = %chat_id, message_id = %message.id, "Message sent");
        self.record_sent(message.clone());
        Some(message)
    }

    /// Record a message the user sent: appended to the open conversation and
    /// made the chat's last message. Unread count is untouched.
    pub fn record_sent(&self, message: Message) {
        let mut state = self.lock();
        if state.selected.as_deref() == Some(message.chat_id.as_str()) {
            state.messages.push(message.clone());
        }
        if let Some(chat) = state.chats.iter_mut().find(|c| c.id == message.chat_id) {
            chat.last_message = Some(message);
        }
    }

    /// Apply an incoming message.
    ///
    /// The message is appended when its chat is open, and its chat (if
    /// listed) gets it as last message with the unread count bumped by one.
    pub fn apply_new_message(&self, message: &Message) -> Applied {
        let mut state = self.lock();
        let mut applied = Applied::default();

        if state.selected.as_deref() == Some(message.chat_id.as_str()) {
            state.messages.push(message.clone());
            applied.appended = true;
        }

        let mut title = None;
        if let Some(chat) = state.chats.iter_mut().find(|c| c.id == message.chat_id) {
            chat.last_message = Some(message.clone());
            chat.unread_count = chat.unread_count.saturating_add(1);
            applied.chat_updated = true;
            title = chat.display_name().map(str::to_string);
        }

        drop(state);

        applied.notification = self.notification_for(message, title);
        if let Some(notification) = &applied.notification {
            // No receivers is fine
            let _ = self.notification_tx.send(notification.clone());
        }
        applied
    }

    fn notification_for(&self, message: &Message, title: Option<String>) -> Option<Notification> {
        if self.own_user_id.as_deref() == Some(message.sender_id.as_str()) {
            return None;
        }
        let preferences = self.preferences.read().unwrap_or_else(|e| e.into_inner());
        if !preferences.should_notify() {
            return None;
        }
        Some(Notification {
            chat_id: message.chat_id.clone(),
            title: title.unwrap_or_else(|| "New message".to_string()),
            body: message.content.clone(),
            sound: preferences.should_play_sound(),
            desktop: preferences.should_show_desktop(),
        })
    }

    /// Reset the unread badge of a chat
    pub fn mark_read(&self, chat_id: &str) -> bool {
        let mut state = self.lock();
        match state.chats.iter_mut().find(|c| c.id == chat_id) {
            Some(chat) => {
                chat.unread_count = 0;
                true
            }
            None => false,
        }
    }

    /// Chat list filtered by `query`, labelled relative to `now`
    pub fn sidebar(&self, query: &str, now: DateTime<Utc>) -> Vec<SidebarEntry> {
        let state = self.lock();
        filter_chats(&state.chats, query)
            .into_iter()
            .map(|chat| SidebarEntry {
                chat_id: chat.id.clone(),
                name: chat.display_name().unwrap_or_default().to_string(),
                avatar: chat.avatar().map(str::to_string),
                initial: chat.display_name().and_then(initial),
                preview: chat.preview().to_string(),
                timestamp: chat
                    .last_message
                    .as_ref()
                    .map(|m| format::sidebar_timestamp(m.timestamp, now)),
                unread_count: chat.unread_count,
                selected: state.selected.as_deref() == Some(chat.id.as_str()),
            })
            .collect()
    }

    /// Open conversation laid out as day sections relative to `today`
    pub fn conversation(&self, today: NaiveDate) -> Vec<DaySection> {
        let (messages, chat) = {
            let state = self.lock();
            let chat = state
                .selected
                .as_deref()
                .and_then(|id| state.chats.iter().find(|c| c.id == id))
                .cloned();
            (state.messages.clone(), chat)
        };
        let own = self.own_user_id.as_deref();
        group_by_date(&messages)
            .into_iter()
            .map(|group| {
                let rows = group
                    .messages
                    .iter()
                    .enumerate()
                    .map(|(index, message)| {
                        let is_own = own == Some(message.sender_id.as_str());
                        let with_avatar = show_avatar(&group.messages, index, own);
                        let sender = chat
                            .as_ref()
                            .filter(|_| with_avatar)
                            .and_then(|c| c.participant(&message.sender_id));
                        MessageRow {
                            message: message.clone(),
                            own: is_own,
                            show_avatar: with_avatar,
                            sender_avatar: sender.and_then(|p| p.avatar.clone()),
                            sender_initial: sender.and_then(|p| initial(&p.username)),
                            time: format::format_time(message.timestamp),
                            ticks: is_own.then(|| message.status.ticks()),
                        }
                    })
                    .collect();
                DaySection {
                    label: format::day_label(group.date, today),
                    rows,
                }
            })
            .collect()
    }
}

impl Listener for ChatBoard {
    fn on_message(&self, inbound: &Inbound) -> Result<()> {
        match inbound.event() {
            Some(ServerEvent::NewMessage { message }) => {
                let applied = self.apply_new_message(message);
                info!(
                    chat_id = %message.chat_id,
                    message_id = %message.id,
                    appended = applied.appended,
                    notify = applied.notification.is_some(),
                    "New message"
                );
            }
            None => debug!(kind = ?inbound.kind(), "Ignoring realtime frame"),
        }
        Ok(())
    }
}
