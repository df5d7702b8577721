//! `InboundEvent` implementation for Telegram updates.
//!
//! Tags follow a filter-query style: the update kind (`message`,
//! `edited_message`, `callback_query`) plus `<kind>:<payload>` for the payload
//! it carries, e.g. `message:text`, `message:photo`, `callback_query:data`.

use teloxide::types::{
    CallbackQuery, ChatId, MediaKind, Message, MessageKind, Update, UpdateKind, User, UserId,
};

use promptline_questions::{ConversationIdentity, InboundEvent};

/// A Telegram update as seen by the question engine.
#[derive(Debug, Clone)]
pub struct TelegramEvent {
    bot_id: UserId,
    update: Update,
    tags: Vec<String>,
}

impl TelegramEvent {
    pub fn new(bot_id: UserId, update: Update) -> Self {
        let tags = update_tags(&update);
        Self {
            bot_id,
            update,
            tags,
        }
    }

    pub fn bot_id(&self) -> UserId {
        self.bot_id
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// The message of a `message` or `edited_message` update.
    pub fn message(&self) -> Option<&Message> {
        match &self.update.kind {
            UpdateKind::Message(msg) | UpdateKind::EditedMessage(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn callback_query(&self) -> Option<&CallbackQuery> {
        match &self.update.kind {
            UpdateKind::CallbackQuery(query) => Some(query),
            _ => None,
        }
    }

    pub fn sender(&self) -> Option<&User> {
        match &self.update.kind {
            UpdateKind::Message(msg) | UpdateKind::EditedMessage(msg) => msg.from.as_ref(),
            UpdateKind::CallbackQuery(query) => Some(&query.from),
            _ => None,
        }
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        match &self.update.kind {
            UpdateKind::Message(msg) | UpdateKind::EditedMessage(msg) => Some(msg.chat.id),
            UpdateKind::CallbackQuery(query) => query.message.as_ref().map(|m| m.chat().id),
            _ => None,
        }
    }
}

impl InboundEvent for TelegramEvent {
    fn has(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    fn text(&self) -> Option<&str> {
        match &self.update.kind {
            UpdateKind::Message(msg) | UpdateKind::EditedMessage(msg) => extract_text(msg),
            UpdateKind::CallbackQuery(query) => query.data.as_deref(),
            _ => None,
        }
    }

    fn identity(&self) -> Option<ConversationIdentity> {
        let sender = self.sender();
        let chat = self.chat_id();
        if sender.is_none() && chat.is_none() {
            return None;
        }
        let mut id = ConversationIdentity::new(self.bot_id.0.to_string());
        if let Some(user) = sender {
            id = id.with_user(user.id.0.to_string());
        }
        if let Some(chat) = chat {
            id = id.with_chat(chat.0.to_string());
        }
        Some(id)
    }
}

fn update_tags(update: &Update) -> Vec<String> {
    match &update.kind {
        UpdateKind::Message(msg) => message_tags("message", msg),
        UpdateKind::EditedMessage(msg) => message_tags("edited_message", msg),
        UpdateKind::CallbackQuery(query) => {
            let mut tags = vec!["callback_query".to_string()];
            if query.data.is_some() {
                tags.push("callback_query:data".to_string());
            }
            tags
        },
        _ => Vec::new(),
    }
}

fn message_tags(root: &str, msg: &Message) -> Vec<String> {
    let mut tags = vec![root.to_string()];
    if let MessageKind::Common(common) = &msg.kind {
        if let Some(media) = media_tag(&common.media_kind) {
            tags.push(format!("{root}:{media}"));
        }
        if caption(&common.media_kind).is_some() {
            tags.push(format!("{root}:caption"));
        }
    }
    tags
}

fn media_tag(media: &MediaKind) -> Option<&'static str> {
    let tag = match media {
        MediaKind::Text(_) => "text",
        MediaKind::Photo(_) => "photo",
        MediaKind::Document(_) => "document",
        MediaKind::Audio(_) => "audio",
        MediaKind::Voice(_) => "voice",
        MediaKind::Video(_) => "video",
        MediaKind::VideoNote(_) => "video_note",
        MediaKind::Animation(_) => "animation",
        MediaKind::Sticker(_) => "sticker",
        MediaKind::Location(_) => "location",
        MediaKind::Contact(_) => "contact",
        _ => return None,
    };
    Some(tag)
}

fn caption(media: &MediaKind) -> Option<&str> {
    match media {
        MediaKind::Photo(p) => p.caption.as_deref(),
        MediaKind::Document(d) => d.caption.as_deref(),
        MediaKind::Audio(a) => a.caption.as_deref(),
        MediaKind::Voice(v) => v.caption.as_deref(),
        MediaKind::Video(v) => v.caption.as_deref(),
        MediaKind::Animation(a) => a.caption.as_deref(),
        _ => None,
    }
}

/// Message text, or the caption for media messages.
fn extract_text(msg: &Message) -> Option<&str> {
    match &msg.kind {
        MessageKind::Common(common) => match &common.media_kind {
            MediaKind::Text(t) => Some(t.text.as_str()),
            other => caption(other),
        },
        _ => None,
    }
}
