//! What the question engine needs to know about an inbound event.
//!
//! Hosts implement [`InboundEvent`] for whatever update type their transport
//! delivers. The engine only asks three things of an event: which tags it
//! carries, what text it contains, and which conversation it belongs to.

use {regex::Regex, std::sync::Arc};

use crate::error::{Error, Result};

/// An inbound event delivered by the host transport.
pub trait InboundEvent: Send + Sync + 'static {
    /// Whether the event carries the discriminant `tag` (e.g. `"message:text"`).
    fn has(&self, tag: &str) -> bool;

    /// Text payload used for `hears` patterns (message text, caption, ...).
    fn text(&self) -> Option<&str> {
        None
    }

    /// Identity of the conversation the event belongs to.
    fn identity(&self) -> Option<ConversationIdentity>;
}

/// Bot/user/chat triple identifying one logical conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationIdentity {
    pub bot_id: String,
    pub user_id: Option<String>,
    pub chat_id: Option<String>,
}

impl ConversationIdentity {
    pub fn new(bot_id: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            user_id: None,
            chat_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_chat(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    /// Default conversation key: `<bot-id>-<user-id>-<chat-id>`.
    ///
    /// Missing parts render as `none` so that, for example, channel posts
    /// without a sender still map to a stable key.
    pub fn key(&self) -> String {
        format!(
            "{}-{}-{}",
            self.bot_id,
            self.user_id.as_deref().unwrap_or("none"),
            self.chat_id.as_deref().unwrap_or("none"),
        )
    }
}

/// Caller-supplied conversation key function.
pub type KeyFn<E> = Arc<dyn Fn(&E) -> Option<String> + Send + Sync>;

/// The set of tags a question (or cancel rule) accepts.
///
/// An event matches when it carries at least one of the tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher(Vec<String>);

impl Matcher {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tags.into_iter().map(Into::into).collect())
    }

    pub fn tags(&self) -> &[String] {
        &self.0
    }

    pub fn matches<E: InboundEvent + ?Sized>(&self, event: &E) -> bool {
        self.0.iter().any(|tag| event.has(tag))
    }
}

impl From<&str> for Matcher {
    fn from(tag: &str) -> Self {
        Self(vec![tag.to_string()])
    }
}

impl From<String> for Matcher {
    fn from(tag: String) -> Self {
        Self(vec![tag])
    }
}

impl From<Vec<&str>> for Matcher {
    fn from(tags: Vec<&str>) -> Self {
        Self::new(tags)
    }
}

impl From<Vec<String>> for Matcher {
    fn from(tags: Vec<String>) -> Self {
        Self(tags)
    }
}

impl<const N: usize> From<[&str; N]> for Matcher {
    fn from(tags: [&str; N]) -> Self {
        Self::new(tags)
    }
}

/// A text pattern tested against [`InboundEvent::text`].
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Whole-text equality.
    Exact(String),
    /// Regular expression search anywhere in the text.
    Regex(Regex),
}

impl Pattern {
    /// Compile `pattern` as a regular expression.
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|e| Error::invalid_pattern(pattern, e))
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == text,
            Self::Regex(re) => re.is_match(text),
        }
    }
}

impl From<&str> for Pattern {
    fn from(text: &str) -> Self {
        Self::Exact(text.to_string())
    }
}

impl From<String> for Pattern {
    fn from(text: String) -> Self {
        Self::Exact(text)
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Self::Regex(re)
    }
}
