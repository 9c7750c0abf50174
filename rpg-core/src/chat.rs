//! Chat transport port.
//!
//! The engine talks to players only through [`Conversation`]: one user in one
//! channel. Transports (a console, a chat bot) implement it; the engine never
//! sees their message types.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Transport-assigned message handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A message the user sent in reply to a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub id: MessageId,
    pub content: String,
}

/// A structured message that can be edited in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    pub title: String,
    pub description: String,
    /// `(name, value)` pairs shown under the description.
    pub fields: Vec<(String, String)>,
    pub footer: String,
    /// RGB accent color, if the transport supports one.
    pub color: Option<u32>,
    /// Small image shown beside the title.
    pub thumbnail: Option<String>,
}

impl Form {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = footer.into();
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail = Some(url.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn push_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }
}

/// Errors reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("message {0} not found")]
    MessageNotFound(MessageId),

    #[error("missing permission: {0}")]
    Forbidden(String),

    #[error("conversation closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),
}

/// One user's side of a chat channel.
///
/// Replies and choices only ever come from [`user`](Conversation::user);
/// anyone else typing in the channel is filtered out by the transport.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Conversation: Send + Sync {
    /// Identity of the user this conversation belongs to.
    fn user(&self) -> &str;

    /// Image URL of the user's avatar, if the transport knows one.
    fn avatar(&self) -> Option<String>;

    /// Send plain text addressed to the user.
    async fn send(&self, text: &str) -> Result<MessageId, ChatError>;

    async fn post_form(&self, form: &Form) -> Result<MessageId, ChatError>;

    async fn edit_form(&self, id: MessageId, form: &Form) -> Result<(), ChatError>;

    async fn delete(&self, id: MessageId) -> Result<(), ChatError>;

    /// Wait for the user's next message. `None` on timeout.
    async fn next_message(&self, timeout: Duration) -> Result<Option<Reply>, ChatError>;

    /// Offer a choice between `options` on message `id` and wait for the user
    /// to pick one. Returns the index of the picked option, `None` on timeout.
    async fn choose(
        &self,
        id: MessageId,
        options: &[String],
        timeout: Duration,
    ) -> Result<Option<usize>, ChatError>;

    /// Remove every choice attached to message `id`.
    async fn clear_choices(&self, id: MessageId) -> Result<(), ChatError>;
}
