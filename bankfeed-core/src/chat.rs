//! Chat platform contract: messages with reactions, and channels with history.
//!
//! The success marker reaction is the only durable record that a message was
//! ingested; nothing else is persisted.

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reaction placed on a message once its transaction reached the ledger.
///
/// Live and backfill paths must use this exact string for the skip check to hold.
pub const MARKER: &str = "✅";

/// Platform message id (a Discord snowflake; ordered by creation time).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub emoji: String,
    /// Placed by this bot's own identity.
    pub me: bool,
}

impl Reaction {
    pub fn new(emoji: impl Into<String>, me: bool) -> Self {
        Self {
            emoji: emoji.into(),
            me,
        }
    }

    pub fn is_marker(&self) -> bool {
        self.me && self.emoji == MARKER
    }
}

/// True when our own marker is among `reactions`. Anyone else's checkmark doesn't count.
pub fn is_marked(reactions: &[Reaction]) -> bool {
    reactions.iter().any(Reaction::is_marker)
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Request(String),

    #[error("chat platform returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected chat payload: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ChatMessage: Send + Sync {
    fn id(&self) -> MessageId;

    fn content(&self) -> &str;

    fn reactions(&self) -> &[Reaction];

    /// Authored by this bot.
    fn is_own(&self) -> bool;

    async fn add_reaction(&self, emoji: &str) -> Result<(), ChatError>;
}

/// A resolved channel whose history can be walked.
pub trait ChatChannel: Send + Sync {
    type Message: ChatMessage;

    fn name(&self) -> &str;

    /// Every message in the channel, in whatever order the platform serves them.
    fn history(&self) -> BoxStream<'_, Result<Self::Message, ChatError>>;
}
