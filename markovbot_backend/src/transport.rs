//! Boundary with the chat network.
//!
//! Connecting, joining and protocol framing live behind this seam. The bot
//! core only sees [`InboundEvent`]s and hands replies to a [`Transport`].

use anyhow::Result;
use async_trait::async_trait;
use flume::Sender;

/// Protocol command that carried an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandType {
    /// Direct or channel message (IRC `PRIVMSG`).
    Message,
    Notice,
    /// Joins, parts, quits, modes and the rest; never learned from.
    Other(String),
}

impl CommandType {
    pub fn from_protocol(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PRIVMSG" => CommandType::Message,
            "NOTICE" => CommandType::Notice,
            other => CommandType::Other(other.to_string()),
        }
    }

    pub fn is_message(&self) -> bool {
        matches!(self, CommandType::Message)
    }
}

/// Where a reply goes: the channel a message arrived on, or the sender for
/// private messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTarget {
    Channel(String),
    Direct(String),
}

impl ReplyTarget {
    pub fn name(&self) -> &str {
        match self {
            ReplyTarget::Channel(name) | ReplyTarget::Direct(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender: String,
    pub content: String,
    pub command: CommandType,
    pub origin: ReplyTarget,
}

impl InboundEvent {
    /// A message event posted to `channel`.
    pub fn channel_message(channel: &str, sender: &str, content: &str) -> Self {
        Self {
            sender: sender.to_string(),
            content: content.to_string(),
            command: CommandType::Message,
            origin: ReplyTarget::Channel(channel.to_string()),
        }
    }

    /// A message sent straight to the bot; replies go back to the sender.
    pub fn direct_message(sender: &str, content: &str) -> Self {
        Self {
            sender: sender.to_string(),
            content: content.to_string(),
            command: CommandType::Message,
            origin: ReplyTarget::Direct(sender.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReply {
    pub target: ReplyTarget,
    pub text: String,
}

/// Outbound half of the chat connection. Delivery is fire-and-forget; an
/// error only means the hand-off failed.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn reply(&self, target: &ReplyTarget, text: &str) -> Result<()>;
}

/// Transport that forwards replies into a channel, for embedding the bot in
/// another task or observing it in tests.
pub struct ChannelTransport {
    tx: Sender<OutboundReply>,
}

impl ChannelTransport {
    pub fn new(tx: Sender<OutboundReply>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn reply(&self, target: &ReplyTarget, text: &str) -> Result<()> {
        self.tx
            .send_async(OutboundReply {
                target: target.clone(),
                text: text.to_string(),
            })
            .await
            .map_err(|_| anyhow::anyhow!("reply channel closed"))
    }
}
