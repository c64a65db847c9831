//! Eligibility gate for inbound events.
//!
//! Screens out server notices, the bot's own lines, other bots, and command
//! traffic before anything is learned from or reacted to.

use crate::config::BotConfig;
use crate::transport::InboundEvent;

/// Result of screening an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    Admit,
    Ignore(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotAMessage,
    EmptySender,
    OwnMessage,
    /// Senders with a `.` are servers or services.
    ServerSender,
    Denylisted,
    IgnoredPrefix,
}

#[derive(Debug, Clone)]
pub struct EventGate {
    nick: String,
    denylist: Vec<String>,
    ignored_prefixes: Vec<String>,
}

impl EventGate {
    pub fn new(nick: String, denylist: Vec<String>, ignored_prefixes: Vec<String>) -> Self {
        Self {
            nick,
            denylist,
            ignored_prefixes,
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(
            config.nick.clone(),
            config.denylist.clone(),
            config.ignored_prefixes.clone(),
        )
    }

    pub fn check(&self, event: &InboundEvent) -> GateVerdict {
        let sender = event.sender.as_str();

        let reason = if !event.command.is_message() {
            Some(IgnoreReason::NotAMessage)
        } else if sender.is_empty() {
            Some(IgnoreReason::EmptySender)
        } else if sender == self.nick {
            Some(IgnoreReason::OwnMessage)
        } else if sender.contains('.') {
            Some(IgnoreReason::ServerSender)
        } else if self.denylist.iter().any(|name| name == sender) {
            Some(IgnoreReason::Denylisted)
        } else if self
            .ignored_prefixes
            .iter()
            .any(|prefix| event.content.starts_with(prefix.as_str()))
        {
            Some(IgnoreReason::IgnoredPrefix)
        } else {
            None
        };

        match reason {
            Some(reason) => GateVerdict::Ignore(reason),
            None => GateVerdict::Admit,
        }
    }
}
