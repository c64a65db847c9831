//! Per-event response handling.
//!
//! Every inbound event goes through [`ResponseScheduler::handle`]: the
//! on-demand trigger answers at once, admitted chatter is learned and rolled
//! against the autonomous reply policy, everything else is dropped.

pub mod deferred;
pub mod policy;

use std::sync::Arc;

pub use deferred::{DeferredQueue, ShutdownMode, ShutdownReport};
pub use policy::{ReplyPolicy, SchedulerDecision};

use crate::config::BotConfig;
use crate::corpus::{self, CorpusStore};
use crate::gate::{EventGate, GateVerdict, IgnoreReason};
use crate::rng::SharedRng;
use crate::synth::Synthesizer;
use crate::transport::{InboundEvent, ReplyTarget, Transport};

/// How one event was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The on-demand command fired a reply.
    Triggered,
    Ignored(IgnoreReason),
    Handled {
        persisted: bool,
        decision: SchedulerDecision,
    },
}

pub struct ResponseScheduler {
    gate: EventGate,
    trigger_command: String,
    policy: ReplyPolicy,
    store: Arc<dyn CorpusStore>,
    synth: Synthesizer,
    transport: Arc<dyn Transport>,
    deferred: DeferredQueue,
    rng: SharedRng,
}

impl ResponseScheduler {
    /// Wire the scheduler and start its deferred reply worker. Must be called
    /// from within a tokio runtime.
    pub fn new(
        config: &BotConfig,
        store: Arc<dyn CorpusStore>,
        transport: Arc<dyn Transport>,
        rng: SharedRng,
    ) -> Self {
        let synth = Synthesizer::new(store.clone(), rng.clone(), config.max_generation_length);
        let deferred =
            DeferredQueue::spawn(synth.clone(), transport.clone(), config.max_pending_replies);

        Self {
            gate: EventGate::from_config(config),
            trigger_command: config.trigger_command.clone(),
            policy: ReplyPolicy::from_config(config),
            store,
            synth,
            transport,
            deferred,
            rng,
        }
    }

    pub fn deferred(&self) -> &DeferredQueue {
        &self.deferred
    }

    fn is_trigger(&self, event: &InboundEvent) -> bool {
        event.command.is_message() && event.content == self.trigger_command
    }

    pub async fn handle(&self, event: &InboundEvent) -> EventOutcome {
        if self.is_trigger(event) {
            tracing::info!("On-demand trigger from {}", event.sender);
            self.reply_now(&event.origin).await;
            return EventOutcome::Triggered;
        }

        if let GateVerdict::Ignore(reason) = self.gate.check(event) {
            tracing::trace!("Ignoring event from {:?}: {:?}", event.sender, reason);
            return EventOutcome::Ignored(reason);
        }

        let persisted = self.persist(&event.content);

        let decision = self.rng.with(|rng| self.policy.decide(rng));
        match decision {
            SchedulerDecision::Deferred(delay) => {
                if let Err(e) = self.deferred.schedule(event.origin.clone(), delay) {
                    tracing::warn!("Dropping deferred reply to {}: {}", event.origin.name(), e);
                }
            }
            SchedulerDecision::Immediate => self.reply_now(&event.origin).await,
            SchedulerDecision::None => {}
        }

        EventOutcome::Handled {
            persisted,
            decision,
        }
    }

    /// Filter and store a line. Store failures drop the line.
    fn persist(&self, content: &str) -> bool {
        let Some(line) = corpus::consider(content) else {
            return false;
        };

        match self.store.insert(line.as_str()) {
            Ok(()) => {
                tracing::debug!("Stored corpus line: {}", line.as_str());
                true
            }
            Err(e) => {
                tracing::warn!("Failed to store corpus line: {:#}", e);
                false
            }
        }
    }

    /// Empty text is still sent.
    async fn reply_now(&self, target: &ReplyTarget) {
        let text = self.synth.compose();
        if let Err(e) = self.transport.reply(target, &text).await {
            tracing::error!("Failed to deliver reply to {}: {}", target.name(), e);
        }
    }

    pub async fn shutdown(&self, mode: ShutdownMode) -> ShutdownReport {
        self.deferred.shutdown(mode).await
    }
}
