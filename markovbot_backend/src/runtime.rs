use std::sync::Arc;

use anyhow::{Context, Result};
use flume::Receiver;

use crate::config::BotConfig;
use crate::corpus::CorpusStore;
use crate::database::CorpusDatabase;
use crate::rng::SharedRng;
use crate::scheduler::{EventOutcome, ResponseScheduler, ShutdownMode, ShutdownReport};
use crate::transport::{InboundEvent, Transport};

pub struct BotRuntime {
    pub config: BotConfig,
    pub store: Arc<dyn CorpusStore>,
    scheduler: ResponseScheduler,
}

pub struct BotRuntimeBuilder {
    config: BotConfig,
    transport: Arc<dyn Transport>,
    store: Option<Arc<dyn CorpusStore>>,
    rng: Option<SharedRng>,
}

impl BotRuntimeBuilder {
    pub fn new(config: BotConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            store: None,
            rng: None,
        }
    }

    /// Use `store` instead of opening `config.database_path`.
    pub fn with_store(mut self, store: Arc<dyn CorpusStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `rng` instead of seeding from `config.rng_seed`.
    pub fn with_rng(mut self, rng: SharedRng) -> Self {
        self.rng = Some(rng);
        self
    }

    /// Open the store, ensure its schema and start the scheduler. Must be
    /// called from within a tokio runtime.
    pub fn build(self) -> Result<BotRuntime> {
        let config = self.config;

        let store: Arc<dyn CorpusStore> = match self.store {
            Some(store) => store,
            None => Arc::new(
                CorpusDatabase::open(&config.database_path)
                    .context("failed to open corpus store")?,
            ),
        };
        store
            .ensure_schema()
            .context("failed to initialize corpus schema")?;

        let rng = match self.rng {
            Some(rng) => rng,
            None => {
                if let Some(seed) = config.rng_seed {
                    tracing::info!("Using fixed RNG seed {}", seed);
                }
                SharedRng::from_seed_option(config.rng_seed)
            }
        };

        let scheduler = ResponseScheduler::new(&config, store.clone(), self.transport, rng);

        tracing::info!(
            "Bot runtime ready (nick: {}, trigger: {}, reply chance: {}%, max pending: {})",
            config.nick,
            config.trigger_command,
            config.deferred_chance_percent,
            scheduler.deferred().capacity()
        );

        Ok(BotRuntime {
            config,
            store,
            scheduler,
        })
    }
}

impl BotRuntime {
    pub fn bootstrap(config: BotConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        BotRuntimeBuilder::new(config, transport).build()
    }

    pub async fn handle_event(&self, event: &InboundEvent) -> EventOutcome {
        self.scheduler.handle(event).await
    }

    /// Process events one at a time until every sender is dropped. Returns
    /// the number of events seen.
    pub async fn run(&self, events: Receiver<InboundEvent>) -> usize {
        tracing::info!("Bot loop starting...");
        let mut processed = 0usize;

        while let Ok(event) = events.recv_async().await {
            let outcome = self.scheduler.handle(&event).await;
            tracing::debug!("{} in {}: {:?}", event.sender, event.origin.name(), outcome);
            processed += 1;
        }

        tracing::info!("Event stream closed after {} events", processed);
        processed
    }

    pub fn pending_replies(&self) -> usize {
        self.scheduler.deferred().pending()
    }

    /// Stop the deferred reply worker, draining or cancelling what is left
    /// per `drain_pending_on_shutdown`.
    pub async fn shutdown(&self) -> ShutdownReport {
        let mode = if self.config.drain_pending_on_shutdown {
            ShutdownMode::Drain
        } else {
            ShutdownMode::Cancel
        };
        tracing::info!(
            "Shutting down with {} pending replies ({:?})",
            self.pending_replies(),
            mode
        );
        self.scheduler.shutdown(mode).await
    }
}
