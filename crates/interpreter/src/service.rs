//! Bridge service orchestrating the poll loop, the digest timer and commands.

use crate::chat::{send_split, ChatSink};
use crate::commands::CommandRouter;
use crate::enrichment::ItemInfoClient;
use crate::error::{InterpreterError, InterpreterResult};
use crate::messages::MessageCatalog;
use crate::permissions::ChatUser;
use crate::pipeline::{AnnouncementPipeline, PollControl};
use crate::queries::QuerySettings;
use apbridge_core::{BridgeConfig, SnapshotStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Main bridge service.
pub struct BridgeService {
    config: Arc<BridgeConfig>,
    sink: Arc<dyn ChatSink>,
    catalog: Arc<MessageCatalog>,
    router: Arc<CommandRouter>,
    running: bool,
    tasks: Vec<JoinHandle<()>>,
    control_rx: Option<mpsc::Receiver<PollControl>>,
}

impl BridgeService {
    /// Create a service. The message catalog and enrichment client are built
    /// from the configuration.
    pub fn new(config: BridgeConfig, sink: Arc<dyn ChatSink>) -> Self {
        let catalog = Arc::new(MessageCatalog::open(config.paths.messages_file.as_deref()));
        let enrichment = Arc::new(ItemInfoClient::new(&config.enrichment));
        Self::with_parts(config, sink, catalog, enrichment)
    }

    /// Create a service from explicitly constructed collaborators.
    pub fn with_parts(
        config: BridgeConfig,
        sink: Arc<dyn ChatSink>,
        catalog: Arc<MessageCatalog>,
        enrichment: Arc<ItemInfoClient>,
    ) -> Self {
        let config = Arc::new(config);
        let (control_tx, control_rx) = mpsc::channel(8);
        let router = CommandRouter::new(config.clone(), catalog.clone(), enrichment)
            .with_control(control_tx);

        Self {
            config,
            sink,
            catalog,
            router: Arc::new(router),
            running: false,
            tasks: vec![],
            control_rx: Some(control_rx),
        }
    }

    pub fn router(&self) -> Arc<CommandRouter> {
        self.router.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start the service: greet the channel, then spawn the poll and digest tasks.
    pub async fn start(&mut self) -> InterpreterResult<()> {
        if self.running {
            return Ok(());
        }
        let control_rx = self.control_rx.take().ok_or_else(|| {
            InterpreterError::Service("bridge service cannot be restarted".to_string())
        })?;

        info!("Starting bridge service");
        self.running = true;

        if let Err(err) = send_split(self.sink.as_ref(), &self.router.greeting()).await {
            warn!("failed to send greeting: {}", err);
        }

        if self.config.bot.auto_announce_items {
            self.start_announcements(control_rx).await;
        } else {
            // Dropping the receiver makes manual reloads fall back to a direct read.
            drop(control_rx);
            info!("automatic item announcements are disabled");
        }
        self.start_digest();

        info!("Bridge service started");
        Ok(())
    }

    /// Stop the service. In-flight dispatches are abandoned.
    pub async fn stop(&mut self) -> InterpreterResult<()> {
        if !self.running {
            return Ok(());
        }

        info!("Stopping bridge service");
        self.running = false;

        for task in self.tasks.drain(..) {
            task.abort();
        }

        info!("Bridge service stopped");
        Ok(())
    }

    /// Answer a chat message if it is a command. Returns whether a reply was sent.
    pub async fn handle_message(&self, user: &ChatUser, text: &str) -> InterpreterResult<bool> {
        let Some(reply) = self.router.handle_message(user, text).await else {
            return Ok(false);
        };
        send_split(self.sink.as_ref(), &reply).await?;
        Ok(true)
    }

    async fn start_announcements(&mut self, control_rx: mpsc::Receiver<PollControl>) {
        let mut pipeline = AnnouncementPipeline::new(
            SnapshotStore::new(self.config.paths.state_file.clone()),
            QuerySettings::from_config(&self.config),
            self.catalog.clone(),
            self.sink.clone(),
        );
        pipeline.prime().await;

        let interval = self.config.poll_interval();
        let task = tokio::spawn(pipeline.run(interval, control_rx));
        self.tasks.push(task);
    }

    fn start_digest(&mut self) {
        let router = self.router.clone();
        let sink = self.sink.clone();
        let period = self.config.digest_interval();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(
                tokio::time::Instant::now() + period,
                period.max(Duration::from_secs(1)),
            );
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                if let Err(err) = send_split(sink.as_ref(), &router.about()).await {
                    warn!("failed to send about digest: {}", err);
                }
            }
        });

        self.tasks.push(task);
    }
}
