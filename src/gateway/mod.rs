//! Gateway: the main event loop connecting channels, stores, tools and the model.
//!
//! Messages from the same sender are processed one at a time; messages from
//! different senders run concurrently. The reminder scheduler runs as its own
//! task and reaches users through a [`Notifier`](sauti_core::traits::Notifier).

mod delivery;
mod facts;
mod fallback;
mod intake;
mod pipeline;
mod prompt;
mod research;
pub mod scheduler;

#[cfg(test)]
mod tests;

use crate::tools::ToolDispatcher;
use chrono_tz::Tz;
use sauti_core::{
    config::{Config, ToolsConfig},
    error::SautiError,
    message::IncomingMessage,
    traits::{
        Channel, Extractor, HistoryStore, MarketData, ProfileStore, Provider, ReminderStore,
        SearchBackend, Speech,
    },
};
use scheduler::ChannelNotifier;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

/// Runtime settings the gateway reads on every turn.
#[derive(Debug, Clone)]
pub struct Settings {
    pub agent_name: String,
    pub persona: String,
    pub location: String,
    pub tz: Tz,
    pub grounding: bool,
    pub generation_timeout_secs: u64,
    pub max_chunk_chars: usize,
    pub voice_max_chars: usize,
    pub scheduler_enabled: bool,
    pub poll_interval_secs: u64,
    pub tools: ToolsConfig,
}

impl Settings {
    /// Collect settings from a loaded config.
    pub fn from_config(config: &Config) -> Result<Self, SautiError> {
        Ok(Self::build(config, config.sauti.tz()?))
    }

    fn build(config: &Config, tz: Tz) -> Self {
        let gemini = config.provider.gemini.clone().unwrap_or_default();
        Self {
            agent_name: config.sauti.name.clone(),
            persona: config.sauti.persona.clone(),
            location: config.sauti.location.clone(),
            tz,
            grounding: gemini.grounding,
            generation_timeout_secs: gemini.timeout_secs,
            max_chunk_chars: config.delivery.max_chunk_chars,
            voice_max_chars: config.voice.max_chars,
            scheduler_enabled: config.scheduler.enabled,
            poll_interval_secs: config.scheduler.poll_interval_secs,
            tools: config.tools.clone(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        let config = Config::default();
        let tz = config.sauti.tz().unwrap_or(Tz::UTC);
        Self::build(&config, tz)
    }
}

/// External services the gateway talks to.
pub struct Backends {
    pub provider: Arc<dyn Provider>,
    pub profiles: Arc<dyn ProfileStore>,
    pub history: Arc<dyn HistoryStore>,
    pub reminders: Arc<dyn ReminderStore>,
    pub search: Arc<dyn SearchBackend>,
    pub market: Arc<dyn MarketData>,
    pub extractor: Arc<dyn Extractor>,
    pub speech: Option<Arc<dyn Speech>>,
}

/// The central gateway that routes messages between channels and the model.
pub struct Gateway {
    pub(super) provider: Arc<dyn Provider>,
    pub(super) channels: HashMap<String, Arc<dyn Channel>>,
    pub(super) profiles: Arc<dyn ProfileStore>,
    pub(super) history: Arc<dyn HistoryStore>,
    pub(super) reminders: Arc<dyn ReminderStore>,
    pub(super) tools: ToolDispatcher,
    pub(super) search: Arc<dyn SearchBackend>,
    pub(super) extractor: Arc<dyn Extractor>,
    pub(super) speech: Option<Arc<dyn Speech>>,
    pub(super) settings: Settings,
    /// Tracks senders with a turn in flight. New messages are buffered here.
    pub(super) active_senders: Mutex<HashMap<String, Vec<IncomingMessage>>>,
}

impl Gateway {
    /// Create a new gateway.
    pub fn new(
        backends: Backends,
        channels: HashMap<String, Arc<dyn Channel>>,
        settings: Settings,
    ) -> Self {
        let tools = ToolDispatcher::new(
            backends.search.clone(),
            backends.market,
            backends.reminders.clone(),
            settings.tools.clone(),
            settings.tz,
        );
        Self {
            provider: backends.provider,
            channels,
            profiles: backends.profiles,
            history: backends.history,
            reminders: backends.reminders,
            tools,
            search: backends.search,
            extractor: backends.extractor,
            speech: backends.speech,
            settings,
            active_senders: Mutex::new(HashMap::new()),
        }
    }

    /// Run the main event loop until Ctrl-C or until every channel closes.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        info!(
            "{} gateway running | provider: {} | channels: {}",
            self.settings.agent_name,
            self.provider.name(),
            self.channels.keys().cloned().collect::<Vec<_>>().join(", "),
        );

        let (tx, mut rx) = mpsc::channel::<IncomingMessage>(256);

        for (name, channel) in &self.channels {
            let mut channel_rx = channel
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start channel {name}: {e}"))?;
            let tx = tx.clone();
            let channel_name = name.clone();

            tokio::spawn(async move {
                while let Some(msg) = channel_rx.recv().await {
                    if tx.send(msg).await.is_err() {
                        info!("gateway receiver dropped, stopping {channel_name} forwarder");
                        break;
                    }
                }
            });

            info!("Channel started: {name}");
        }

        drop(tx);

        // Spawn scheduler loop.
        let sched_handle = if self.settings.scheduler_enabled {
            let sched_store = self.reminders.clone();
            let notifier = Arc::new(ChannelNotifier::new(self.channels.clone()));
            let poll_secs = self.settings.poll_interval_secs;
            info!("Reminder scheduler polling every {poll_secs}s");
            Some(tokio::spawn(async move {
                scheduler::scheduler_loop(sched_store, notifier, poll_secs).await;
            }))
        } else {
            None
        };

        // Main event loop with graceful shutdown.
        loop {
            tokio::select! {
                incoming = rx.recv() => {
                    let Some(incoming) = incoming else {
                        info!("All channels closed");
                        break;
                    };
                    let gw = self.clone();
                    tokio::spawn(async move {
                        gw.dispatch_message(incoming).await;
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown(&sched_handle).await;
        Ok(())
    }

    /// Dispatch a message: buffer if the sender is busy, otherwise process.
    ///
    /// Keyed by sender id alone, the same key the profile and history stores use.
    pub(super) async fn dispatch_message(self: Arc<Self>, incoming: IncomingMessage) {
        let sender_key = incoming.sender_id.clone();

        {
            let mut active = self.active_senders.lock().await;
            if let Some(buffer) = active.get_mut(&sender_key) {
                // Sender already has a turn in flight; keep order by queueing.
                buffer.push(incoming);
                info!("buffered message from {sender_key} (turn in progress)");
                return;
            }
            active.insert(sender_key.clone(), Vec::new());
        }

        let mut next = Some(incoming);
        while let Some(message) = next {
            self.clone().run_isolated(message).await;

            // Drain any buffered messages for this sender.
            next = {
                let mut active = self.active_senders.lock().await;
                match active.get_mut(&sender_key) {
                    Some(buf) if !buf.is_empty() => Some(buf.remove(0)),
                    _ => {
                        active.remove(&sender_key);
                        None
                    }
                }
            };
            if next.is_some() {
                info!("processing buffered message from {sender_key}");
            }
        }
    }

    /// Handle one message on its own task so a panic ends only that turn.
    async fn run_isolated(self: Arc<Self>, incoming: IncomingMessage) {
        let channel = incoming.channel.clone();
        let sender = incoming.sender_id.clone();
        let gw = self.clone();
        let handle = tokio::spawn(async move { gw.handle_message(incoming).await });
        if let Err(e) = handle.await {
            error!("[{channel}] turn for {sender} aborted: {e}");
        }
    }

    /// Graceful shutdown: stop the scheduler and all channels.
    async fn shutdown(&self, sched_handle: &Option<tokio::task::JoinHandle<()>>) {
        info!("Shutting down...");

        if let Some(h) = sched_handle {
            h.abort();
        }

        for (name, channel) in &self.channels {
            if let Err(e) = channel.stop().await {
                warn!("failed to stop channel {name}: {e}");
            }
        }

        info!("Shutdown complete.");
    }
}
