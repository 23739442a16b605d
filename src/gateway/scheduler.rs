//! Reminder delivery: a fixed-interval poll, independent of conversations.
//!
//! Delivery is at most once. A reminder is deleted after its delivery attempt
//! whether or not the attempt succeeded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sauti_core::{
    error::SautiError,
    message::OutgoingMessage,
    records::Reminder,
    traits::{Channel, Notifier, ReminderStore},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Background task: deliver due reminders every `poll_secs`.
pub async fn scheduler_loop(
    store: Arc<dyn ReminderStore>,
    notifier: Arc<dyn Notifier>,
    poll_secs: u64,
) {
    loop {
        tokio::time::sleep(std::time::Duration::from_secs(poll_secs)).await;
        deliver_due_reminders(store.as_ref(), notifier.as_ref(), Utc::now()).await;
    }
}

/// One scheduler tick. Returns the number of reminders delivered successfully.
pub async fn deliver_due_reminders(
    store: &dyn ReminderStore,
    notifier: &dyn Notifier,
    now: DateTime<Utc>,
) -> usize {
    let due = match store.due_reminders(now).await {
        Ok(due) => due,
        Err(e) => {
            error!("scheduler: failed to load due reminders: {e}");
            return 0;
        }
    };

    let mut delivered = 0;
    for reminder in &due {
        match notifier.deliver(reminder).await {
            Ok(()) => {
                delivered += 1;
                info!("scheduler: delivered reminder {} to {}", reminder.id, reminder.owner_id);
            }
            Err(e) => warn!(
                "scheduler: dropping reminder {} for {}: {e}",
                reminder.id, reminder.owner_id
            ),
        }
        if let Err(e) = store.delete_reminder(&reminder.id).await {
            error!("scheduler: failed to delete reminder {}: {e}", reminder.id);
        }
    }
    delivered
}

/// Delivers reminders through whichever channel they were created on.
pub struct ChannelNotifier {
    channels: HashMap<String, Arc<dyn Channel>>,
}

impl ChannelNotifier {
    pub fn new(channels: HashMap<String, Arc<dyn Channel>>) -> Self {
        Self { channels }
    }
}

/// Text sent when a reminder fires.
pub fn reminder_text(reminder: &Reminder) -> String {
    format!("⏰ Reminder: {}", reminder.text)
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn deliver(&self, reminder: &Reminder) -> Result<(), SautiError> {
        let channel = self.channels.get(&reminder.channel).ok_or_else(|| {
            SautiError::Channel(format!("channel '{}' is not running", reminder.channel))
        })?;
        channel
            .send(OutgoingMessage {
                text: reminder_text(reminder),
                reply_target: Some(reminder.channel_id.clone()),
            })
            .await
    }
}
