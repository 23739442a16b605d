//! Pending reminder CRUD.

use super::{format_ts, parse_ts, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sauti_core::{
    error::SautiError,
    records::{NewReminder, Reminder, ReminderStatus},
    traits::ReminderStore,
};
use uuid::Uuid;

type ReminderRow = (String, String, String, String, String, String);

fn from_row(row: ReminderRow) -> Result<Reminder, SautiError> {
    let (id, owner_id, channel, channel_id, due_at, text) = row;
    Ok(Reminder {
        id,
        owner_id,
        channel,
        channel_id,
        due_at: parse_ts(&due_at)?,
        text,
        status: ReminderStatus::Pending,
    })
}

#[async_trait]
impl ReminderStore for Store {
    async fn create_reminder(&self, reminder: &NewReminder) -> Result<String, SautiError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO reminders (id, owner_id, channel, channel_id, due_at, text) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&reminder.owner_id)
        .bind(&reminder.channel)
        .bind(&reminder.channel_id)
        .bind(format_ts(reminder.due_at))
        .bind(&reminder.text)
        .execute(&self.pool)
        .await
        .map_err(|e| SautiError::Memory(format!("create reminder failed: {e}")))?;

        Ok(id)
    }

    async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>, SautiError> {
        let rows: Vec<ReminderRow> = sqlx::query_as(
            "SELECT id, owner_id, channel, channel_id, due_at, text FROM reminders \
             WHERE status = 'pending' AND due_at <= ? ORDER BY due_at ASC",
        )
        .bind(format_ts(now))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SautiError::Memory(format!("get due reminders failed: {e}")))?;

        rows.into_iter().map(from_row).collect()
    }

    async fn delete_reminder(&self, id: &str) -> Result<bool, SautiError> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| SautiError::Memory(format!("delete reminder failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn reminders_for(&self, owner_id: &str) -> Result<Vec<Reminder>, SautiError> {
        let rows: Vec<ReminderRow> = sqlx::query_as(
            "SELECT id, owner_id, channel, channel_id, due_at, text FROM reminders \
             WHERE owner_id = ? AND status = 'pending' ORDER BY due_at ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SautiError::Memory(format!("get reminders failed: {e}")))?;

        rows.into_iter().map(from_row).collect()
    }
}
