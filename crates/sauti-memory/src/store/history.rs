//! Bounded per-user conversation history.

use super::{format_ts, parse_ts, Store};
use async_trait::async_trait;
use sauti_core::{
    error::SautiError,
    traits::HistoryStore,
    turn::{Part, Role, Turn},
};
use tracing::warn;

#[async_trait]
impl HistoryStore for Store {
    async fn load_history(&self, user_id: &str) -> Result<Vec<Turn>, SautiError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT role, parts_json, created_at FROM turns WHERE user_id = ? ORDER BY seq ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SautiError::Memory(format!("query history failed: {e}")))?;

        let mut turns = Vec::with_capacity(rows.len());
        for (role, parts_json, created_at) in rows {
            let Some(role) = Role::parse(&role) else {
                warn!("skipping turn with unknown role '{role}' for {user_id}");
                continue;
            };
            let parts: Vec<Part> = serde_json::from_str(&parts_json)?;
            turns.push(Turn::at(role, parts, parse_ts(&created_at)?)?);
        }
        Ok(turns)
    }

    async fn append_turn(&self, user_id: &str, turn: &Turn) -> Result<(), SautiError> {
        let parts_json = serde_json::to_string(turn.parts())?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SautiError::Memory(format!("begin failed: {e}")))?;

        sqlx::query("INSERT INTO turns (user_id, role, parts_json, created_at) VALUES (?, ?, ?, ?)")
            .bind(user_id)
            .bind(turn.role().as_str())
            .bind(&parts_json)
            .bind(format_ts(turn.timestamp()))
            .execute(&mut *tx)
            .await
            .map_err(|e| SautiError::Memory(format!("insert turn failed: {e}")))?;

        sqlx::query(
            "DELETE FROM turns WHERE user_id = ? AND seq NOT IN \
             (SELECT seq FROM turns WHERE user_id = ? ORDER BY seq DESC LIMIT ?)",
        )
        .bind(user_id)
        .bind(user_id)
        .bind(self.history_capacity as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| SautiError::Memory(format!("trim history failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| SautiError::Memory(format!("commit failed: {e}")))?;
        Ok(())
    }

    async fn clear_history(&self, user_id: &str) -> Result<u64, SautiError> {
        let result = sqlx::query("DELETE FROM turns WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| SautiError::Memory(format!("clear history failed: {e}")))?;
        Ok(result.rows_affected())
    }
}
