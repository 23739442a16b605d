//! User profiles and the per-user fact set.

use super::Store;
use async_trait::async_trait;
use sauti_core::{error::SautiError, records::UserProfile, traits::ProfileStore};

impl Store {
    /// Create the profile row with defaults if it does not exist yet.
    async fn ensure_profile(&self, user_id: &str) -> Result<(), SautiError> {
        sqlx::query("INSERT OR IGNORE INTO profiles (user_id) VALUES (?)")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| SautiError::Memory(format!("create profile failed: {e}")))?;
        Ok(())
    }

    /// All facts for a user, in insertion order.
    pub async fn get_facts(&self, user_id: &str) -> Result<Vec<String>, SautiError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT fact FROM facts WHERE user_id = ? ORDER BY rowid")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| SautiError::Memory(format!("query facts failed: {e}")))?;

        Ok(rows.into_iter().map(|(f,)| f).collect())
    }
}

#[async_trait]
impl ProfileStore for Store {
    async fn get_profile(&self, user_id: &str) -> Result<UserProfile, SautiError> {
        self.ensure_profile(user_id).await?;

        let (style, voice_mode): (String, i64) =
            sqlx::query_as("SELECT style, voice_mode FROM profiles WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| SautiError::Memory(format!("query profile failed: {e}")))?;

        Ok(UserProfile {
            id: user_id.to_string(),
            facts: self.get_facts(user_id).await?,
            style,
            voice_mode: voice_mode != 0,
        })
    }

    async fn add_fact(&self, user_id: &str, fact: &str) -> Result<bool, SautiError> {
        let fact = fact.trim();
        if fact.is_empty() {
            return Ok(false);
        }
        self.ensure_profile(user_id).await?;

        let result = sqlx::query("INSERT OR IGNORE INTO facts (user_id, fact) VALUES (?, ?)")
            .bind(user_id)
            .bind(fact)
            .execute(&self.pool)
            .await
            .map_err(|e| SautiError::Memory(format!("insert fact failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_style(&self, user_id: &str, style: &str) -> Result<(), SautiError> {
        sqlx::query(
            "INSERT INTO profiles (user_id, style) VALUES (?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET style = excluded.style",
        )
        .bind(user_id)
        .bind(style)
        .execute(&self.pool)
        .await
        .map_err(|e| SautiError::Memory(format!("set style failed: {e}")))?;
        Ok(())
    }

    async fn set_voice_mode(&self, user_id: &str, enabled: bool) -> Result<(), SautiError> {
        sqlx::query(
            "INSERT INTO profiles (user_id, voice_mode) VALUES (?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET voice_mode = excluded.voice_mode",
        )
        .bind(user_id)
        .bind(enabled as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| SautiError::Memory(format!("set voice mode failed: {e}")))?;
        Ok(())
    }
}
