//! Message processing pipeline: the handle_message flow and the turn state machine.

use super::{facts, fallback, prompt, Gateway};
use crate::commands::{self, Command, CommandContext};
use crate::directives::{has_fact_sentinel, parse_directives, strip_fact_sentinel};
use crate::tools::ToolContext;
use chrono::Utc;
use sauti_core::{
    context::Context,
    error::with_timeout,
    message::IncomingMessage,
    records::UserProfile,
    turn::Turn,
};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Where a turn is in its lifecycle. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum Stage {
    Received,
    Augmented,
    Generated,
    ToolResolved,
    Persisted,
    Delivered,
}

/// Final text for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Reply {
    pub text: String,
    pub voice: bool,
}

impl Gateway {
    /// Process a single incoming message through the full pipeline.
    pub(super) async fn handle_message(&self, incoming: IncomingMessage) {
        let preview = if incoming.text.chars().count() > 60 {
            let truncated: String = incoming.text.chars().take(60).collect();
            format!("{truncated}...")
        } else {
            incoming.text.clone()
        };
        info!(
            "[{}] {} says: {}",
            incoming.channel,
            incoming.sender_name.as_deref().unwrap_or("unknown"),
            preview
        );

        // --- COMMAND DISPATCH ---
        if let Some(cmd) = Command::parse(&incoming.text) {
            let topic = commands::argument(&incoming.text);
            let response = if cmd == Command::Research && !topic.is_empty() {
                let _typing = self.start_typing(&incoming).await;
                self.research(topic).await
            } else {
                let ctx = CommandContext {
                    profiles: self.profiles.as_ref(),
                    history: self.history.as_ref(),
                    reminders: self.reminders.as_ref(),
                    sender_id: &incoming.sender_id,
                    text: &incoming.text,
                    agent_name: &self.settings.agent_name,
                    tz: self.settings.tz,
                };
                commands::handle(cmd, &ctx).await
            };
            self.send_text(&incoming, &response).await;
            return;
        }

        let typing = self.start_typing(&incoming).await;
        let reply = self.process_turn(&incoming).await;
        drop(typing);

        self.deliver(&incoming, &reply.text, reply.voice).await;
        self.advance(&incoming, Stage::Delivered);
    }

    /// Run one conversational turn and return the text to deliver.
    pub(super) async fn process_turn(&self, incoming: &IncomingMessage) -> Reply {
        let started = Instant::now();
        let user_id = incoming.sender_id.as_str();

        let user_turn = self.build_user_turn(incoming).await;
        self.advance(incoming, Stage::Received);

        // --- AUGMENT WITH PROFILE AND HISTORY ---
        let profile = match self.profiles.get_profile(user_id).await {
            Ok(p) => p,
            Err(e) => {
                warn!("[{}] profile load failed for {user_id}: {e}", incoming.channel);
                UserProfile::empty(user_id)
            }
        };
        let mut history = match self.history.load_history(user_id).await {
            Ok(h) => h,
            Err(e) => {
                warn!("[{}] history load failed for {user_id}: {e}", incoming.channel);
                Vec::new()
            }
        };
        history.push(user_turn.clone());

        let context = Context {
            system_prompt: prompt::build_system_prompt(&self.settings, &profile, Utc::now()),
            history,
            grounding: self.settings.grounding,
        };
        self.advance(incoming, Stage::Augmented);

        // --- GENERATE ---
        let completion = match with_timeout(
            self.settings.generation_timeout_secs,
            "generation",
            self.provider.complete(&context),
        )
        .await
        {
            Ok(c) => c,
            Err(e) => {
                error!("[{}] generation failed for {user_id}: {e}", incoming.channel);
                self.persist(incoming, &user_turn).await;
                return Reply {
                    text: fallback::GENERATION_FALLBACK.to_string(),
                    voice: false,
                };
            }
        };
        self.advance(incoming, Stage::Generated);

        // --- RESOLVE TOOLS ---
        let new_fact = has_fact_sentinel(&completion.text);
        let parsed = parse_directives(&strip_fact_sentinel(&completion.text));

        let tool_ctx = ToolContext {
            owner_id: user_id.to_string(),
            channel: incoming.channel.clone(),
            channel_id: incoming
                .reply_target
                .clone()
                .unwrap_or_else(|| user_id.to_string()),
            now: Utc::now(),
        };
        let mut lines = Vec::with_capacity(parsed.directives.len());
        for directive in &parsed.directives {
            let outcome = self.tools.resolve(directive, &tool_ctx).await;
            lines.push(fallback::render(directive, &outcome));
        }

        let mut body = fallback::compose(&parsed.text, &lines);
        if body.is_empty() {
            body = fallback::EMPTY_REPLY.to_string();
        }
        self.advance(incoming, Stage::ToolResolved);

        // --- PERSIST ---
        self.persist(incoming, &user_turn).await;
        self.persist(incoming, &Turn::agent_text(body.clone())).await;

        if new_fact {
            match facts::extract_fact(
                self.provider.as_ref(),
                &user_turn,
                self.settings.generation_timeout_secs,
            )
            .await
            {
                Ok(Some(fact)) => match self.profiles.add_fact(user_id, &fact).await {
                    Ok(true) => info!("[{}] learned about {user_id}: {fact}", incoming.channel),
                    Ok(false) => debug!("[{}] fact already known: {fact}", incoming.channel),
                    Err(e) => warn!("[{}] failed to store fact: {e}", incoming.channel),
                },
                Ok(None) => debug!("[{}] fact sentinel without a fact", incoming.channel),
                Err(e) => warn!("[{}] fact extraction failed: {e}", incoming.channel),
            }
        }
        self.advance(incoming, Stage::Persisted);

        let meta = &completion.metadata;
        info!(
            "[{}] replied to {user_id} in {}ms ({} tool(s)) | {} {} | model {}ms, {} tokens",
            incoming.channel,
            started.elapsed().as_millis(),
            parsed.directives.len(),
            meta.provider_used,
            meta.model.as_deref().unwrap_or("-"),
            meta.processing_time_ms,
            meta.tokens_used.map_or_else(|| "?".to_string(), |t| t.to_string())
        );

        Reply {
            text: fallback::with_footer(&body, &completion.sources_footer()),
            voice: profile.voice_mode,
        }
    }

    /// Append one turn. Failures are logged and the turn is still delivered.
    async fn persist(&self, incoming: &IncomingMessage, turn: &Turn) {
        if let Err(e) = self.history.append_turn(&incoming.sender_id, turn).await {
            error!(
                "[{}] failed to save {} turn for {}: {e}",
                incoming.channel,
                turn.role().as_str(),
                incoming.sender_id
            );
        }
    }

    fn advance(&self, incoming: &IncomingMessage, stage: Stage) {
        debug!("[{}] {} turn {:?}", incoming.channel, incoming.id, stage);
    }

    /// Keep the typing indicator alive until the returned guard is dropped.
    async fn start_typing(&self, incoming: &IncomingMessage) -> Option<TypingGuard> {
        let ch = self.channels.get(&incoming.channel)?.clone();
        let target = incoming.reply_target.clone()?;
        let _ = ch.send_typing(&target).await;
        Some(TypingGuard(tokio::spawn(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                if ch.send_typing(&target).await.is_err() {
                    break;
                }
            }
        })))
    }
}

/// Stops the typing loop when dropped, including when a turn unwinds.
pub(super) struct TypingGuard(tokio::task::JoinHandle<()>);

impl Drop for TypingGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}
