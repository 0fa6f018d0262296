// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Coach chat: sessions, message history and single-turn completions.

use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{ChatMessage, ChatSession, Role, DEFAULT_SESSION_TITLE};
use crate::services::llm::{CompletionClient, CompletionRequest, PromptMessage};
use crate::services::nutrition_context::NutritionContextProvider;
use crate::services::retry::{retry_until_verified, RetryPolicy};
use crate::services::router::MessageRouter;
use crate::time_utils::{format_utc_rfc3339, Clock};

const COACH_PROMPT: &str = "You are a nutrition coach assistant helping users track their meals and reach their fitness goals. \
Provide specific, actionable advice based on their meal logs and goals.";

/// Longest title derived from a first message.
pub const MAX_TITLE_CHARS: usize = 40;

/// Title for a session, taken from its first user message.
///
/// Whitespace is collapsed; longer text is cut at the last word boundary
/// within [`MAX_TITLE_CHARS`].
pub fn title_from_message(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_TITLE_CHARS {
        return collapsed;
    }

    let cut: String = collapsed.chars().take(MAX_TITLE_CHARS).collect();
    // A space right after the cut means the last word fits whole.
    if collapsed.chars().nth(MAX_TITLE_CHARS) == Some(' ') {
        return cut;
    }
    match cut.rfind(' ') {
        Some(idx) if idx > 0 => cut[..idx].to_string(),
        _ => cut,
    }
}

/// The two messages produced by one successful send.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub session: ChatSession,
    pub user_message: ChatMessage,
    pub assistant_message: ChatMessage,
}

/// Outcome of an empty-session cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Empty default-titled sessions found
    pub candidates: usize,
    pub deleted: usize,
    /// Deletes still not visible when retries ran out
    pub unverified: usize,
}

#[derive(Clone)]
pub struct ChatService {
    db: Arc<dyn Database>,
    client: Arc<dyn CompletionClient>,
    router: Option<MessageRouter>,
    clock: Arc<dyn Clock>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    cleanup_policy: RetryPolicy,
}

impl ChatService {
    pub fn new(
        db: Arc<dyn Database>,
        client: Arc<dyn CompletionClient>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        let router = config
            .enable_message_routing
            .then(|| MessageRouter::new(client.clone(), config.router_model.clone()));
        Self {
            db,
            client,
            router,
            clock,
            model: config.chat_model.clone(),
            temperature: config.chat_temperature,
            max_tokens: config.chat_max_tokens,
            cleanup_policy: RetryPolicy::from_config(config),
        }
    }

    pub async fn create_session(&self, user_id: &str, title: Option<&str>) -> Result<ChatSession> {
        let now = format_utc_rfc3339(self.clock.now());
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_SESSION_TITLE);

        let session = ChatSession {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at: now.clone(),
            last_message_at: now,
        };
        self.db.insert_chat_session(&session).await.inspect_err(|e| {
            tracing::warn!(user_id, error = %e, "Failed to create chat session");
        })?;

        tracing::info!(user_id, session_id = %session.id, "Chat session created");
        Ok(session)
    }

    /// Sessions, most recently active first.
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>> {
        self.db.list_chat_sessions(user_id).await.inspect_err(|e| {
            tracing::warn!(user_id, error = %e, "Failed to list chat sessions");
        })
    }

    /// Messages of a session in the order they were sent.
    pub async fn load_session(&self, user_id: &str, session_id: Uuid) -> Result<Vec<ChatMessage>> {
        self.owned_session(user_id, session_id).await?;
        let messages = self.db.list_chat_messages(session_id).await.inspect_err(|e| {
            tracing::warn!(user_id, %session_id, error = %e, "Failed to load chat messages");
        })?;
        tracing::debug!(%session_id, count = messages.len(), "Chat session loaded");
        Ok(messages)
    }

    pub async fn delete_session(&self, user_id: &str, session_id: Uuid) -> Result<()> {
        self.owned_session(user_id, session_id).await?;
        let removed = self.db.delete_chat_messages(session_id).await?;
        self.db.delete_chat_session(session_id).await?;
        tracing::info!(user_id, %session_id, removed, "Chat session deleted");
        Ok(())
    }

    /// Send a user message and store the coach's reply.
    ///
    /// The user message is stored before the completion call. If the call
    /// fails the error is `SendFailed` and the user message stays in the
    /// history so the send can be retried.
    pub async fn send_message(
        &self,
        ctx: &NutritionContextProvider,
        session_id: Uuid,
        text: &str,
    ) -> Result<Exchange> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::InvalidMessage("message is empty".to_string()));
        }
        let user_id = ctx.user_id();
        let mut session = self.owned_session(user_id, session_id).await?;

        let history = self.db.list_chat_messages(session_id).await?;

        let sent_at = self.clock.now();
        let user_message = ChatMessage {
            id: Uuid::new_v4(),
            session_id,
            role: Role::User,
            content: text.to_string(),
            created_at: format_utc_rfc3339(sent_at),
        };
        self.db
            .insert_chat_message(&user_message)
            .await
            .inspect_err(|e| {
                tracing::warn!(user_id, %session_id, error = %e, "Failed to store user message");
            })?;

        session.last_message_at = user_message.created_at.clone();
        self.db.update_chat_session(&session).await?;

        let request = self.build_request(ctx, &history, text).await?;
        let completion = self.client.complete(&request).await.map_err(|e| {
            tracing::warn!(user_id, %session_id, error = %e, "Coach completion failed");
            AppError::SendFailed(e.to_string())
        })?;

        // Keep the reply strictly after the question when ordering by time.
        let replied_at = self.clock.now().max(sent_at + Duration::milliseconds(1));
        let assistant_message = ChatMessage {
            id: Uuid::new_v4(),
            session_id,
            role: Role::Assistant,
            content: completion.content,
            created_at: format_utc_rfc3339(replied_at),
        };
        self.db
            .insert_chat_message(&assistant_message)
            .await
            .map_err(|e| {
                tracing::warn!(user_id, %session_id, error = %e, "Failed to store coach reply");
                AppError::SendFailed(e.to_string())
            })?;

        session.last_message_at = assistant_message.created_at.clone();
        if session.has_default_title() {
            session.title = title_from_message(text);
            tracing::debug!(%session_id, title = %session.title, "Chat session renamed");
        }
        self.db.update_chat_session(&session).await?;

        tracing::info!(
            user_id,
            %session_id,
            model = %completion.model,
            "Coach replied"
        );

        Ok(Exchange {
            session,
            user_message,
            assistant_message,
        })
    }

    /// Create a session and send its first message.
    pub async fn start_conversation(
        &self,
        ctx: &NutritionContextProvider,
        text: &str,
    ) -> Result<Exchange> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidMessage("message is empty".to_string()));
        }
        let session = self.create_session(ctx.user_id(), None).await?;
        self.send_message(ctx, session.id, text).await
    }

    /// Delete the user's empty, still default-titled sessions.
    ///
    /// Deletes are verified by re-reading and retried with backoff. A delete
    /// that never becomes visible is logged and counted, not returned as an
    /// error.
    pub async fn cleanup_empty_sessions(&self, user_id: &str) -> Result<CleanupReport> {
        let sessions = self.db.list_chat_sessions(user_id).await?;
        let mut report = CleanupReport::default();

        for session in sessions.iter().filter(|s| s.has_default_title()) {
            if self.db.count_chat_messages(session.id).await? > 0 {
                continue;
            }
            report.candidates += 1;

            let db = &self.db;
            let id = session.id;
            let resource = format!("chat_sessions/{}", id);
            let outcome = retry_until_verified(
                &self.cleanup_policy,
                &resource,
                || db.delete_chat_session(id),
                || async move { Ok(db.get_chat_session(id).await?.is_none()) },
            )
            .await;

            match outcome {
                Ok(attempts) => {
                    report.deleted += 1;
                    tracing::debug!(user_id, session_id = %id, attempts, "Empty chat session deleted");
                }
                Err(e) => {
                    report.unverified += 1;
                    tracing::warn!(user_id, session_id = %id, error = %e, "Empty chat session cleanup gave up");
                }
            }
        }

        if report.candidates > 0 {
            tracing::info!(
                user_id,
                deleted = report.deleted,
                unverified = report.unverified,
                "Empty chat sessions cleaned up"
            );
        }
        Ok(report)
    }

    async fn build_request(
        &self,
        ctx: &NutritionContextProvider,
        history: &[ChatMessage],
        text: &str,
    ) -> Result<CompletionRequest> {
        let system_prompt = match &self.router {
            Some(router) => router.classify(text).await.category.system_prompt(),
            None => COACH_PROMPT.to_string(),
        };

        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(PromptMessage::system(system_prompt));

        match ctx.summary() {
            Some(summary) => {
                let json = serde_json::to_string(&summary).map_err(anyhow::Error::from)?;
                messages.push(PromptMessage::system(format!(
                    "User's nutrition for {}: {}",
                    summary.date, json
                )));
            }
            None => {
                tracing::debug!(user_id = ctx.user_id(), "No nutrition context loaded for prompt");
            }
        }

        messages.extend(
            history
                .iter()
                .map(|m| PromptMessage::new(m.role, m.content.clone())),
        );
        messages.push(PromptMessage::user(text));

        Ok(CompletionRequest::new(self.model.clone(), messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens))
    }

    async fn owned_session(&self, user_id: &str, session_id: Uuid) -> Result<ChatSession> {
        match self.db.get_chat_session(session_id).await? {
            Some(session) if session.user_id == user_id => Ok(session),
            _ => Err(AppError::SessionNotFound(session_id.to_string())),
        }
    }
}
