// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Nutrition Coach: meal tracking against daily macro goals, with an AI coach
//!
//! This crate is the client-side core of a nutrition coaching app. A host
//! shell signs the user in, builds a [`CoachSession`] and drives the
//! workflows on it: logging meals, browsing days, and chatting with the
//! coach. Storage is Firestore (or an in-process store when offline).

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use db::{Database, FirestoreDb};
use error::{AppError, Result};
use services::{
    AuthClient, ChatService, CompletionClient, DailyLogStore, FirebaseStorage, GoalsStore,
    MealAnalyzer, MealLogger, MetricsService, NutritionContextProvider, NutritionSnapshot,
    ObjectStorage, OpenAiCompatibleClient,
};
use time_utils::{Clock, SystemClock};

/// External systems a session talks to.
#[derive(Clone)]
pub struct Backends {
    pub db: Arc<dyn Database>,
    pub storage: Arc<dyn ObjectStorage>,
    pub completions: Arc<dyn CompletionClient>,
    pub clock: Arc<dyn Clock>,
}

/// Everything one signed-in user's app session needs.
///
/// Created after sign-in and consumed by [`CoachSession::sign_out`]. The
/// nutrition context lives here and nowhere else; workflows get it passed
/// in explicitly.
pub struct CoachSession {
    config: Config,
    user_id: String,
    auth: Option<AuthClient>,
    clock: Arc<dyn Clock>,
    pub goals: GoalsStore,
    pub logs: DailyLogStore,
    pub meals: MealLogger,
    pub nutrition: NutritionContextProvider,
    pub chat: ChatService,
    pub analyzer: MealAnalyzer,
    pub metrics: MetricsService,
}

impl CoachSession {
    /// Connect to Firestore, Firebase Storage and the configured completion
    /// provider for the signed-in user.
    pub async fn connect(config: Config, auth: AuthClient) -> Result<Self> {
        let user_id = auth.user_id()?;
        let api_key = config
            .llm_api_key()
            .ok_or_else(|| AppError::Completion(AppError::COMPLETION_KEY_ERROR.to_string()))?
            .to_string();

        let backends = Backends {
            db: Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
            storage: Arc::new(FirebaseStorage::new(
                config.storage_bucket.clone(),
                auth.clone(),
            )),
            completions: Arc::new(OpenAiCompatibleClient::new(config.llm_provider, api_key)),
            clock: Arc::new(SystemClock),
        };

        let mut session = Self::with_backends(config, user_id, backends);
        session.auth = Some(auth);
        Ok(session)
    }

    /// A session over caller-supplied backends (offline mode, tests).
    pub fn with_backends(config: Config, user_id: impl Into<String>, backends: Backends) -> Self {
        let user_id = user_id.into();
        let Backends {
            db,
            storage,
            completions,
            clock,
        } = backends;

        let goals = GoalsStore::new(db.clone(), clock.clone());
        let logs = DailyLogStore::new(db.clone(), clock.clone());
        let nutrition =
            NutritionContextProvider::new(user_id.clone(), goals.clone(), logs.clone(), clock.as_ref());
        let meals = MealLogger::new(
            db.clone(),
            logs.clone(),
            storage,
            clock.clone(),
            config.food_images_prefix.clone(),
        );
        let chat = ChatService::new(db.clone(), completions.clone(), clock.clone(), &config);
        let analyzer = MealAnalyzer::new(completions, config.analysis_model.clone());
        let metrics = MetricsService::new(db, goals.clone(), clock.clone());

        tracing::info!(user_id = %user_id, "Coach session created");

        Self {
            config,
            user_id,
            auth: None,
            clock,
            goals,
            logs,
            meals,
            nutrition,
            chat,
            analyzer,
            metrics,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load today, tidy empty chats and prepare the coming week's goals.
    ///
    /// Cleanup failures are only logged. A failure to prepare upcoming goals
    /// is returned after today has been loaded.
    pub async fn start(&self) -> Result<NutritionSnapshot> {
        let snapshot = self.nutrition.set_selected_date(self.clock.today()).await;

        if let Err(e) = self.chat.cleanup_empty_sessions(&self.user_id).await {
            tracing::warn!(user_id = %self.user_id, error = %e, "Empty chat cleanup failed");
        }

        self.goals.ensure_upcoming_goals(&self.user_id).await?;
        Ok(snapshot)
    }

    /// End the session, dropping all cached state.
    pub fn sign_out(self) {
        if let Some(auth) = &self.auth {
            auth.sign_out();
        }
        tracing::info!(user_id = %self.user_id, "Coach session closed");
    }
}
