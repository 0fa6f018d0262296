// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod analysis;
pub mod auth;
pub mod chat;
pub mod daily_log;
pub mod goals;
pub mod llm;
pub mod meals;
pub mod metrics;
pub mod nutrition_context;
pub mod retry;
pub mod router;
pub mod storage;

pub use analysis::{MealAnalyzer, MealEstimate};
pub use auth::{AuthClient, AuthSession, IdentityClient};
pub use chat::{ChatService, CleanupReport, Exchange};
pub use daily_log::DailyLogStore;
pub use goals::{calculate_daily_goals, GoalsStore};
pub use llm::{CompletionClient, OpenAiCompatibleClient, Provider};
pub use meals::{LoggedMeal, MealLogger};
pub use metrics::{MetricsService, WeightTrend};
pub use nutrition_context::{NutritionContextProvider, NutritionSnapshot};
pub use retry::{retry_until_verified, RetryPolicy};
pub use router::{MessageCategory, MessageRouter};
pub use storage::{FirebaseStorage, MemoryStorage, ObjectStorage};
