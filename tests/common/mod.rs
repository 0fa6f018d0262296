// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::NaiveDate;
use nutrition_coach::config::Config;
use nutrition_coach::db::{FirestoreDb, MemoryDb};
use nutrition_coach::error::{AppError, Result};
use nutrition_coach::models::{ActivityLevel, Gender, Macros, MealDraft, MealSlot, MealSource, UserMetrics};
use nutrition_coach::services::llm::{Completion, CompletionClient, CompletionRequest};
use nutrition_coach::services::MemoryStorage;
use nutrition_coach::time_utils::FixedClock;
use nutrition_coach::{Backends, CoachSession};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const TEST_USER: &str = "user-1";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

#[allow(dead_code)]
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

/// The worked example: 80 kg male aiming for 75 kg.
#[allow(dead_code)]
pub fn test_metrics(user_id: &str) -> UserMetrics {
    UserMetrics {
        user_id: user_id.to_string(),
        current_weight: 80.0,
        goal_weight: 75.0,
        height: 178.0,
        age: 30,
        gender: Gender::Male,
        activity_level: ActivityLevel::Moderate,
        updated_at: String::new(),
    }
}

#[allow(dead_code)]
pub fn draft(name: &str, calories: f64, protein: f64, carbs: f64, fat: f64) -> MealDraft {
    MealDraft::new(
        name,
        Macros::new(calories, protein, carbs, fat),
        MealSlot::Lunch,
        MealSource::Manual,
    )
}

/// Completion client that replays queued replies and records requests.
///
/// With nothing queued it answers "Sounds good!".
#[derive(Default)]
pub struct ScriptedCompletions {
    replies: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

#[allow(dead_code)]
impl ScriptedCompletions {
    pub fn reply(&self, content: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(content.to_string()));
    }

    pub fn fail(&self, error: AppError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletions {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.replies.lock().unwrap().pop_front();
        let content = next.unwrap_or_else(|| Ok("Sounds good!".to_string()))?;
        Ok(Completion {
            content,
            model: request.model.clone(),
        })
    }
}

/// A coach session over in-process backends, with handles to each.
#[allow(dead_code)]
pub struct TestApp {
    pub session: CoachSession,
    pub db: Arc<MemoryDb>,
    pub storage: Arc<MemoryStorage>,
    pub completions: Arc<ScriptedCompletions>,
    pub clock: Arc<FixedClock>,
}

#[allow(dead_code)]
pub fn test_app() -> TestApp {
    test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn test_app_with(config: Config) -> TestApp {
    let db = Arc::new(MemoryDb::new());
    let storage = Arc::new(MemoryStorage::new());
    let completions = Arc::new(ScriptedCompletions::default());
    let clock = Arc::new(FixedClock::on(test_date()));

    let session = CoachSession::with_backends(
        config,
        TEST_USER,
        Backends {
            db: db.clone(),
            storage: storage.clone(),
            completions: completions.clone(),
            clock: clock.clone(),
        },
    );

    TestApp {
        session,
        db,
        storage,
        completions,
        clock,
    }
}

/// Test app for a user who has finished onboarding.
#[allow(dead_code)]
pub async fn onboarded_app() -> TestApp {
    let app = test_app();
    app.session
        .metrics
        .save_metrics(&test_metrics(TEST_USER))
        .await
        .expect("Failed to save metrics");
    app
}
