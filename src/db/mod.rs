//! Database layer.
//!
//! Workflows talk to storage through the [`Database`] trait. Production uses
//! Firestore; [`MemoryDb`] backs offline mode and tests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ChatMessage, ChatSession, DailyNutritionGoals, DailyNutritionLog, FoodEntry, UserMetrics,
    WeightEntry,
};

/// Collection names as constants.
pub mod collections {
    pub const USER_METRICS: &str = "user_metrics";
    pub const WEIGHT_ENTRIES: &str = "weight_entries";
    /// Keyed by `{user_id}_{YYYY-MM-DD}`
    pub const DAILY_NUTRITION_GOALS: &str = "daily_nutrition_goals";
    /// Keyed by `{user_id}_{YYYY-MM-DD}`
    pub const DAILY_NUTRITION_LOGS: &str = "daily_nutrition_logs";
    pub const FOOD_ENTRIES: &str = "food_entries";
    pub const CHAT_SESSIONS: &str = "chat_sessions";
    pub const CHAT_MESSAGES: &str = "chat_messages";
}

/// Mutation applied to a daily log inside [`Database::update_log_atomic`].
///
/// May be invoked more than once if the store retries on contention.
pub type LogMutation<'a> = &'a (dyn Fn(&mut DailyNutritionLog) -> Result<()> + Send + Sync);

/// Typed access to the backing store.
///
/// Every single call is atomic at the store. Nothing here spans more than
/// one record except [`Database::update_log_atomic`], which is a
/// read-modify-write of one log document.
#[async_trait]
pub trait Database: Send + Sync {
    // ─── User Metrics ────────────────────────────────────────────

    async fn get_user_metrics(&self, user_id: &str) -> Result<Option<UserMetrics>>;

    async fn upsert_user_metrics(&self, metrics: &UserMetrics) -> Result<()>;

    async fn insert_weight_entry(&self, entry: &WeightEntry) -> Result<()>;

    /// Weigh-ins newest first.
    async fn list_weight_entries(&self, user_id: &str, limit: u32) -> Result<Vec<WeightEntry>>;

    // ─── Daily Goals ─────────────────────────────────────────────

    async fn get_goals(&self, user_id: &str, date: NaiveDate)
        -> Result<Option<DailyNutritionGoals>>;

    /// Create a goals record; fails with `AlreadyExists` if one is present.
    async fn insert_goals(&self, goals: &DailyNutritionGoals) -> Result<()>;

    async fn upsert_goals(&self, goals: &DailyNutritionGoals) -> Result<()>;

    // ─── Daily Logs ──────────────────────────────────────────────

    async fn get_log(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailyNutritionLog>>;

    /// Create a log; fails with `AlreadyExists` if one is present.
    async fn insert_log(&self, log: &DailyNutritionLog) -> Result<()>;

    /// Atomically read, mutate and write back one log.
    ///
    /// Fails with `NotFound` if the log does not exist. Errors returned by
    /// `mutate` abort the update and are passed through.
    async fn update_log_atomic(
        &self,
        user_id: &str,
        date: NaiveDate,
        mutate: LogMutation<'_>,
    ) -> Result<DailyNutritionLog>;

    // ─── Food Entries ────────────────────────────────────────────

    async fn insert_food_entry(&self, entry: &FoodEntry) -> Result<()>;

    async fn get_food_entry(&self, id: Uuid) -> Result<Option<FoodEntry>>;

    async fn set_food_entry_image(
        &self,
        id: Uuid,
        image_url: &str,
        thumbnail_url: Option<&str>,
    ) -> Result<()>;

    async fn delete_food_entry(&self, id: Uuid) -> Result<()>;

    /// Entries owned by the given day's log, oldest first.
    async fn list_food_entries(&self, user_id: &str, date: NaiveDate) -> Result<Vec<FoodEntry>>;

    // ─── Chat ────────────────────────────────────────────────────

    async fn insert_chat_session(&self, session: &ChatSession) -> Result<()>;

    async fn get_chat_session(&self, id: Uuid) -> Result<Option<ChatSession>>;

    /// Sessions ordered by `last_message_at` descending.
    async fn list_chat_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>>;

    async fn update_chat_session(&self, session: &ChatSession) -> Result<()>;

    async fn delete_chat_session(&self, id: Uuid) -> Result<()>;

    async fn insert_chat_message(&self, message: &ChatMessage) -> Result<()>;

    /// Messages ordered by `created_at` ascending.
    async fn list_chat_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>>;

    async fn count_chat_messages(&self, session_id: Uuid) -> Result<usize>;

    async fn delete_chat_messages(&self, session_id: Uuid) -> Result<usize>;
}
