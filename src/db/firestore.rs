// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed [`Database`].
//!
//! Per-(user, date) records use the document ID `{user_id}_{YYYY-MM-DD}`,
//! so Firestore itself rejects a second goals or log document for the same
//! day. Log mutations run as transactions.

use async_trait::async_trait;
use chrono::NaiveDate;
use firestore::errors::FirestoreError;
use firestore::{FirestoreConsistencySelector, FirestoreQueryDirection};
use std::time::Duration;
use uuid::Uuid;

use crate::db::{collections, Database, LogMutation};
use crate::error::{AppError, Result};
use crate::models::goals::day_doc_id;
use crate::models::{
    ChatMessage, ChatSession, DailyNutritionGoals, DailyNutritionLog, FoodEntry, UserMetrics,
    WeightEntry,
};
use crate::time_utils::format_date;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

const MAX_TRANSACTION_ATTEMPTS: u32 = 5;
const TRANSACTION_RETRY_BASE_MS: u64 = 25;

/// Aborted or temporarily unavailable; the whole transaction may be retried.
fn is_contention(e: &FirestoreError) -> bool {
    matches!(e, FirestoreError::DatabaseError(db) if db.retry_possible)
}

fn db_err(e: FirestoreError) -> AppError {
    AppError::RemoteUnavailable(format!("Firestore: {}", e))
}

/// Map a create failure, reporting an existing document as `AlreadyExists`.
fn insert_err(doc_id: &str, e: FirestoreError) -> AppError {
    match e {
        FirestoreError::DataConflictError(_) => AppError::AlreadyExists(doc_id.to_string()),
        other => db_err(other),
    }
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            AppError::RemoteUnavailable(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::RemoteUnavailable(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    async fn get_doc<T>(&self, collection: &str, doc_id: &str) -> Result<Option<T>>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        self.client
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(doc_id)
            .await
            .map_err(db_err)
    }

    async fn set_doc<T>(&self, collection: &str, doc_id: &str, object: &T) -> Result<()>
    where
        T: serde::Serialize + Sync + Send,
        for<'de> T: serde::Deserialize<'de>,
    {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collection)
            .document_id(doc_id)
            .object(object)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn create_doc<T>(&self, collection: &str, doc_id: &str, object: &T) -> Result<()>
    where
        T: serde::Serialize + Sync + Send,
        for<'de> T: serde::Deserialize<'de>,
    {
        let _: () = self
            .client
            .fluent()
            .insert()
            .into(collection)
            .document_id(doc_id)
            .object(object)
            .execute()
            .await
            .map_err(|e| insert_err(doc_id, e))?;
        Ok(())
    }

    async fn delete_doc(&self, collection: &str, doc_id: &str) -> Result<()> {
        self.client
            .fluent()
            .delete()
            .from(collection)
            .document_id(doc_id)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// One transaction attempt. `Ok(None)` means the attempt was aborted by
    /// contention and may be retried.
    async fn try_update_log(
        &self,
        doc_id: &str,
        mutate: LogMutation<'_>,
    ) -> Result<Option<DailyNutritionLog>> {
        let mut transaction = self.client.begin_transaction().await.map_err(|e| {
            AppError::RemoteUnavailable(format!("Failed to begin transaction: {}", e))
        })?;

        // 1. Read through the transaction so the commit checks this document
        let reader = self
            .client
            .clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ));
        let current: Option<DailyNutritionLog> = match reader
            .fluent()
            .select()
            .by_id_in(collections::DAILY_NUTRITION_LOGS)
            .obj()
            .one(doc_id)
            .await
        {
            Ok(current) => current,
            Err(e) => {
                let _ = transaction.rollback().await;
                if is_contention(&e) {
                    return Ok(None);
                }
                return Err(AppError::RemoteUnavailable(format!(
                    "Failed to read log in transaction: {}",
                    e
                )));
            }
        };

        let Some(mut log) = current else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("daily log {}", doc_id)));
        };

        // 2. Apply the mutation in memory
        if let Err(e) = mutate(&mut log) {
            let _ = transaction.rollback().await;
            return Err(e);
        }

        // 3. Write back and commit
        self.client
            .fluent()
            .update()
            .in_col(collections::DAILY_NUTRITION_LOGS)
            .document_id(doc_id)
            .object(&log)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::RemoteUnavailable(format!("Failed to add log to transaction: {}", e))
            })?;

        match transaction.commit().await {
            Ok(_) => Ok(Some(log)),
            Err(e) if is_contention(&e) => Ok(None),
            Err(e) => Err(AppError::RemoteUnavailable(format!(
                "Transaction commit failed: {}",
                e
            ))),
        }
    }

    /// Helper to batch delete documents using transactions.
    async fn batch_delete(&self, doc_ids: &[String], collection: &str) -> Result<()> {
        for chunk in doc_ids.chunks(BATCH_SIZE) {
            let mut transaction = self.client.begin_transaction().await.map_err(|e| {
                AppError::RemoteUnavailable(format!("Failed to begin transaction: {}", e))
            })?;

            for doc_id in chunk {
                self.client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::RemoteUnavailable(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::RemoteUnavailable(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl Database for FirestoreDb {
    // ─── User Metrics ────────────────────────────────────────────

    async fn get_user_metrics(&self, user_id: &str) -> Result<Option<UserMetrics>> {
        self.get_doc(collections::USER_METRICS, user_id).await
    }

    async fn upsert_user_metrics(&self, metrics: &UserMetrics) -> Result<()> {
        self.set_doc(collections::USER_METRICS, &metrics.user_id, metrics)
            .await
    }

    async fn insert_weight_entry(&self, entry: &WeightEntry) -> Result<()> {
        let doc_id = entry.id.to_string();
        self.create_doc(collections::WEIGHT_ENTRIES, &doc_id, entry)
            .await
    }

    async fn list_weight_entries(&self, user_id: &str, limit: u32) -> Result<Vec<WeightEntry>> {
        self.client
            .fluent()
            .select()
            .from(collections::WEIGHT_ENTRIES)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .order_by([("recorded_at", FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    // ─── Daily Goals ─────────────────────────────────────────────

    async fn get_goals(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyNutritionGoals>> {
        self.get_doc(collections::DAILY_NUTRITION_GOALS, &day_doc_id(user_id, date))
            .await
    }

    async fn insert_goals(&self, goals: &DailyNutritionGoals) -> Result<()> {
        self.create_doc(collections::DAILY_NUTRITION_GOALS, &goals.doc_id(), goals)
            .await
    }

    async fn upsert_goals(&self, goals: &DailyNutritionGoals) -> Result<()> {
        self.set_doc(collections::DAILY_NUTRITION_GOALS, &goals.doc_id(), goals)
            .await
    }

    // ─── Daily Logs ──────────────────────────────────────────────

    async fn get_log(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailyNutritionLog>> {
        self.get_doc(collections::DAILY_NUTRITION_LOGS, &day_doc_id(user_id, date))
            .await
    }

    async fn insert_log(&self, log: &DailyNutritionLog) -> Result<()> {
        self.create_doc(collections::DAILY_NUTRITION_LOGS, &log.doc_id(), log)
            .await
    }

    /// Read-modify-write of one log inside a Firestore transaction.
    ///
    /// The read is bound to the transaction, so a concurrent write to the
    /// same log makes the commit abort. Aborted attempts are retried with a
    /// fresh read, which re-runs `mutate`.
    async fn update_log_atomic(
        &self,
        user_id: &str,
        date: NaiveDate,
        mutate: LogMutation<'_>,
    ) -> Result<DailyNutritionLog> {
        let doc_id = day_doc_id(user_id, date);

        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            if let Some(log) = self.try_update_log(&doc_id, mutate).await? {
                tracing::debug!(
                    user_id,
                    date = %date,
                    attempt,
                    meals = log.meals_data.len(),
                    "Daily log updated atomically"
                );
                return Ok(log);
            }

            tracing::warn!(user_id, date = %date, attempt, "Daily log transaction aborted");
            if attempt < MAX_TRANSACTION_ATTEMPTS {
                tokio::time::sleep(Duration::from_millis(TRANSACTION_RETRY_BASE_MS << attempt)).await;
            }
        }

        Err(AppError::RemoteUnavailable(format!(
            "Transaction on {} kept conflicting after {} attempts",
            doc_id, MAX_TRANSACTION_ATTEMPTS
        )))
    }

    // ─── Food Entries ────────────────────────────────────────────

    async fn insert_food_entry(&self, entry: &FoodEntry) -> Result<()> {
        let doc_id = entry.id.to_string();
        self.create_doc(collections::FOOD_ENTRIES, &doc_id, entry)
            .await
    }

    async fn get_food_entry(&self, id: Uuid) -> Result<Option<FoodEntry>> {
        self.get_doc(collections::FOOD_ENTRIES, &id.to_string())
            .await
    }

    async fn set_food_entry_image(
        &self,
        id: Uuid,
        image_url: &str,
        thumbnail_url: Option<&str>,
    ) -> Result<()> {
        let mut entry = self
            .get_food_entry(id)
            .await?
            .ok_or_else(|| AppError::MealNotFound(id.to_string()))?;
        entry.image_url = Some(image_url.to_string());
        entry.thumbnail_url = thumbnail_url.map(str::to_string);
        self.set_doc(collections::FOOD_ENTRIES, &id.to_string(), &entry)
            .await
    }

    async fn delete_food_entry(&self, id: Uuid) -> Result<()> {
        self.delete_doc(collections::FOOD_ENTRIES, &id.to_string())
            .await
    }

    async fn list_food_entries(&self, user_id: &str, date: NaiveDate) -> Result<Vec<FoodEntry>> {
        let log_date = format_date(date);
        self.client
            .fluent()
            .select()
            .from(collections::FOOD_ENTRIES)
            .filter(|q| {
                q.for_all([
                    q.field("user_id").eq(user_id),
                    q.field("log_date").eq(log_date.as_str()),
                ])
            })
            .order_by([("created_at", FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    // ─── Chat ────────────────────────────────────────────────────

    async fn insert_chat_session(&self, session: &ChatSession) -> Result<()> {
        let doc_id = session.id.to_string();
        self.create_doc(collections::CHAT_SESSIONS, &doc_id, session)
            .await
    }

    async fn get_chat_session(&self, id: Uuid) -> Result<Option<ChatSession>> {
        self.get_doc(collections::CHAT_SESSIONS, &id.to_string())
            .await
    }

    async fn list_chat_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>> {
        self.client
            .fluent()
            .select()
            .from(collections::CHAT_SESSIONS)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .order_by([("last_message_at", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    async fn update_chat_session(&self, session: &ChatSession) -> Result<()> {
        self.set_doc(collections::CHAT_SESSIONS, &session.id.to_string(), session)
            .await
    }

    async fn delete_chat_session(&self, id: Uuid) -> Result<()> {
        self.delete_doc(collections::CHAT_SESSIONS, &id.to_string())
            .await
    }

    async fn insert_chat_message(&self, message: &ChatMessage) -> Result<()> {
        let doc_id = message.id.to_string();
        self.create_doc(collections::CHAT_MESSAGES, &doc_id, message)
            .await
    }

    async fn list_chat_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
        let session_id = session_id.to_string();
        self.client
            .fluent()
            .select()
            .from(collections::CHAT_MESSAGES)
            .filter(|q| q.for_all([q.field("session_id").eq(session_id.as_str())]))
            .order_by([("created_at", FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    async fn count_chat_messages(&self, session_id: Uuid) -> Result<usize> {
        Ok(self.list_chat_messages(session_id).await?.len())
    }

    async fn delete_chat_messages(&self, session_id: Uuid) -> Result<usize> {
        let doc_ids: Vec<String> = self
            .list_chat_messages(session_id)
            .await?
            .iter()
            .map(|m| m.id.to_string())
            .collect();
        self.batch_delete(&doc_ids, collections::CHAT_MESSAGES)
            .await?;
        tracing::debug!(%session_id, count = doc_ids.len(), "Deleted chat messages");
        Ok(doc_ids.len())
    }
}
