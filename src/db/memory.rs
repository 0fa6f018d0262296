// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process [`Database`] for offline mode and tests.
//!
//! Behaves like the Firestore backend (unique per-day records, atomic log
//! updates, ordered queries) and exposes a few fault hooks so tests can
//! reproduce remote failures, slow reads and deletes that become visible
//! late.

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::db::{Database, LogMutation};
use crate::error::{AppError, Result};
use crate::models::goals::day_doc_id;
use crate::models::{
    ChatMessage, ChatSession, DailyNutritionGoals, DailyNutritionLog, FoodEntry, UserMetrics,
    WeightEntry,
};

#[derive(Default)]
pub struct MemoryDb {
    metrics: DashMap<String, UserMetrics>,
    weights: DashMap<String, Vec<WeightEntry>>,
    goals: DashMap<String, DailyNutritionGoals>,
    logs: DashMap<String, DailyNutritionLog>,
    food_entries: DashMap<Uuid, FoodEntry>,
    sessions: DashMap<Uuid, ChatSession>,
    messages: DashMap<Uuid, Vec<ChatMessage>>,

    // ─── Fault injection ─────────────────────────────────────────
    offline: AtomicBool,
    deferred_deletes: AtomicU32,
    pending_deletes: Mutex<Vec<Uuid>>,
    stale_session_reads: AtomicU32,
    deleted_sessions: DashMap<Uuid, ChatSession>,
    failing_goal_dates: DashSet<NaiveDate>,
    read_delays: DashMap<NaiveDate, Duration>,
    fail_message_inserts: AtomicBool,
    fail_log_updates: AtomicBool,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with `RemoteUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Acknowledge the next `count` session deletes without applying them
    /// until the following delete call, like a store whose deletes become
    /// visible asynchronously.
    pub fn defer_deletes(&self, count: u32) {
        self.deferred_deletes.store(count, Ordering::SeqCst);
    }

    /// Keep serving deleted sessions to the next `reads` session lookups,
    /// like a store whose deletes never become visible to this reader.
    pub fn serve_stale_session_reads(&self, reads: u32) {
        self.stale_session_reads.store(reads, Ordering::SeqCst);
    }

    /// Fail goal writes for one date.
    pub fn fail_goal_writes_on(&self, date: NaiveDate) {
        self.failing_goal_dates.insert(date);
    }

    /// Delay the responses to goal and log reads for one date. The data is
    /// read first, so a delayed response can be older than a write that
    /// lands during the delay.
    pub fn set_read_delay(&self, date: NaiveDate, delay: Duration) {
        self.read_delays.insert(date, delay);
    }

    /// Fail chat message inserts.
    pub fn fail_message_inserts(&self, fail: bool) {
        self.fail_message_inserts.store(fail, Ordering::SeqCst);
    }

    /// Fail atomic log updates.
    pub fn fail_log_updates(&self, fail: bool) {
        self.fail_log_updates.store(fail, Ordering::SeqCst);
    }

    /// Number of stored goals records, across all users.
    pub fn goals_count(&self) -> usize {
        self.goals.len()
    }

    /// Number of stored food entries, across all users.
    pub fn food_entry_count(&self) -> usize {
        self.food_entries.len()
    }

    /// Titles of the user's stored sessions.
    pub fn session_titles(&self, user_id: &str) -> HashMap<Uuid, String> {
        self.sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| (s.id, s.title.clone()))
            .collect()
    }

    /// Overwrite a log without going through the atomic path, for tests
    /// that need a drifted aggregate.
    pub fn put_log_raw(&self, log: DailyNutritionLog) {
        self.logs.insert(log.doc_id(), log);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::RemoteUnavailable(
                "memory store offline".to_string(),
            ));
        }
        Ok(())
    }

    async fn read_delay(&self, date: NaiveDate) {
        let delay = self.read_delays.get(&date).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_goal_write(&self, date: NaiveDate) -> Result<()> {
        if self.failing_goal_dates.contains(&date) {
            return Err(AppError::RemoteUnavailable(format!(
                "goal write rejected for {}",
                date
            )));
        }
        Ok(())
    }

    fn apply_pending_deletes(&self) {
        let pending: Vec<Uuid> = {
            let mut guard = self
                .pending_deletes
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        for id in pending {
            if let Some((_, session)) = self.sessions.remove(&id) {
                self.deleted_sessions.insert(id, session);
            }
        }
    }
}

#[async_trait]
impl Database for MemoryDb {
    async fn get_user_metrics(&self, user_id: &str) -> Result<Option<UserMetrics>> {
        self.check_online()?;
        Ok(self.metrics.get(user_id).map(|m| m.clone()))
    }

    async fn upsert_user_metrics(&self, metrics: &UserMetrics) -> Result<()> {
        self.check_online()?;
        self.metrics
            .insert(metrics.user_id.clone(), metrics.clone());
        Ok(())
    }

    async fn insert_weight_entry(&self, entry: &WeightEntry) -> Result<()> {
        self.check_online()?;
        self.weights
            .entry(entry.user_id.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn list_weight_entries(&self, user_id: &str, limit: u32) -> Result<Vec<WeightEntry>> {
        self.check_online()?;
        let mut entries = self
            .weights
            .get(user_id)
            .map(|e| e.clone())
            .unwrap_or_default();
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        entries.truncate(limit as usize);
        Ok(entries)
    }

    async fn get_goals(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyNutritionGoals>> {
        self.check_online()?;
        let goals = self
            .goals
            .get(&day_doc_id(user_id, date))
            .map(|g| g.clone());
        self.read_delay(date).await;
        Ok(goals)
    }

    async fn insert_goals(&self, goals: &DailyNutritionGoals) -> Result<()> {
        self.check_online()?;
        self.check_goal_write(goals.date)?;
        match self.goals.entry(goals.doc_id()) {
            Entry::Occupied(_) => Err(AppError::AlreadyExists(goals.doc_id())),
            Entry::Vacant(slot) => {
                slot.insert(goals.clone());
                Ok(())
            }
        }
    }

    async fn upsert_goals(&self, goals: &DailyNutritionGoals) -> Result<()> {
        self.check_online()?;
        self.check_goal_write(goals.date)?;
        self.goals.insert(goals.doc_id(), goals.clone());
        Ok(())
    }

    async fn get_log(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailyNutritionLog>> {
        self.check_online()?;
        let log = self.logs.get(&day_doc_id(user_id, date)).map(|l| l.clone());
        self.read_delay(date).await;
        Ok(log)
    }

    async fn insert_log(&self, log: &DailyNutritionLog) -> Result<()> {
        self.check_online()?;
        match self.logs.entry(log.doc_id()) {
            Entry::Occupied(_) => Err(AppError::AlreadyExists(log.doc_id())),
            Entry::Vacant(slot) => {
                slot.insert(log.clone());
                Ok(())
            }
        }
    }

    async fn update_log_atomic(
        &self,
        user_id: &str,
        date: NaiveDate,
        mutate: LogMutation<'_>,
    ) -> Result<DailyNutritionLog> {
        self.check_online()?;
        if self.fail_log_updates.load(Ordering::SeqCst) {
            return Err(AppError::RemoteUnavailable(
                "log update rejected".to_string(),
            ));
        }
        let doc_id = day_doc_id(user_id, date);
        // The shard write lock is held for the whole read-modify-write.
        let mut stored = self
            .logs
            .get_mut(&doc_id)
            .ok_or_else(|| AppError::NotFound(format!("daily log {}", doc_id)))?;
        let mut updated = stored.clone();
        mutate(&mut updated)?;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn insert_food_entry(&self, entry: &FoodEntry) -> Result<()> {
        self.check_online()?;
        self.food_entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn get_food_entry(&self, id: Uuid) -> Result<Option<FoodEntry>> {
        self.check_online()?;
        Ok(self.food_entries.get(&id).map(|e| e.clone()))
    }

    async fn set_food_entry_image(
        &self,
        id: Uuid,
        image_url: &str,
        thumbnail_url: Option<&str>,
    ) -> Result<()> {
        self.check_online()?;
        let mut entry = self
            .food_entries
            .get_mut(&id)
            .ok_or_else(|| AppError::MealNotFound(id.to_string()))?;
        entry.image_url = Some(image_url.to_string());
        entry.thumbnail_url = thumbnail_url.map(str::to_string);
        Ok(())
    }

    async fn delete_food_entry(&self, id: Uuid) -> Result<()> {
        self.check_online()?;
        self.food_entries.remove(&id);
        Ok(())
    }

    async fn list_food_entries(&self, user_id: &str, date: NaiveDate) -> Result<Vec<FoodEntry>> {
        self.check_online()?;
        let mut entries: Vec<FoodEntry> = self
            .food_entries
            .iter()
            .filter(|e| e.user_id == user_id && e.log_date == date)
            .map(|e| e.clone())
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(entries)
    }

    async fn insert_chat_session(&self, session: &ChatSession) -> Result<()> {
        self.check_online()?;
        self.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_chat_session(&self, id: Uuid) -> Result<Option<ChatSession>> {
        self.check_online()?;
        if let Some(session) = self.sessions.get(&id) {
            return Ok(Some(session.clone()));
        }
        let stale = self
            .stale_session_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            return Ok(self.deleted_sessions.get(&id).map(|s| s.clone()));
        }
        Ok(None)
    }

    async fn list_chat_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>> {
        self.check_online()?;
        let mut sessions: Vec<ChatSession> = self
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.clone())
            .collect();
        sessions.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(sessions)
    }

    async fn update_chat_session(&self, session: &ChatSession) -> Result<()> {
        self.check_online()?;
        self.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn delete_chat_session(&self, id: Uuid) -> Result<()> {
        self.check_online()?;
        // Earlier deferred deletes land now.
        self.apply_pending_deletes();
        let deferred = self
            .deferred_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if deferred {
            self.pending_deletes
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(id);
        } else if let Some((_, session)) = self.sessions.remove(&id) {
            self.deleted_sessions.insert(id, session);
        }
        Ok(())
    }

    async fn insert_chat_message(&self, message: &ChatMessage) -> Result<()> {
        self.check_online()?;
        if self.fail_message_inserts.load(Ordering::SeqCst) {
            return Err(AppError::RemoteUnavailable(
                "message insert rejected".to_string(),
            ));
        }
        self.messages
            .entry(message.session_id)
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn list_chat_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
        self.check_online()?;
        let mut messages = self
            .messages
            .get(&session_id)
            .map(|m| m.clone())
            .unwrap_or_default();
        // Stable sort keeps insertion order for equal timestamps.
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn count_chat_messages(&self, session_id: Uuid) -> Result<usize> {
        self.check_online()?;
        Ok(self.messages.get(&session_id).map_or(0, |m| m.len()))
    }

    async fn delete_chat_messages(&self, session_id: Uuid) -> Result<usize> {
        self.check_online()?;
        Ok(self
            .messages
            .remove(&session_id)
            .map_or(0, |(_, messages)| messages.len()))
    }
}
