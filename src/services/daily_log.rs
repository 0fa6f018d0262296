// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-(user, date) consumption log.
//!
//! Meals are folded into the log with a single atomic read-modify-write at
//! the store. Within this process, writers to the same day are additionally
//! serialized by a per-day async mutex so concurrent adds queue up instead
//! of contending on the store transaction.

use chrono::NaiveDate;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::goals::day_doc_id;
use crate::models::{DailyNutritionLog, MealLog};
use crate::time_utils::{format_utc_rfc3339, Clock};

/// Per-day write locks, keyed by `{user_id}_{YYYY-MM-DD}`.
pub type DayLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Log with `meal` appended and its macros added to the totals.
///
/// Re-applying a meal that is already present returns the log unchanged.
pub fn with_meal(log: &DailyNutritionLog, meal: MealLog) -> DailyNutritionLog {
    let mut updated = log.clone();
    if !updated.contains_meal(meal.id) {
        updated.push_meal(meal);
    }
    updated
}

/// Log with the meal removed and its macros subtracted.
pub fn without_meal(log: &DailyNutritionLog, meal_id: Uuid) -> Result<DailyNutritionLog> {
    let mut updated = log.clone();
    updated
        .take_meal(meal_id)
        .ok_or_else(|| AppError::MealNotFound(meal_id.to_string()))?;
    Ok(updated)
}

#[derive(Clone)]
pub struct DailyLogStore {
    db: Arc<dyn Database>,
    clock: Arc<dyn Clock>,
    locks: DayLocks,
}

impl DailyLogStore {
    pub fn new(db: Arc<dyn Database>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            clock,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub async fn get_log(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailyNutritionLog>> {
        self.db.get_log(user_id, date).await
    }

    /// The log for the date, creating a zeroed one if absent.
    pub async fn ensure_log(&self, user_id: &str, date: NaiveDate) -> Result<DailyNutritionLog> {
        if let Some(log) = self.db.get_log(user_id, date).await? {
            return Ok(log);
        }

        let log = DailyNutritionLog::zeroed(user_id, date, format_utc_rfc3339(self.clock.now()));
        match self.db.insert_log(&log).await {
            Ok(()) => {
                tracing::debug!(user_id, %date, "Daily log created");
                Ok(log)
            }
            Err(AppError::AlreadyExists(_)) => {
                self.db.get_log(user_id, date).await?.ok_or_else(|| {
                    AppError::RemoteUnavailable(format!(
                        "log for {} reported existing but not readable",
                        date
                    ))
                })
            }
            Err(e) => {
                tracing::warn!(user_id, %date, error = %e, "Failed to ensure daily log");
                Err(e)
            }
        }
    }

    /// Fold a meal into the day's log (created if needed) and persist it.
    pub async fn apply_meal(
        &self,
        user_id: &str,
        date: NaiveDate,
        meal: MealLog,
    ) -> Result<DailyNutritionLog> {
        let lock = self.day_lock(user_id, date);
        let _guard = lock.lock().await;

        self.ensure_log(user_id, date).await?;
        let now = format_utc_rfc3339(self.clock.now());
        let meal_id = meal.id;

        let log = self
            .db
            .update_log_atomic(user_id, date, &|log| {
                *log = with_meal(log, meal.clone());
                log.updated_at = now.clone();
                Ok(())
            })
            .await
            .inspect_err(|e| {
                tracing::warn!(user_id, %date, %meal_id, error = %e, "Failed to add meal to log");
            })?;

        tracing::info!(
            user_id,
            %date,
            %meal_id,
            calories = log.calories_consumed,
            meals = log.meals_data.len(),
            "Meal added to daily log"
        );
        Ok(log)
    }

    /// Take a meal out of the day's log and persist it.
    ///
    /// Fails with `MealNotFound` if the log (or the meal in it) is absent.
    pub async fn remove_meal(
        &self,
        user_id: &str,
        date: NaiveDate,
        meal_id: Uuid,
    ) -> Result<DailyNutritionLog> {
        let lock = self.day_lock(user_id, date);
        let _guard = lock.lock().await;

        let now = format_utc_rfc3339(self.clock.now());
        let result = self
            .db
            .update_log_atomic(user_id, date, &|log| {
                *log = without_meal(log, meal_id)?;
                log.updated_at = now.clone();
                Ok(())
            })
            .await;

        match result {
            Ok(log) => {
                tracing::info!(
                    user_id,
                    %date,
                    %meal_id,
                    calories = log.calories_consumed,
                    "Meal removed from daily log"
                );
                Ok(log)
            }
            Err(AppError::NotFound(_)) => Err(AppError::MealNotFound(meal_id.to_string())),
            Err(e) => {
                tracing::warn!(user_id, %date, %meal_id, error = %e, "Failed to remove meal from log");
                Err(e)
            }
        }
    }

    /// Rebuild the day's log from its food entries.
    ///
    /// Repairs a log left behind when a food entry was written but the log
    /// update was not (or vice versa).
    pub async fn reconcile(&self, user_id: &str, date: NaiveDate) -> Result<DailyNutritionLog> {
        let lock = self.day_lock(user_id, date);
        let _guard = lock.lock().await;

        self.ensure_log(user_id, date).await?;
        let meals: Vec<MealLog> = self
            .db
            .list_food_entries(user_id, date)
            .await?
            .iter()
            .map(|entry| entry.to_meal_log())
            .collect();
        let now = format_utc_rfc3339(self.clock.now());

        let log = self
            .db
            .update_log_atomic(user_id, date, &|log| {
                if log.totals_drifted() || log.meals_data != meals {
                    tracing::warn!(user_id, %date, "Daily log drifted from food entries");
                }
                log.replace_meals(meals.clone());
                log.updated_at = now.clone();
                Ok(())
            })
            .await?;

        tracing::info!(
            user_id,
            %date,
            meals = log.meals_data.len(),
            calories = log.calories_consumed,
            "Daily log reconciled"
        );
        Ok(log)
    }

    fn day_lock(&self, user_id: &str, date: NaiveDate) -> Arc<Mutex<()>> {
        self.locks
            .entry(day_doc_id(user_id, date))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
