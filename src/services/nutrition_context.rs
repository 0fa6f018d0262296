// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Goals and log for the currently selected date.
//!
//! The provider is the only in-process cache of nutrition state. It is
//! read-through (loads go to the stores) and write-through (workflows hand
//! it the log they just persisted). Reloads carry a generation number; only
//! the most recently requested reload may publish its result, so a slow
//! fetch for an earlier date can never overwrite a later one.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{DailyNutritionGoals, DailyNutritionLog, Macros};
use crate::services::daily_log::DailyLogStore;
use crate::services::goals::GoalsStore;
use crate::time_utils::Clock;

/// What the provider currently knows about the selected date.
#[derive(Debug, Clone)]
pub enum NutritionSnapshot {
    NotLoaded,
    Loaded {
        date: NaiveDate,
        goals: DailyNutritionGoals,
        log: DailyNutritionLog,
    },
    LoadFailed {
        date: NaiveDate,
        error: Arc<AppError>,
    },
}

impl NutritionSnapshot {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            NutritionSnapshot::NotLoaded => None,
            NutritionSnapshot::Loaded { date, .. } | NutritionSnapshot::LoadFailed { date, .. } => {
                Some(*date)
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, NutritionSnapshot::Loaded { .. })
    }

    /// Goal minus consumed, per field. Negative when the user went over.
    pub fn remaining(&self) -> Option<Macros> {
        match self {
            NutritionSnapshot::Loaded { goals, log, .. } => Some(remaining(goals, log)),
            _ => None,
        }
    }
}

/// Goal minus consumed. Not clamped: overeating shows as a negative value.
pub fn remaining(goals: &DailyNutritionGoals, log: &DailyNutritionLog) -> Macros {
    Macros::new(
        f64::from(goals.calories_goal),
        f64::from(goals.protein_goal),
        f64::from(goals.carbs_goal),
        f64::from(goals.fat_goal),
    ) - log.consumed()
}

/// Serialized into the coach prompt.
#[derive(Debug, Clone, Serialize)]
pub struct NutritionContextSummary {
    pub date: NaiveDate,
    pub goals: ContextMacros,
    pub consumed: ContextMacros,
    pub remaining: ContextMacros,
    pub meals: Vec<ContextMeal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextMacros {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

impl From<Macros> for ContextMacros {
    fn from(m: Macros) -> Self {
        Self {
            calories: m.calories,
            protein_g: m.protein,
            carbs_g: m.carbs,
            fat_g: m.fat,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextMeal {
    pub name: String,
    pub slot: crate::models::MealSlot,
    pub calories: f64,
}

struct ProviderState {
    selected_date: NaiveDate,
    snapshot: NutritionSnapshot,
    /// Count of write-throughs for the selected date
    local_writes: u64,
    /// Most recent write-through for the selected date
    local_log: Option<DailyNutritionLog>,
}

pub struct NutritionContextProvider {
    user_id: String,
    goals: GoalsStore,
    logs: DailyLogStore,
    state: RwLock<ProviderState>,
    generation: AtomicU64,
}

impl NutritionContextProvider {
    /// A provider for `user_id` with today selected and nothing loaded yet.
    pub fn new(user_id: String, goals: GoalsStore, logs: DailyLogStore, clock: &dyn Clock) -> Self {
        Self {
            user_id,
            goals,
            logs,
            state: RwLock::new(ProviderState {
                selected_date: clock.today(),
                snapshot: NutritionSnapshot::NotLoaded,
                local_writes: 0,
                local_log: None,
            }),
            generation: AtomicU64::new(0),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.read_state().selected_date
    }

    pub fn snapshot(&self) -> NutritionSnapshot {
        self.read_state().snapshot.clone()
    }

    /// Remaining macros for the selected date, if loaded.
    pub fn remaining(&self) -> Option<Macros> {
        self.read_state().snapshot.remaining()
    }

    /// Select a date and load its goals and log (creating them if absent).
    ///
    /// Returns the snapshot after the load. If a later call superseded
    /// this one while it was in flight, the result is discarded and the
    /// current snapshot is returned instead. A write-through that lands
    /// while the load is in flight wins over the log the load read.
    pub async fn set_selected_date(&self, date: NaiveDate) -> NutritionSnapshot {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let local_writes_at_start = {
            let mut state = self.write_state();
            if state.selected_date != date {
                state.local_log = None;
            }
            state.selected_date = date;
            state.local_writes
        };

        let result = self.load(date).await;

        let mut state = self.write_state();
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(
                user_id = %self.user_id,
                %date,
                generation,
                "Discarding superseded nutrition reload"
            );
            return state.snapshot.clone();
        }

        let written_during_load = state.local_writes != local_writes_at_start;
        state.snapshot = match result {
            Ok((goals, log)) => {
                let log = match &state.local_log {
                    Some(local) if written_during_load && local.date == date => local.clone(),
                    _ => log,
                };
                NutritionSnapshot::Loaded { date, goals, log }
            }
            Err(e) => {
                tracing::warn!(user_id = %self.user_id, %date, error = %e, "Nutrition reload failed");
                NutritionSnapshot::LoadFailed {
                    date,
                    error: Arc::new(e),
                }
            }
        };
        state.snapshot.clone()
    }

    /// Reload the selected date.
    pub async fn refresh(&self) -> NutritionSnapshot {
        let date = self.selected_date();
        self.set_selected_date(date).await
    }

    /// Write-through of a log a workflow just persisted.
    ///
    /// Ignored unless it is this user's log for the selected date. Also
    /// remembered so a reload already in flight does not publish an older
    /// read over it.
    pub fn apply_local_log(&self, log: &DailyNutritionLog) {
        if log.user_id != self.user_id {
            return;
        }
        let mut state = self.write_state();
        if log.date == state.selected_date {
            state.local_writes += 1;
            state.local_log = Some(log.clone());
        }
        if let NutritionSnapshot::Loaded {
            date, log: cached, ..
        } = &mut state.snapshot
        {
            if *date == log.date {
                *cached = log.clone();
            }
        }
    }

    /// Update the image URLs of a meal in the cached log, if present.
    pub fn update_cached_meal_image(
        &self,
        meal_id: Uuid,
        image_url: &str,
        thumbnail_url: Option<&str>,
    ) -> bool {
        let mut state = self.write_state();
        if let NutritionSnapshot::Loaded { log, .. } = &mut state.snapshot {
            if let Some(meal) = log.meals_data.iter_mut().find(|m| m.id == meal_id) {
                meal.image_url = Some(image_url.to_string());
                meal.thumbnail_url = thumbnail_url.map(str::to_string);
                return true;
            }
        }
        false
    }

    /// Context handed to the coach, if the selected date is loaded.
    pub fn summary(&self) -> Option<NutritionContextSummary> {
        match &self.read_state().snapshot {
            NutritionSnapshot::Loaded { date, goals, log } => Some(NutritionContextSummary {
                date: *date,
                goals: ContextMacros::from(Macros::new(
                    f64::from(goals.calories_goal),
                    f64::from(goals.protein_goal),
                    f64::from(goals.carbs_goal),
                    f64::from(goals.fat_goal),
                )),
                consumed: log.consumed().into(),
                remaining: remaining(goals, log).into(),
                meals: log
                    .meals_data
                    .iter()
                    .map(|m| ContextMeal {
                        name: m.food_name.clone(),
                        slot: m.meal_slot,
                        calories: m.calories,
                    })
                    .collect(),
            }),
            _ => None,
        }
    }

    async fn load(&self, date: NaiveDate) -> Result<(DailyNutritionGoals, DailyNutritionLog)> {
        tokio::try_join!(
            self.goals.ensure_goals(&self.user_id, date),
            self.logs.ensure_log(&self.user_id, date),
        )
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, ProviderState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ProviderState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}
