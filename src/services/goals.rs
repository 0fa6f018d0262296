// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily goal calculation and the per-day goals store.
//!
//! Targets come from the Mifflin-St Jeor BMR scaled by an activity
//! multiplier, adjusted toward the goal weight, then split into macros:
//! roughly 1 g protein per lb of bodyweight, 30% of the remaining calories
//! from fat and the rest from carbs.

use chrono::NaiveDate;
use futures_util::{stream, StreamExt};
use std::sync::Arc;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{DailyNutritionGoals, MacroTargets, UserMetrics};
use crate::time_utils::{format_utc_rfc3339, upcoming_dates, Clock};

/// kcal per kg of body weight change per week, spread over a day.
const KCAL_PER_KG_WEEK: f64 = 1100.0;
const MIN_DAILY_ADJUSTMENT: f64 = -1000.0;
const MAX_DAILY_ADJUSTMENT: f64 = 500.0;
const PROTEIN_G_PER_KG: f64 = 2.2;
const FAT_SHARE: f64 = 0.3;
const KCAL_PER_G_PROTEIN: f64 = 4.0;
const KCAL_PER_G_CARBS: f64 = 4.0;
const KCAL_PER_G_FAT: f64 = 9.0;

/// Days of goals prepared ahead, today included.
pub const UPCOMING_DAYS: u64 = 7;

const MAX_CONCURRENT_GOAL_WRITES: usize = 4;

/// Basal metabolic rate (Mifflin-St Jeor), kcal/day.
pub fn basal_metabolic_rate(metrics: &UserMetrics) -> f64 {
    10.0 * metrics.current_weight + 6.25 * metrics.height - 5.0 * f64::from(metrics.age)
        + metrics.gender.bmr_offset()
}

/// Daily calorie adjustment toward the goal weight, clamped to
/// [-1000, +500] kcal.
///
/// The sign follows `current - goal`: a user above their goal weight gets a
/// positive adjustment.
pub fn daily_adjustment(metrics: &UserMetrics) -> f64 {
    let weekly_diff = metrics.current_weight - metrics.goal_weight;
    (weekly_diff * KCAL_PER_KG_WEEK / 7.0).clamp(MIN_DAILY_ADJUSTMENT, MAX_DAILY_ADJUSTMENT)
}

/// Compute daily calorie and macro targets from body metrics.
///
/// Pure; fails only with `InvalidMetrics`.
pub fn calculate_daily_goals(metrics: &UserMetrics) -> Result<MacroTargets> {
    metrics.check()?;

    let tdee = basal_metabolic_rate(metrics) * metrics.activity_level.multiplier();
    let calories = (tdee + daily_adjustment(metrics)).round().max(1.0);

    // Protein is capped at the calorie target, which only binds for small
    // users on a steep adjustment; fat and carbs then bottom out near zero.
    let protein = (metrics.current_weight * PROTEIN_G_PER_KG)
        .round()
        .min((calories / KCAL_PER_G_PROTEIN).floor());
    let remaining = calories - protein * KCAL_PER_G_PROTEIN;
    let fat = (FAT_SHARE * remaining / KCAL_PER_G_FAT).round();
    let carbs = ((remaining - fat * KCAL_PER_G_FAT) / KCAL_PER_G_CARBS)
        .round()
        .max(0.0);

    Ok(MacroTargets {
        calories_goal: to_u32(calories),
        protein_goal: to_u32(protein),
        carbs_goal: to_u32(carbs),
        fat_goal: to_u32(fat),
    })
}

fn to_u32(value: f64) -> u32 {
    value.max(0.0).min(f64::from(u32::MAX)) as u32
}

/// Creates and reads per-(user, date) goals records.
#[derive(Clone)]
pub struct GoalsStore {
    db: Arc<dyn Database>,
    clock: Arc<dyn Clock>,
}

impl GoalsStore {
    pub fn new(db: Arc<dyn Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Goals for exactly this date, if any.
    pub async fn get_goals(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyNutritionGoals>> {
        self.db.get_goals(user_id, date).await
    }

    /// Goals for the date, creating them from the user's metrics if absent.
    ///
    /// Concurrent callers for the same (user, date) all get the single
    /// stored record.
    pub async fn ensure_goals(&self, user_id: &str, date: NaiveDate) -> Result<DailyNutritionGoals> {
        if let Some(goals) = self.db.get_goals(user_id, date).await? {
            return Ok(goals);
        }

        let targets = self.current_targets(user_id).await?;
        self.create_or_reread(user_id, date, targets)
            .await
            .inspect_err(|e| {
                tracing::warn!(user_id, %date, error = %e, "Failed to ensure daily goals");
            })
    }

    /// Make sure goals exist for today and the next six days.
    ///
    /// Targets are computed once and reused for every missing day. Every
    /// date is attempted; if any failed, `GoalsIncomplete` lists them.
    pub async fn ensure_upcoming_goals(&self, user_id: &str) -> Result<Vec<DailyNutritionGoals>> {
        let dates = upcoming_dates(self.clock.today(), UPCOMING_DAYS);
        let mut targets: Option<MacroTargets> = None;
        let mut ensured = Vec::with_capacity(dates.len());
        let mut failed = Vec::new();
        let mut first_error: Option<AppError> = None;

        for date in dates {
            let result = async {
                if let Some(goals) = self.db.get_goals(user_id, date).await? {
                    return Ok(goals);
                }
                let t = match targets {
                    Some(t) => t,
                    None => {
                        let t = self.current_targets(user_id).await?;
                        targets = Some(t);
                        t
                    }
                };
                self.create_or_reread(user_id, date, t).await
            }
            .await;

            match result {
                Ok(goals) => ensured.push(goals),
                Err(e) => {
                    tracing::warn!(user_id, %date, error = %e, "Failed to ensure upcoming goals");
                    failed.push(date);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => Ok(ensured),
            Some(e) => Err(AppError::GoalsIncomplete {
                failed,
                message: e.to_string(),
            }),
        }
    }

    /// Overwrite goals for today and the next six days after a metrics
    /// change. Past days keep the targets they had.
    pub async fn recompute_goals(
        &self,
        metrics: &UserMetrics,
    ) -> Result<Vec<DailyNutritionGoals>> {
        let targets = calculate_daily_goals(metrics)?;
        let now = format_utc_rfc3339(self.clock.now());
        let mut written = Vec::new();
        let mut failed = Vec::new();
        let mut first_error: Option<AppError> = None;

        let results: Vec<(NaiveDate, Result<DailyNutritionGoals>)> =
            stream::iter(upcoming_dates(self.clock.today(), UPCOMING_DAYS))
                .map(|date| {
                    let goals = DailyNutritionGoals::new(&metrics.user_id, date, targets, now.clone());
                    async move {
                        let result = self.db.upsert_goals(&goals).await.map(|()| goals);
                        (date, result)
                    }
                })
                .buffered(MAX_CONCURRENT_GOAL_WRITES)
                .collect()
                .await;

        for (date, result) in results {
            match result {
                Ok(goals) => written.push(goals),
                Err(e) => {
                    tracing::warn!(
                        user_id = %metrics.user_id,
                        %date,
                        error = %e,
                        "Failed to recompute goals"
                    );
                    failed.push(date);
                    first_error.get_or_insert(e);
                }
            }
        }

        tracing::info!(
            user_id = %metrics.user_id,
            calories = targets.calories_goal,
            days = written.len(),
            "Goals recomputed"
        );

        match first_error {
            None => Ok(written),
            Some(e) => Err(AppError::GoalsIncomplete {
                failed,
                message: e.to_string(),
            }),
        }
    }

    async fn current_targets(&self, user_id: &str) -> Result<MacroTargets> {
        let metrics = self
            .db
            .get_user_metrics(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("metrics for user {}", user_id)))?;
        calculate_daily_goals(&metrics)
    }

    async fn create_or_reread(
        &self,
        user_id: &str,
        date: NaiveDate,
        targets: MacroTargets,
    ) -> Result<DailyNutritionGoals> {
        let goals = DailyNutritionGoals::new(
            user_id,
            date,
            targets,
            format_utc_rfc3339(self.clock.now()),
        );

        match self.db.insert_goals(&goals).await {
            Ok(()) => {
                tracing::debug!(user_id, %date, "Daily goals created");
                Ok(goals)
            }
            Err(AppError::AlreadyExists(_)) => {
                tracing::debug!(user_id, %date, "Daily goals created concurrently, re-reading");
                self.db.get_goals(user_id, date).await?.ok_or_else(|| {
                    AppError::RemoteUnavailable(format!(
                        "goals for {} reported existing but not readable",
                        date
                    ))
                })
            }
            Err(e) => Err(e),
        }
    }
}
