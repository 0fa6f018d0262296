// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Daily calorie and macro targets.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::time_utils::format_date;

/// Calculator output: calories in kcal, macros in grams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/generated/")
)]
pub struct MacroTargets {
    pub calories_goal: u32,
    pub protein_goal: u32,
    pub carbs_goal: u32,
    pub fat_goal: u32,
}

/// Goals for one user on one date.
///
/// Stored at: `daily_nutrition_goals/{user_id}_{YYYY-MM-DD}`, so there is at
/// most one record per (user, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/generated/")
)]
pub struct DailyNutritionGoals {
    pub user_id: String,
    pub date: NaiveDate,
    pub calories_goal: u32,
    pub protein_goal: u32,
    pub carbs_goal: u32,
    pub fat_goal: u32,
    /// Last computation timestamp (ISO 8601)
    pub updated_at: String,
}

impl DailyNutritionGoals {
    pub fn new(user_id: &str, date: NaiveDate, targets: MacroTargets, now: String) -> Self {
        Self {
            user_id: user_id.to_string(),
            date,
            calories_goal: targets.calories_goal,
            protein_goal: targets.protein_goal,
            carbs_goal: targets.carbs_goal,
            fat_goal: targets.fat_goal,
            updated_at: now,
        }
    }

    pub fn targets(&self) -> MacroTargets {
        MacroTargets {
            calories_goal: self.calories_goal,
            protein_goal: self.protein_goal,
            carbs_goal: self.carbs_goal,
            fat_goal: self.fat_goal,
        }
    }

    pub fn doc_id(&self) -> String {
        day_doc_id(&self.user_id, self.date)
    }
}

/// Document ID for per-(user, date) records.
pub fn day_doc_id(user_id: &str, date: NaiveDate) -> String {
    format!("{}_{}", user_id, format_date(date))
}
