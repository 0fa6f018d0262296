// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Daily consumption log aggregate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::food::MealLog;
use crate::models::goals::day_doc_id;

/// Calories and macro grams of a meal or a running total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/generated/")
)]
pub struct Macros {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Macros {
    pub fn new(calories: f64, protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            calories,
            protein,
            carbs,
            fat,
        }
    }
}

impl Add for Macros {
    type Output = Macros;

    fn add(self, rhs: Macros) -> Macros {
        Macros {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
        }
    }
}

impl Sub for Macros {
    type Output = Macros;

    fn sub(self, rhs: Macros) -> Macros {
        Macros {
            calories: self.calories - rhs.calories,
            protein: self.protein - rhs.protein,
            carbs: self.carbs - rhs.carbs,
            fat: self.fat - rhs.fat,
        }
    }
}

impl std::iter::Sum for Macros {
    fn sum<I: Iterator<Item = Macros>>(iter: I) -> Macros {
        iter.fold(Macros::default(), Add::add)
    }
}

/// Consumption log for one user on one date.
///
/// Stored at: `daily_nutrition_logs/{user_id}_{YYYY-MM-DD}`.
///
/// The four consumed totals always equal the sum of `meals_data`; every
/// mutation goes through [`DailyNutritionLog::push_meal`] or
/// [`DailyNutritionLog::take_meal`], which re-derive them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/generated/")
)]
pub struct DailyNutritionLog {
    pub user_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub calories_consumed: f64,
    #[serde(default)]
    pub protein_consumed: f64,
    #[serde(default)]
    pub carbs_consumed: f64,
    #[serde(default)]
    pub fat_consumed: f64,
    #[serde(default)]
    pub meals_data: Vec<MealLog>,
    /// Last update timestamp (ISO 8601)
    #[serde(default)]
    pub updated_at: String,
}

impl DailyNutritionLog {
    /// A log with zeroed totals and no meals.
    pub fn zeroed(user_id: &str, date: NaiveDate, now: String) -> Self {
        Self {
            user_id: user_id.to_string(),
            date,
            calories_consumed: 0.0,
            protein_consumed: 0.0,
            carbs_consumed: 0.0,
            fat_consumed: 0.0,
            meals_data: Vec::new(),
            updated_at: now,
        }
    }

    pub fn doc_id(&self) -> String {
        day_doc_id(&self.user_id, self.date)
    }

    pub fn consumed(&self) -> Macros {
        Macros::new(
            self.calories_consumed,
            self.protein_consumed,
            self.carbs_consumed,
            self.fat_consumed,
        )
    }

    pub fn contains_meal(&self, meal_id: uuid::Uuid) -> bool {
        self.meals_data.iter().any(|m| m.id == meal_id)
    }

    /// Append a meal and fold it into the totals.
    pub fn push_meal(&mut self, meal: MealLog) {
        self.meals_data.push(meal);
        self.recompute_totals();
    }

    /// Remove a meal by ID, returning it if present.
    pub fn take_meal(&mut self, meal_id: uuid::Uuid) -> Option<MealLog> {
        let index = self.meals_data.iter().position(|m| m.id == meal_id)?;
        let meal = self.meals_data.remove(index);
        self.recompute_totals();
        Some(meal)
    }

    /// Replace the meal list and re-derive totals.
    pub fn replace_meals(&mut self, meals: Vec<MealLog>) {
        self.meals_data = meals;
        self.recompute_totals();
    }

    /// Whether the stored totals drifted from the meal list.
    pub fn totals_drifted(&self) -> bool {
        let expected = Self::sum_meals(&self.meals_data);
        let actual = self.consumed();
        let diff = expected - actual;
        [diff.calories, diff.protein, diff.carbs, diff.fat]
            .iter()
            .any(|d| d.abs() > 1e-6)
    }

    fn sum_meals(meals: &[MealLog]) -> Macros {
        meals.iter().map(MealLog::macros).sum()
    }

    fn recompute_totals(&mut self) {
        let totals = Self::sum_meals(&self.meals_data);
        self.calories_consumed = totals.calories;
        self.protein_consumed = totals.protein;
        self.carbs_consumed = totals.carbs;
        self.fat_consumed = totals.fat;
    }
}
