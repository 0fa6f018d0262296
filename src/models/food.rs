// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Logged meals: drafts, persisted food entries, and the copies embedded in
//! a daily log.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::log::Macros;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

/// Where a logged meal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum MealSource {
    Manual,
    Scan,
    Search,
    Chat,
}

/// Meal as embedded in `DailyNutritionLog::meals_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/generated/")
)]
pub struct MealLog {
    /// Same ID as the backing FoodEntry
    pub id: Uuid,
    pub food_name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub meal_slot: MealSlot,
    /// When the meal was eaten (ISO 8601)
    pub eaten_at: String,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub source: Option<MealSource>,
}

impl MealLog {
    pub fn macros(&self) -> Macros {
        Macros::new(self.calories, self.protein, self.carbs, self.fat)
    }
}

/// Independently persisted record of one eaten item.
///
/// Stored at: `food_entries/{id}`. Immutable apart from the image URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/generated/")
)]
pub struct FoodEntry {
    pub id: Uuid,
    pub user_id: String,
    /// Date of the daily log that owns this entry
    pub log_date: NaiveDate,
    pub food_name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub meal_slot: MealSlot,
    pub eaten_at: String,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub source: Option<MealSource>,
    pub created_at: String,
}

impl FoodEntry {
    pub fn macros(&self) -> Macros {
        Macros::new(self.calories, self.protein, self.carbs, self.fat)
    }

    pub fn to_meal_log(&self) -> MealLog {
        MealLog {
            id: self.id,
            food_name: self.food_name.clone(),
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
            meal_slot: self.meal_slot,
            eaten_at: self.eaten_at.clone(),
            image_url: self.image_url.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            source: self.source,
        }
    }
}

/// Image already uploaded for a meal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealImage {
    pub image_url: String,
    pub thumbnail_url: Option<String>,
}

/// A meal as entered by the user, before validation.
///
/// Numeric fields are optional so that a half-filled form can be
/// represented; [`MealDraft::check`] rejects any that are missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MealDraft {
    #[validate(length(min = 1, max = 200))]
    pub food_name: String,
    #[validate(required, range(min = 0.0))]
    pub calories: Option<f64>,
    #[validate(required, range(min = 0.0))]
    pub protein: Option<f64>,
    #[validate(required, range(min = 0.0))]
    pub carbs: Option<f64>,
    #[validate(required, range(min = 0.0))]
    pub fat: Option<f64>,
    pub meal_slot: MealSlot,
    pub source: MealSource,
    #[serde(default)]
    pub image: Option<MealImage>,
}

impl MealDraft {
    /// A fully specified draft.
    pub fn new(
        food_name: impl Into<String>,
        macros: Macros,
        meal_slot: MealSlot,
        source: MealSource,
    ) -> Self {
        Self {
            food_name: food_name.into(),
            calories: Some(macros.calories),
            protein: Some(macros.protein),
            carbs: Some(macros.carbs),
            fat: Some(macros.fat),
            meal_slot,
            source,
            image: None,
        }
    }

    /// Validate and return the meal's macros.
    pub fn check(&self) -> Result<Macros, AppError> {
        self.validate()
            .map_err(|e| AppError::InvalidMeal(e.to_string()))?;
        if self.food_name.trim().is_empty() {
            return Err(AppError::InvalidMeal("food name is required".to_string()));
        }
        let field = |name: &str, value: Option<f64>| match value {
            Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
            Some(_) => Err(AppError::InvalidMeal(format!(
                "{} must be a non-negative number",
                name
            ))),
            None => Err(AppError::InvalidMeal(format!("{} is required", name))),
        };
        Ok(Macros::new(
            field("calories", self.calories)?,
            field("protein", self.protein)?,
            field("carbs", self.carbs)?,
            field("fat", self.fat)?,
        ))
    }
}
