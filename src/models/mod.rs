// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod chat;
pub mod food;
pub mod goals;
pub mod log;
pub mod metrics;

pub use chat::{ChatMessage, ChatSession, Role, DEFAULT_SESSION_TITLE};
pub use food::{FoodEntry, MealDraft, MealImage, MealLog, MealSlot, MealSource};
pub use goals::{DailyNutritionGoals, MacroTargets};
pub use log::{DailyNutritionLog, Macros};
pub use metrics::{ActivityLevel, Gender, UserMetrics, WeightEntry};
