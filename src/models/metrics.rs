// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Body metrics and weight history.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use crate::error::AppError;

/// Biological sex category used by the BMR formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Sex-specific additive constant of the Mifflin-St Jeor formula.
    pub fn bmr_offset(self) -> f64 {
        match self {
            Gender::Male => 5.0,
            Gender::Female => -161.0,
        }
    }
}

impl FromStr for Gender {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(AppError::InvalidMetrics(format!(
                "unknown gender {:?}",
                other
            ))),
        }
    }
}

/// Self-reported activity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    /// TDEE multiplier applied to BMR.
    pub fn multiplier(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::Light => "light",
            ActivityLevel::Moderate => "moderate",
            ActivityLevel::Active => "active",
            ActivityLevel::VeryActive => "very_active",
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sedentary" => Ok(ActivityLevel::Sedentary),
            "light" => Ok(ActivityLevel::Light),
            "moderate" => Ok(ActivityLevel::Moderate),
            "active" => Ok(ActivityLevel::Active),
            "very_active" => Ok(ActivityLevel::VeryActive),
            other => Err(AppError::InvalidMetrics(format!(
                "unknown activity level {:?}",
                other
            ))),
        }
    }
}

/// A user's physical profile.
///
/// Stored in `user_metrics`, keyed by user ID. Created at onboarding and
/// superseded by upsert; never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/generated/")
)]
pub struct UserMetrics {
    /// Owning user (also used as document ID)
    #[validate(length(min = 1))]
    pub user_id: String,
    /// Current weight in kilograms
    #[validate(range(exclusive_min = 0.0))]
    pub current_weight: f64,
    /// Target weight in kilograms
    #[validate(range(exclusive_min = 0.0))]
    pub goal_weight: f64,
    /// Height in centimeters
    #[validate(range(exclusive_min = 0.0))]
    pub height: f64,
    /// Age in whole years
    #[validate(range(min = 1))]
    pub age: u32,
    pub gender: Gender,
    pub activity_level: ActivityLevel,
    /// Last update timestamp (ISO 8601)
    #[serde(default)]
    pub updated_at: String,
}

impl UserMetrics {
    /// Validate ranges, reporting failures as `InvalidMetrics`.
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()
            .map_err(|e| AppError::InvalidMetrics(e.to_string()))?;
        if !(self.current_weight.is_finite()
            && self.goal_weight.is_finite()
            && self.height.is_finite())
        {
            return Err(AppError::InvalidMetrics(
                "weight and height must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// One weigh-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/generated/")
)]
pub struct WeightEntry {
    pub id: uuid::Uuid,
    pub user_id: String,
    pub weight_kg: f64,
    pub notes: Option<String>,
    /// When the weight was recorded (ISO 8601)
    pub recorded_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> UserMetrics {
        UserMetrics {
            user_id: "u1".to_string(),
            current_weight: 80.0,
            goal_weight: 75.0,
            height: 178.0,
            age: 30,
            gender: Gender::Male,
            activity_level: ActivityLevel::Moderate,
            updated_at: String::new(),
        }
    }

    #[test]
    fn valid_metrics_pass() {
        assert!(metrics().check().is_ok());
    }

    #[test]
    fn non_positive_values_are_rejected() {
        let mut m = metrics();
        m.height = 0.0;
        assert!(matches!(m.check(), Err(AppError::InvalidMetrics(_))));

        let mut m = metrics();
        m.age = 0;
        assert!(matches!(m.check(), Err(AppError::InvalidMetrics(_))));

        let mut m = metrics();
        m.current_weight = f64::NAN;
        assert!(matches!(m.check(), Err(AppError::InvalidMetrics(_))));
    }

    #[test]
    fn enums_parse_from_onboarding_strings() {
        assert_eq!(
            "very_active".parse::<ActivityLevel>().unwrap(),
            ActivityLevel::VeryActive
        );
        assert_eq!("Female".parse::<Gender>().unwrap(), Gender::Female);
        assert!(matches!(
            "athletic".parse::<ActivityLevel>(),
            Err(AppError::InvalidMetrics(_))
        ));
    }

    #[test]
    fn activity_level_serializes_snake_case() {
        let json = serde_json::to_string(&ActivityLevel::VeryActive).unwrap();
        assert_eq!(json, "\"very_active\"");
    }
}
