// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use nutrition_coach::error::AppError;
use nutrition_coach::models::{ActivityLevel, Gender, UserMetrics};
use nutrition_coach::services::calculate_daily_goals;

mod common;
use common::test_metrics;

const ACTIVITY_LEVELS: [ActivityLevel; 5] = [
    ActivityLevel::Sedentary,
    ActivityLevel::Light,
    ActivityLevel::Moderate,
    ActivityLevel::Active,
    ActivityLevel::VeryActive,
];

#[test]
fn test_worked_example_targets() {
    let targets = calculate_daily_goals(&test_metrics("u1")).unwrap();

    // BMR = 800 + 1112.5 - 150 + 5 = 1767.5; TDEE = 2739.6; +500 (clamped)
    assert_eq!(targets.calories_goal, 3240);
    assert_eq!(targets.protein_goal, 176);
    assert_eq!(targets.fat_goal, 85);
    assert_eq!(targets.carbs_goal, 443);
}

#[test]
fn test_macro_calories_match_target_across_profiles() {
    let mut checked = 0;
    for weight in [50.0, 65.0, 80.0, 95.0, 110.0, 120.0] {
        for goal_delta in [-5.0, 0.0, 5.0] {
            for height in [150.0, 165.0, 180.0, 200.0] {
                for age in [18, 30, 50, 70] {
                    for gender in [Gender::Male, Gender::Female] {
                        for activity_level in ACTIVITY_LEVELS {
                            let metrics = UserMetrics {
                                user_id: "grid".to_string(),
                                current_weight: weight,
                                goal_weight: weight + goal_delta,
                                height,
                                age,
                                gender,
                                activity_level,
                                updated_at: String::new(),
                            };
                            let t = calculate_daily_goals(&metrics).unwrap();
                            assert!(t.calories_goal > 0, "calories must be positive: {:?}", metrics);

                            let from_macros =
                                i64::from(t.protein_goal * 4 + t.carbs_goal * 4 + t.fat_goal * 9);
                            let diff = (from_macros - i64::from(t.calories_goal)).abs();
                            assert!(
                                diff <= 2,
                                "macro calories {} vs target {} for {:?}",
                                from_macros,
                                t.calories_goal,
                                metrics
                            );
                            checked += 1;
                        }
                    }
                }
            }
        }
    }
    assert_eq!(checked, 6 * 3 * 4 * 4 * 2 * 5);
}

#[test]
fn test_protein_capped_when_target_is_tiny() {
    // BMR 926.5 * 1.2 - 785.7 = 326 kcal, below round(50 * 2.2) * 4
    let metrics = UserMetrics {
        user_id: "u1".to_string(),
        current_weight: 50.0,
        goal_weight: 55.0,
        height: 150.0,
        age: 70,
        gender: Gender::Female,
        activity_level: ActivityLevel::Sedentary,
        updated_at: String::new(),
    };
    let t = calculate_daily_goals(&metrics).unwrap();

    assert_eq!(t.calories_goal, 326);
    assert_eq!(t.protein_goal, 81);
    assert_eq!(t.fat_goal, 0);
    assert_eq!(t.carbs_goal, 1);
    assert_eq!(t.protein_goal * 4 + t.carbs_goal * 4 + t.fat_goal * 9, 328);
}

#[test]
fn test_higher_activity_never_lowers_calories() {
    let mut metrics = test_metrics("u1");
    let mut previous = 0;
    for activity_level in ACTIVITY_LEVELS {
        metrics.activity_level = activity_level;
        let calories = calculate_daily_goals(&metrics).unwrap().calories_goal;
        assert!(calories > previous, "{:?} should raise calories", activity_level);
        previous = calories;
    }
}

#[test]
fn test_invalid_metrics_rejected() {
    let mut metrics = test_metrics("u1");
    metrics.height = 0.0;
    assert!(matches!(
        calculate_daily_goals(&metrics),
        Err(AppError::InvalidMetrics(_))
    ));

    let mut metrics = test_metrics("u1");
    metrics.age = 0;
    assert!(matches!(
        calculate_daily_goals(&metrics),
        Err(AppError::InvalidMetrics(_))
    ));

    let mut metrics = test_metrics("u1");
    metrics.goal_weight = f64::NAN;
    assert!(matches!(
        calculate_daily_goals(&metrics),
        Err(AppError::InvalidMetrics(_))
    ));
}
