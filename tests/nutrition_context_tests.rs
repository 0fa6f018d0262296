// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::Duration;
use nutrition_coach::db::Database;
use nutrition_coach::error::AppError;
use nutrition_coach::models::{Macros, MealLog, MealSlot};
use nutrition_coach::services::daily_log::with_meal;
use nutrition_coach::services::NutritionSnapshot;

mod common;
use common::{draft, onboarded_app, test_app, test_date};

fn snack(name: &str, calories: f64) -> MealLog {
    MealLog {
        id: uuid::Uuid::new_v4(),
        food_name: name.to_string(),
        calories,
        protein: 0.5,
        carbs: 25.0,
        fat: 0.25,
        meal_slot: MealSlot::Snack,
        eaten_at: String::new(),
        image_url: None,
        thumbnail_url: None,
        source: None,
    }
}

#[tokio::test]
async fn test_starts_on_today_not_loaded() {
    let app = test_app();
    let ctx = &app.session.nutrition;
    assert_eq!(ctx.selected_date(), test_date());
    assert!(matches!(ctx.snapshot(), NutritionSnapshot::NotLoaded));
    assert_eq!(ctx.remaining(), None);
    assert!(ctx.summary().is_none());
}

#[tokio::test]
async fn test_slow_earlier_reload_does_not_overwrite_later_one() {
    let app = onboarded_app().await;
    let ctx = &app.session.nutrition;
    let date_a = test_date() + Duration::days(1);
    let date_b = test_date() + Duration::days(2);
    app.db
        .set_read_delay(date_a, std::time::Duration::from_millis(150));

    let (from_a, from_b) = tokio::join!(ctx.set_selected_date(date_a), ctx.set_selected_date(date_b));

    assert_eq!(from_b.date(), Some(date_b));
    // A's result was discarded; it reports the state B left behind
    assert_eq!(from_a.date(), Some(date_b));

    assert_eq!(ctx.selected_date(), date_b);
    match ctx.snapshot() {
        NutritionSnapshot::Loaded { date, goals, log } => {
            assert_eq!(date, date_b);
            assert_eq!(goals.date, date_b);
            assert_eq!(log.date, date_b);
        }
        other => panic!("Expected loaded snapshot, got {:?}", other),
    }
}

#[tokio::test]
async fn test_load_failure_is_explicit() {
    // No metrics yet, so goals cannot be derived
    let app = test_app();
    let snapshot = app.session.nutrition.set_selected_date(test_date()).await;

    match snapshot {
        NutritionSnapshot::LoadFailed { date, error } => {
            assert_eq!(date, test_date());
            assert!(matches!(*error, AppError::NotFound(_)));
        }
        other => panic!("Expected LoadFailed, got {:?}", other),
    }
    assert_eq!(app.session.nutrition.remaining(), None);
}

#[tokio::test]
async fn test_refresh_recovers_after_outage() {
    let app = onboarded_app().await;
    let ctx = &app.session.nutrition;

    app.db.set_offline(true);
    let failed = ctx.refresh().await;
    assert!(matches!(failed, NutritionSnapshot::LoadFailed { .. }));

    app.db.set_offline(false);
    let loaded = ctx.refresh().await;
    assert!(loaded.is_loaded());
    assert_eq!(loaded.date(), Some(test_date()));
}

#[tokio::test]
async fn test_remaining_goes_negative_when_over_goal() {
    let app = onboarded_app().await;
    let ctx = &app.session.nutrition;
    ctx.set_selected_date(test_date()).await;

    app.session
        .meals
        .log_meal(ctx, &draft("Feast", 3500.0, 100.0, 400.0, 120.0))
        .await
        .unwrap();

    let remaining = ctx.remaining().unwrap();
    assert_eq!(remaining, Macros::new(-260.0, 76.0, 43.0, -35.0));
}

#[tokio::test]
async fn test_refresh_picks_up_writes_from_elsewhere() {
    let app = onboarded_app().await;
    let ctx = &app.session.nutrition;
    ctx.set_selected_date(test_date()).await;

    // Logged through a different store, not written through this provider
    let meal = snack("Apple", 95.0);
    app.session
        .logs
        .apply_meal(common::TEST_USER, test_date(), meal)
        .await
        .unwrap();
    assert_eq!(ctx.remaining().unwrap().calories, 3240.0);

    ctx.refresh().await;
    assert_eq!(ctx.remaining().unwrap().calories, 3240.0 - 95.0);

    let summary = ctx.summary().unwrap();
    assert_eq!(summary.meals.len(), 1);
    assert_eq!(summary.meals[0].name, "Apple");
}

#[tokio::test]
async fn test_write_through_during_reload_is_kept() {
    let app = onboarded_app().await;
    let ctx = &app.session.nutrition;
    ctx.set_selected_date(test_date()).await;

    // The reload reads the empty log, then sits on it while a meal lands
    app.db
        .set_read_delay(test_date(), std::time::Duration::from_millis(150));
    let meal = snack("Banana", 105.0);

    let (reloaded, ()) = tokio::join!(ctx.refresh(), async {
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        let log = app
            .db
            .update_log_atomic(common::TEST_USER, test_date(), &|log| {
                *log = with_meal(log, meal.clone());
                Ok(())
            })
            .await
            .unwrap();
        ctx.apply_local_log(&log);
    });

    assert_eq!(reloaded.remaining().unwrap().calories, 3240.0 - 105.0);
    assert_eq!(ctx.remaining().unwrap().calories, 3240.0 - 105.0);
    let summary = ctx.summary().unwrap();
    assert_eq!(summary.meals.len(), 1);
    assert_eq!(summary.meals[0].name, "Banana");
}

#[tokio::test]
async fn test_write_for_other_day_does_not_leak_into_reload() {
    let app = onboarded_app().await;
    let ctx = &app.session.nutrition;
    let tomorrow = test_date() + Duration::days(1);
    ctx.set_selected_date(tomorrow).await;

    let log = app
        .session
        .logs
        .apply_meal(common::TEST_USER, tomorrow, snack("Pear", 100.0))
        .await
        .unwrap();
    ctx.apply_local_log(&log);

    let back = ctx.set_selected_date(test_date()).await;
    match back {
        NutritionSnapshot::Loaded { date, log, .. } => {
            assert_eq!(date, test_date());
            assert!(log.meals_data.is_empty());
        }
        other => panic!("Expected loaded snapshot, got {:?}", other),
    }
}
