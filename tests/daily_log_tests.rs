// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use nutrition_coach::db::Database;
use nutrition_coach::models::{DailyNutritionLog, Macros, MealLog, MealSlot, MealSource};
use nutrition_coach::services::daily_log::{with_meal, without_meal};
use nutrition_coach::services::DailyLogStore;
use uuid::Uuid;

mod common;
use common::{test_app, test_date, TEST_USER};

const NUM_CONCURRENT_MEALS: usize = 20;

fn meal(calories: f64, protein: f64, carbs: f64, fat: f64) -> MealLog {
    MealLog {
        id: Uuid::new_v4(),
        food_name: "Oatmeal".to_string(),
        calories,
        protein,
        carbs,
        fat,
        meal_slot: MealSlot::Breakfast,
        eaten_at: "2026-03-02T08:00:00.000Z".to_string(),
        image_url: None,
        thumbnail_url: None,
        source: Some(MealSource::Manual),
    }
}

fn zeroed() -> DailyNutritionLog {
    DailyNutritionLog::zeroed(TEST_USER, test_date(), String::new())
}

#[test]
fn test_fold_is_order_independent() {
    let meals = vec![
        meal(500.0, 30.0, 50.0, 15.0),
        meal(250.5, 12.5, 30.0, 8.25),
        meal(120.0, 0.0, 31.0, 0.5),
    ];
    let expected: Macros = meals.iter().map(MealLog::macros).sum();

    let forward = meals.iter().fold(zeroed(), |log, m| with_meal(&log, m.clone()));
    let backward = meals
        .iter()
        .rev()
        .fold(zeroed(), |log, m| with_meal(&log, m.clone()));

    assert_eq!(forward.consumed(), expected);
    assert_eq!(backward.consumed(), expected);
    assert_eq!(forward.meals_data.len(), 3);
}

#[test]
fn test_apply_then_remove_restores_totals() {
    let base = with_meal(&zeroed(), meal(300.0, 20.0, 10.0, 5.0));
    let extra = meal(500.0, 30.0, 50.0, 15.0);

    let added = with_meal(&base, extra.clone());
    let removed = without_meal(&added, extra.id).unwrap();

    assert_eq!(removed.consumed(), base.consumed());
    assert_eq!(removed.meals_data, base.meals_data);
}

#[tokio::test]
async fn test_logging_meal_against_zeroed_log() {
    let app = test_app();
    let logs = &app.session.logs;

    let log = logs
        .apply_meal(TEST_USER, test_date(), meal(500.0, 30.0, 50.0, 15.0))
        .await
        .unwrap();

    assert_eq!(log.consumed(), Macros::new(500.0, 30.0, 50.0, 15.0));
    assert_eq!(log.meals_data.len(), 1);

    let meal_id = log.meals_data[0].id;
    let log = logs.remove_meal(TEST_USER, test_date(), meal_id).await.unwrap();
    assert_eq!(log.consumed(), Macros::default());
    assert!(log.meals_data.is_empty());
}

#[tokio::test]
async fn test_remove_unknown_meal_is_not_found() {
    let app = test_app();
    let logs = &app.session.logs;

    // No log at all for the day
    let err = logs
        .remove_meal(TEST_USER, test_date(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // Log exists but the meal is not in it
    logs.apply_meal(TEST_USER, test_date(), meal(100.0, 1.0, 1.0, 1.0))
        .await
        .unwrap();
    let err = logs
        .remove_meal(TEST_USER, test_date(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_ensure_log_is_idempotent() {
    let app = test_app();
    let first = app.session.logs.ensure_log(TEST_USER, test_date()).await.unwrap();
    let second = app.session.logs.ensure_log(TEST_USER, test_date()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.consumed(), Macros::default());
}

#[tokio::test]
async fn test_concurrent_meal_adds_lose_no_update() {
    let app = test_app();

    let mut handles = vec![];
    for i in 0..NUM_CONCURRENT_MEALS {
        // Separate stores share nothing in process; only the database
        // update keeps them consistent.
        let store = if i % 2 == 0 {
            app.session.logs.clone()
        } else {
            DailyLogStore::new(app.db.clone(), app.clock.clone())
        };
        handles.push(tokio::spawn(async move {
            store
                .apply_meal(TEST_USER, test_date(), meal(100.0, 10.0, 5.0, 2.0))
                .await
        }));
    }

    for handle in handles {
        handle
            .await
            .expect("Task join failed")
            .expect("Meal add failed");
    }

    let log = app
        .db
        .get_log(TEST_USER, test_date())
        .await
        .unwrap()
        .expect("Log should exist");
    let n = NUM_CONCURRENT_MEALS as f64;
    assert_eq!(log.meals_data.len(), NUM_CONCURRENT_MEALS);
    assert_eq!(log.consumed(), Macros::new(100.0 * n, 10.0 * n, 5.0 * n, 2.0 * n));
}

#[tokio::test]
async fn test_reconcile_rebuilds_drifted_log() {
    let app = test_app();
    let logged = app
        .session
        .meals
        .log_meal(&app.session.nutrition, &common::draft("Rice bowl", 650.0, 25.0, 90.0, 18.0))
        .await
        .unwrap();

    // Simulate an interrupted workflow: the entry exists but the log was
    // overwritten without it.
    let mut drifted = zeroed();
    drifted.calories_consumed = 999.0;
    app.db.put_log_raw(drifted);

    let log = app.session.logs.reconcile(TEST_USER, test_date()).await.unwrap();
    assert_eq!(log.meals_data.len(), 1);
    assert_eq!(log.meals_data[0].id, logged.entry.id);
    assert_eq!(log.consumed(), Macros::new(650.0, 25.0, 90.0, 18.0));
    assert!(!log.totals_drifted());
}
