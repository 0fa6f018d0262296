// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::Duration;
use nutrition_coach::db::Database;
use nutrition_coach::error::AppError;
use nutrition_coach::services::GoalsStore;

mod common;
use common::{onboarded_app, test_app, test_date, test_metrics, TEST_USER};

const NUM_CONCURRENT_CALLERS: usize = 8;

#[tokio::test]
async fn test_get_goals_has_no_side_effects() {
    let app = test_app();
    app.db
        .upsert_user_metrics(&test_metrics(TEST_USER))
        .await
        .unwrap();

    let goals = app.session.goals.get_goals(TEST_USER, test_date()).await.unwrap();
    assert!(goals.is_none());
    assert_eq!(app.db.goals_count(), 0);
}

#[tokio::test]
async fn test_ensure_goals_is_idempotent() {
    let app = test_app();
    app.db
        .upsert_user_metrics(&test_metrics(TEST_USER))
        .await
        .unwrap();

    let first = app.session.goals.ensure_goals(TEST_USER, test_date()).await.unwrap();
    app.clock.advance(Duration::minutes(5));
    let second = app.session.goals.ensure_goals(TEST_USER, test_date()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.calories_goal, 3240);
    assert_eq!(app.db.goals_count(), 1);
}

#[tokio::test]
async fn test_concurrent_ensure_goals_creates_one_record() {
    let app = test_app();
    app.db
        .upsert_user_metrics(&test_metrics(TEST_USER))
        .await
        .unwrap();

    let mut handles = vec![];
    for _ in 0..NUM_CONCURRENT_CALLERS {
        let store = GoalsStore::new(app.db.clone(), app.clock.clone());
        handles.push(tokio::spawn(async move {
            store.ensure_goals(TEST_USER, test_date()).await
        }));
    }

    let mut results = vec![];
    for handle in handles {
        results.push(
            handle
                .await
                .expect("Task join failed")
                .expect("ensure_goals failed"),
        );
    }

    assert_eq!(app.db.goals_count(), 1);
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_ensure_goals_without_metrics_fails() {
    let app = test_app();
    let err = app
        .session
        .goals
        .ensure_goals(TEST_USER, test_date())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(app.db.goals_count(), 0);
}

#[tokio::test]
async fn test_upcoming_goals_cover_a_week() {
    let app = test_app();
    app.db
        .upsert_user_metrics(&test_metrics(TEST_USER))
        .await
        .unwrap();

    let goals = app.session.goals.ensure_upcoming_goals(TEST_USER).await.unwrap();
    let dates: Vec<_> = goals.iter().map(|g| g.date).collect();
    let expected: Vec<_> = (0..7).map(|d| test_date() + Duration::days(d)).collect();
    assert_eq!(dates, expected);
    assert!(goals.iter().all(|g| g.calories_goal == 3240));

    // Second pass creates nothing new
    app.session.goals.ensure_upcoming_goals(TEST_USER).await.unwrap();
    assert_eq!(app.db.goals_count(), 7);
}

#[tokio::test]
async fn test_upcoming_goals_partial_failure_attempts_every_day() {
    let app = test_app();
    app.db
        .upsert_user_metrics(&test_metrics(TEST_USER))
        .await
        .unwrap();
    let bad_day = test_date() + Duration::days(2);
    app.db.fail_goal_writes_on(bad_day);

    let err = app
        .session
        .goals
        .ensure_upcoming_goals(TEST_USER)
        .await
        .unwrap_err();

    match err {
        AppError::GoalsIncomplete { failed, .. } => assert_eq!(failed, vec![bad_day]),
        other => panic!("Expected GoalsIncomplete, got {:?}", other),
    }
    // The six other days were still created
    assert_eq!(app.db.goals_count(), 6);
    assert!(app
        .db
        .get_goals(TEST_USER, test_date() + Duration::days(6))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_metrics_change_rewrites_today_onwards_only() {
    let app = onboarded_app().await;
    let yesterday = test_date() - Duration::days(1);

    // A past day keeps whatever it had
    let past = app.session.goals.ensure_goals(TEST_USER, yesterday).await.unwrap();

    let mut metrics = test_metrics(TEST_USER);
    metrics.goal_weight = 80.0;
    app.session.metrics.save_metrics(&metrics).await.unwrap();

    let today = app
        .session
        .goals
        .get_goals(TEST_USER, test_date())
        .await
        .unwrap()
        .unwrap();
    // round(1767.5 * 1.55) with no adjustment
    assert_eq!(today.calories_goal, 2740);

    let past_after = app.session.goals.get_goals(TEST_USER, yesterday).await.unwrap().unwrap();
    assert_eq!(past_after, past);
}
