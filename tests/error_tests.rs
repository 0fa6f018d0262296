// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::NaiveDate;
use nutrition_coach::error::AppError;

#[test]
fn test_is_transient_matches() {
    let err = AppError::RemoteUnavailable("connection reset".to_string());
    assert!(err.is_transient());

    let err = AppError::SendFailed("timeout".to_string());
    assert!(err.is_transient());

    let err = AppError::Completion(AppError::COMPLETION_RATE_LIMIT.to_string());
    assert!(err.is_transient());
}

#[test]
fn test_is_transient_no_match() {
    let err = AppError::Completion(AppError::COMPLETION_KEY_ERROR.to_string());
    assert!(!err.is_transient());

    let err = AppError::InvalidMeal("calories is required".to_string());
    assert!(!err.is_transient());

    let err = AppError::DeleteVerificationExhausted {
        resource: "chat_sessions/abc".to_string(),
        attempts: 5,
    };
    assert!(!err.is_transient());
}

#[test]
fn test_validation_errors_show_their_message() {
    let err = AppError::InvalidMetrics("age must be at least 1".to_string());
    assert!(err.is_validation());
    assert_eq!(err.user_message(), "age must be at least 1");

    let err = AppError::InvalidMessage("message is empty".to_string());
    assert!(err.is_validation());
    assert!(!err.is_not_found());
}

#[test]
fn test_remote_details_are_not_shown_to_user() {
    let err = AppError::RemoteUnavailable("Firestore: deadline exceeded on projects/x".to_string());
    assert!(!err.user_message().contains("Firestore"));

    let err = AppError::SendFailed(AppError::COMPLETION_KEY_ERROR.to_string());
    assert!(!err.user_message().contains("API key"));
}

#[test]
fn test_cleanup_exhaustion_is_silent() {
    let err = AppError::DeleteVerificationExhausted {
        resource: "chat_sessions/abc".to_string(),
        attempts: 5,
    };
    assert!(err.user_message().is_empty());
    assert_eq!(
        err.to_string(),
        "Delete of chat_sessions/abc not visible after 5 attempts"
    );
}

#[test]
fn test_goals_incomplete_counts_dates() {
    let err = AppError::GoalsIncomplete {
        failed: vec![
            NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 5).unwrap(),
        ],
        message: "write rejected".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Goals could not be created for 2 date(s): write rejected"
    );
}
