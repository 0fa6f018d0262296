// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types shared by every workflow.
//!
//! Validation failures are reported inline to the caller that produced the
//! bad input. Remote failures are logged at the workflow boundary and passed
//! on to the UI layer, which decides how to present them.

use chrono::NaiveDate;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid metrics: {0}")]
    InvalidMetrics(String),

    #[error("Invalid meal: {0}")]
    InvalidMeal(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Remote service unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Completion provider error: {0}")]
    Completion(String),

    #[error("Meal not found: {0}")]
    MealNotFound(String),

    #[error("Chat session not found: {0}")]
    SessionNotFound(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Sending message failed: {0}")]
    SendFailed(String),

    #[error("Delete of {resource} not visible after {attempts} attempts")]
    DeleteVerificationExhausted { resource: String, attempts: u32 },

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Goals could not be created for {} date(s): {message}", failed.len())]
    GoalsIncomplete {
        failed: Vec<NaiveDate>,
        message: String,
    },

    #[error("Authentication required")]
    Unauthorized,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Message fragment used when a completion provider rate-limits us.
    pub const COMPLETION_RATE_LIMIT: &'static str = "Rate limit exceeded";
    /// Message fragment used when a completion provider rejects our key.
    pub const COMPLETION_KEY_ERROR: &'static str = "Invalid API key";

    /// Whether a manual retry of the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::RemoteUnavailable(_) | AppError::SendFailed(_) => true,
            AppError::Completion(msg) => !msg.contains(Self::COMPLETION_KEY_ERROR),
            _ => false,
        }
    }

    /// Whether the error was caused by bad caller input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::InvalidMetrics(_) | AppError::InvalidMeal(_) | AppError::InvalidMessage(_)
        )
    }

    /// Whether the error is a referential lookup failure the caller should
    /// handle by refreshing and re-rendering.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::MealNotFound(_) | AppError::SessionNotFound(_) | AppError::NotFound(_)
        )
    }

    /// Short text suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidMetrics(msg)
            | AppError::InvalidMeal(msg)
            | AppError::InvalidMessage(msg) => msg.clone(),
            AppError::RemoteUnavailable(_) | AppError::Internal(_) => {
                "Something went wrong talking to the server. Please try again.".to_string()
            }
            AppError::Completion(_) | AppError::SendFailed(_) => {
                "Your coach could not answer right now. Tap to retry.".to_string()
            }
            AppError::MealNotFound(_) => "That meal no longer exists.".to_string(),
            AppError::SessionNotFound(_) => "That conversation no longer exists.".to_string(),
            AppError::NotFound(what) => format!("{} not found.", what),
            AppError::GoalsIncomplete { .. } => {
                "Some of your upcoming goals could not be prepared.".to_string()
            }
            AppError::Unauthorized => "Please sign in again.".to_string(),
            AppError::Auth(msg) => msg.clone(),
            // Never surfaced to the user; see ChatService::cleanup_empty_sessions.
            AppError::DeleteVerificationExhausted { .. } | AppError::AlreadyExists(_) => {
                String::new()
            }
        }
    }
}

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, AppError>;
