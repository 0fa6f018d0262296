// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Body metrics, weigh-ins and weight trend.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{DailyNutritionGoals, UserMetrics, WeightEntry};
use crate::services::goals::GoalsStore;
use crate::time_utils::{format_utc_rfc3339, Clock};

/// Most weigh-ins considered when computing a trend.
const TREND_FETCH_LIMIT: u32 = 500;

const MS_PER_WEEK: f64 = 7.0 * 24.0 * 60.0 * 60.0 * 1000.0;

/// Summary of weigh-ins over a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightTrend {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    /// Least-squares slope in kg per week; 0 with fewer than two points
    pub kg_per_week: f64,
}

/// Trend over `(time, weight)` points. `None` if there are no points.
pub fn weight_trend(points: &[(DateTime<Utc>, f64)]) -> Option<WeightTrend> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let weights = points.iter().map(|(_, w)| *w);
    let average = weights.clone().sum::<f64>() / n;
    let min = weights.clone().fold(f64::INFINITY, f64::min);
    let max = weights.fold(f64::NEG_INFINITY, f64::max);

    let kg_per_week = if points.len() < 2 {
        0.0
    } else {
        let origin = points[0].0;
        let xs: Vec<f64> = points
            .iter()
            .map(|(t, _)| (*t - origin).num_milliseconds() as f64)
            .collect();
        let x_mean = xs.iter().sum::<f64>() / n;
        let (num, den) = xs.iter().zip(points).fold((0.0, 0.0), |(num, den), (x, (_, y))| {
            (num + (x - x_mean) * (y - average), den + (x - x_mean).powi(2))
        });
        if den == 0.0 {
            0.0
        } else {
            num / den * MS_PER_WEEK
        }
    };

    Some(WeightTrend {
        average,
        min,
        max,
        kg_per_week,
    })
}

#[derive(Clone)]
pub struct MetricsService {
    db: Arc<dyn Database>,
    goals: GoalsStore,
    clock: Arc<dyn Clock>,
}

impl MetricsService {
    pub fn new(db: Arc<dyn Database>, goals: GoalsStore, clock: Arc<dyn Clock>) -> Self {
        Self { db, goals, clock }
    }

    pub async fn get_metrics(&self, user_id: &str) -> Result<Option<UserMetrics>> {
        self.db.get_user_metrics(user_id).await
    }

    /// Store metrics from onboarding or a profile edit and recompute goals
    /// for today onwards.
    pub async fn save_metrics(&self, metrics: &UserMetrics) -> Result<Vec<DailyNutritionGoals>> {
        metrics.check()?;

        let mut stored = metrics.clone();
        stored.updated_at = format_utc_rfc3339(self.clock.now());
        self.db.upsert_user_metrics(&stored).await.inspect_err(|e| {
            tracing::warn!(user_id = %stored.user_id, error = %e, "Failed to save metrics");
        })?;

        tracing::info!(
            user_id = %stored.user_id,
            activity_level = %stored.activity_level,
            "Metrics saved"
        );
        self.goals.recompute_goals(&stored).await
    }

    /// Record a weigh-in. If the user has metrics, their current weight is
    /// updated and goals recomputed.
    pub async fn log_weight(
        &self,
        user_id: &str,
        weight_kg: f64,
        notes: Option<&str>,
    ) -> Result<WeightEntry> {
        if !weight_kg.is_finite() || weight_kg <= 0.0 {
            return Err(AppError::InvalidMetrics(
                "weight must be a positive number".to_string(),
            ));
        }

        let entry = WeightEntry {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            weight_kg,
            notes: notes.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
            recorded_at: format_utc_rfc3339(self.clock.now()),
        };
        self.db.insert_weight_entry(&entry).await.inspect_err(|e| {
            tracing::warn!(user_id, error = %e, "Failed to store weigh-in");
        })?;

        match self.db.get_user_metrics(user_id).await? {
            Some(mut metrics) => {
                metrics.current_weight = weight_kg;
                self.save_metrics(&metrics).await?;
            }
            None => {
                tracing::debug!(user_id, "Weigh-in stored for user without metrics");
            }
        }

        tracing::info!(user_id, weight_kg, "Weight logged");
        Ok(entry)
    }

    /// Weigh-ins newest first.
    pub async fn weight_history(&self, user_id: &str, limit: u32) -> Result<Vec<WeightEntry>> {
        self.db.list_weight_entries(user_id, limit).await
    }

    /// Trend over the last `days` days.
    pub async fn weight_trend(&self, user_id: &str, days: u32) -> Result<Option<WeightTrend>> {
        let cutoff = self.clock.now() - Duration::days(i64::from(days));
        let entries = self.db.list_weight_entries(user_id, TREND_FETCH_LIMIT).await?;

        let mut points: Vec<(DateTime<Utc>, f64)> = entries
            .iter()
            .filter_map(|e| match DateTime::parse_from_rfc3339(&e.recorded_at) {
                Ok(t) => Some((t.with_timezone(&Utc), e.weight_kg)),
                Err(err) => {
                    tracing::warn!(user_id, entry_id = %e.id, error = %err, "Skipping weigh-in with bad timestamp");
                    None
                }
            })
            .filter(|(t, _)| *t >= cutoff)
            .collect();
        points.sort_by_key(|(t, _)| *t);

        Ok(weight_trend(&points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 8, 0, 0).unwrap()
    }

    #[test]
    fn no_points_has_no_trend() {
        assert_eq!(weight_trend(&[]), None);
    }

    #[test]
    fn single_point_is_flat() {
        let trend = weight_trend(&[(at(1), 80.0)]).unwrap();
        assert_eq!(trend.kg_per_week, 0.0);
        assert_eq!(trend.average, 80.0);
    }

    #[test]
    fn steady_loss_is_reported_per_week() {
        // 0.1 kg per day over a week
        let points: Vec<_> = (0..8).map(|d| (at(1 + d), 80.0 - 0.1 * f64::from(d))).collect();
        let trend = weight_trend(&points).unwrap();
        assert!((trend.kg_per_week + 0.7).abs() < 1e-9);
        assert_eq!(trend.max, 80.0);
        assert!((trend.min - 79.3).abs() < 1e-9);
    }
}
