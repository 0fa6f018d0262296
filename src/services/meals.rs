// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Meal logging workflow.
//!
//! A meal is written twice: as an immutable food entry and folded into the
//! owning day's log. The two writes are separate store calls; the food
//! entry goes first so that [`DailyLogStore::reconcile`] can repair a log
//! left behind by an interrupted workflow.

use bytes::Bytes;
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{DailyNutritionLog, FoodEntry, MealDraft, MealImage};
use crate::services::daily_log::DailyLogStore;
use crate::services::nutrition_context::NutritionContextProvider;
use crate::services::storage::ObjectStorage;
use crate::time_utils::{format_utc_rfc3339, Clock};

const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// Result of logging a meal.
#[derive(Debug, Clone)]
pub struct LoggedMeal {
    pub entry: FoodEntry,
    pub log: DailyNutritionLog,
}

#[derive(Clone)]
pub struct MealLogger {
    db: Arc<dyn Database>,
    logs: DailyLogStore,
    storage: Arc<dyn ObjectStorage>,
    clock: Arc<dyn Clock>,
    images_prefix: String,
}

impl MealLogger {
    pub fn new(
        db: Arc<dyn Database>,
        logs: DailyLogStore,
        storage: Arc<dyn ObjectStorage>,
        clock: Arc<dyn Clock>,
        images_prefix: String,
    ) -> Self {
        Self {
            db,
            logs,
            storage,
            clock,
            images_prefix,
        }
    }

    /// Log a meal against today's log.
    pub async fn log_meal(
        &self,
        ctx: &NutritionContextProvider,
        draft: &MealDraft,
    ) -> Result<LoggedMeal> {
        self.log_meal_on(ctx, self.clock.today(), draft).await
    }

    /// Log a meal against the log for `date`.
    pub async fn log_meal_on(
        &self,
        ctx: &NutritionContextProvider,
        date: NaiveDate,
        draft: &MealDraft,
    ) -> Result<LoggedMeal> {
        let macros = draft.check()?;
        let user_id = ctx.user_id();
        let now = format_utc_rfc3339(self.clock.now());

        let entry = FoodEntry {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            log_date: date,
            food_name: draft.food_name.trim().to_string(),
            calories: macros.calories,
            protein: macros.protein,
            carbs: macros.carbs,
            fat: macros.fat,
            meal_slot: draft.meal_slot,
            eaten_at: now.clone(),
            image_url: draft.image.as_ref().map(|i| i.image_url.clone()),
            thumbnail_url: draft.image.as_ref().and_then(|i| i.thumbnail_url.clone()),
            source: Some(draft.source),
            created_at: now,
        };

        self.db.insert_food_entry(&entry).await.inspect_err(|e| {
            tracing::warn!(user_id, %date, error = %e, "Failed to store food entry");
        })?;

        let log = self
            .logs
            .apply_meal(user_id, date, entry.to_meal_log())
            .await
            .inspect_err(|e| {
                tracing::error!(
                    user_id,
                    %date,
                    meal_id = %entry.id,
                    error = %e,
                    "Food entry stored but daily log not updated"
                );
            })?;

        ctx.apply_local_log(&log);

        tracing::info!(
            user_id,
            %date,
            meal_id = %entry.id,
            source = ?draft.source,
            calories = entry.calories,
            "Meal logged"
        );

        Ok(LoggedMeal { entry, log })
    }

    /// Record image URLs for an already logged meal.
    ///
    /// Only the food entry is written; the cached log copy is patched in
    /// place if the meal is on the loaded day.
    pub async fn attach_image(
        &self,
        ctx: &NutritionContextProvider,
        meal_id: Uuid,
        image_url: &str,
        thumbnail_url: Option<&str>,
    ) -> Result<()> {
        self.owned_entry(ctx, meal_id).await?;
        self.db
            .set_food_entry_image(meal_id, image_url, thumbnail_url)
            .await
            .inspect_err(|e| {
                tracing::warn!(%meal_id, error = %e, "Failed to attach meal image");
            })?;

        let cached = ctx.update_cached_meal_image(meal_id, image_url, thumbnail_url);
        tracing::debug!(%meal_id, cached, "Meal image attached");
        Ok(())
    }

    /// Upload full-size and thumbnail JPEGs for a meal, then attach them.
    pub async fn upload_meal_image(
        &self,
        ctx: &NutritionContextProvider,
        meal_id: Uuid,
        full: Bytes,
        thumbnail: Bytes,
    ) -> Result<MealImage> {
        let entry = self.owned_entry(ctx, meal_id).await?;

        let timestamp = self.clock.now().timestamp_millis();
        let dir = format!("{}/{}/{}", self.images_prefix, entry.user_id, meal_id);
        let full_path = format!("{}/full-{}.jpg", dir, timestamp);
        let thumb_path = format!("{}/thumb-{}.jpg", dir, timestamp);

        tokio::try_join!(
            self.storage.upload(&full_path, full, IMAGE_CONTENT_TYPE),
            self.storage.upload(&thumb_path, thumbnail, IMAGE_CONTENT_TYPE),
        )
        .inspect_err(|e| {
            tracing::warn!(%meal_id, error = %e, "Meal image upload failed");
        })?;

        let image = MealImage {
            image_url: self.storage.public_url(&full_path),
            thumbnail_url: Some(self.storage.public_url(&thumb_path)),
        };
        self.attach_image(ctx, meal_id, &image.image_url, image.thumbnail_url.as_deref())
            .await?;
        Ok(image)
    }

    /// Delete a meal and subtract it from the log of the day it belongs to.
    ///
    /// The owning day comes from the food entry, not from the date the
    /// provider has loaded. The log is updated before the entry is removed,
    /// so a failure leaves an entry that [`DailyLogStore::reconcile`] can
    /// still account for.
    pub async fn delete_meal(&self, ctx: &NutritionContextProvider, meal_id: Uuid) -> Result<()> {
        let entry = self.owned_entry(ctx, meal_id).await?;
        let user_id = ctx.user_id();

        match self.logs.remove_meal(user_id, entry.log_date, meal_id).await {
            Ok(log) => ctx.apply_local_log(&log),
            Err(AppError::MealNotFound(_)) => {
                // Entry was never folded into its log; nothing to subtract.
                tracing::warn!(
                    user_id,
                    %meal_id,
                    date = %entry.log_date,
                    "Food entry missing from daily log"
                );
            }
            Err(e) => return Err(e),
        }

        self.db.delete_food_entry(meal_id).await.inspect_err(|e| {
            tracing::error!(
                user_id,
                %meal_id,
                error = %e,
                "Meal removed from daily log but food entry not deleted"
            );
        })?;

        tracing::info!(user_id, %meal_id, date = %entry.log_date, "Meal deleted");
        Ok(())
    }

    async fn owned_entry(&self, ctx: &NutritionContextProvider, meal_id: Uuid) -> Result<FoodEntry> {
        match self.db.get_food_entry(meal_id).await? {
            Some(entry) if entry.user_id == ctx.user_id() => Ok(entry),
            _ => Err(AppError::MealNotFound(meal_id.to_string())),
        }
    }
}
