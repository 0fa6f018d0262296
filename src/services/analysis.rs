// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Structured meal estimates from a description or a photo.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{Macros, MealDraft, MealSlot, MealSource};
use crate::services::llm::{strip_code_fence, CompletionClient, CompletionRequest, PromptMessage};

const ESTIMATE_PROMPT: &str = "You are a nutrition expert. Estimate the nutrition of the meal the user describes or shows. \
Respond in JSON format with exactly these fields:
{
  \"name\": \"short name of the meal\",
  \"calories\": number (kcal),
  \"protein\": number (grams),
  \"carbs\": number (grams),
  \"fat\": number (grams)
}";

const IMAGE_INSTRUCTION: &str = "Estimate the nutrition of the food in this photo.";

/// Model estimate of one meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealEstimate {
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    /// How the estimate was produced; not part of the model reply
    #[serde(skip, default = "default_source")]
    pub source: MealSource,
}

fn default_source() -> MealSource {
    MealSource::Chat
}

impl MealEstimate {
    pub fn macros(&self) -> Macros {
        Macros::new(self.calories, self.protein, self.carbs, self.fat)
    }

    /// Draft for the meal logging workflow. Still validated on log.
    pub fn into_draft(self, meal_slot: MealSlot) -> MealDraft {
        let macros = self.macros();
        MealDraft::new(self.name, macros, meal_slot, self.source)
    }
}

/// Parse a model reply into an estimate.
pub fn parse_estimate(content: &str, source: MealSource) -> Result<MealEstimate> {
    let mut estimate: MealEstimate = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| AppError::Completion(format!("Unparseable meal estimate: {}", e)))?;
    estimate.source = source;
    Ok(estimate)
}

#[derive(Clone)]
pub struct MealAnalyzer {
    client: Arc<dyn CompletionClient>,
    model: String,
}

impl MealAnalyzer {
    pub fn new(client: Arc<dyn CompletionClient>, model: String) -> Self {
        Self { client, model }
    }

    /// Estimate a meal from a free-text description.
    pub async fn estimate_from_text(&self, description: &str) -> Result<MealEstimate> {
        if description.trim().is_empty() {
            return Err(AppError::InvalidMeal("description is required".to_string()));
        }
        self.estimate(PromptMessage::user(description.trim()), MealSource::Chat)
            .await
    }

    /// Estimate a meal from a photo.
    pub async fn estimate_from_image(&self, image: &[u8], content_type: &str) -> Result<MealEstimate> {
        if image.is_empty() {
            return Err(AppError::InvalidMeal("image is empty".to_string()));
        }
        self.estimate(
            PromptMessage::user_with_image(IMAGE_INSTRUCTION, image, content_type),
            MealSource::Scan,
        )
        .await
    }

    async fn estimate(&self, input: PromptMessage, source: MealSource) -> Result<MealEstimate> {
        let request = CompletionRequest::new(
            self.model.clone(),
            vec![PromptMessage::system(ESTIMATE_PROMPT), input],
        )
        .with_temperature(0.3)
        .json();

        let completion = self.client.complete(&request).await.inspect_err(|e| {
            tracing::warn!(?source, error = %e, "Meal estimate request failed");
        })?;

        let estimate = parse_estimate(&completion.content, source).inspect_err(|e| {
            tracing::warn!(?source, error = %e, "Meal estimate reply rejected");
        })?;

        tracing::info!(
            ?source,
            name = %estimate.name,
            calories = estimate.calories,
            "Meal estimated"
        );
        Ok(estimate)
    }
}
