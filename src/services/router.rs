// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Classifies coach messages so each kind gets its own system prompt.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::services::llm::{strip_code_fence, CompletionClient, CompletionRequest, PromptMessage};

const BASE_PROMPT: &str = "You are a fitness coach and nutrition expert.";

const ROUTING_PROMPT: &str = "As a fitness coach, analyze the user's message and categorize it into one of these types:
- text: General nutrition questions or statements
- image: Requests involving meal or food images
- food_log: Logging or reviewing food entries
- goal_check: Questions about progress or goal status
- suggestion_request: Asking for meal or nutrition suggestions

Respond in JSON format with:
{
  \"type\": \"one of the above types\",
  \"confidence\": \"number between 0 and 1\",
  \"reasoning\": \"brief explanation of the categorization\"
}";

const FALLBACK_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    Text,
    Image,
    FoodLog,
    GoalCheck,
    SuggestionRequest,
}

impl MessageCategory {
    /// Category-specific system prompt.
    pub fn system_prompt(self) -> String {
        let body = match self {
            MessageCategory::Text => {
                "Provide specific, actionable nutrition advice based on the user's question."
            }
            MessageCategory::Image => {
                "Analyze this meal image and provide:
1. Estimated calories
2. Macronutrient breakdown (protein, carbs, fat)
3. Brief nutritional assessment
4. Suggestions for improvement if needed"
            }
            MessageCategory::FoodLog => {
                "Review this food log entry and provide:
1. Confirmation of the logged nutrition values
2. How this fits into their daily goals
3. Brief feedback on meal composition
4. Suggestions for future meals"
            }
            MessageCategory::GoalCheck => {
                "Analyze their progress towards nutrition goals:
1. Compare current intake vs goals
2. Identify trends and patterns
3. Provide specific adjustments if needed
4. Offer encouragement and actionable next steps"
            }
            MessageCategory::SuggestionRequest => {
                "Provide personalized meal suggestions considering:
1. Their remaining macro/calorie targets for the day
2. Previous meal patterns
3. Stated preferences and restrictions
4. Quick and practical options"
            }
        };
        format!("{} {}", BASE_PROMPT, body)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: MessageCategory,
    pub confidence: f64,
    pub reasoning: String,
}

impl Classification {
    fn fallback(reason: &str) -> Self {
        Self {
            category: MessageCategory::Text,
            confidence: FALLBACK_CONFIDENCE,
            reasoning: reason.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RoutingResponse {
    #[serde(rename = "type")]
    category: MessageCategory,
    #[serde(default, deserialize_with = "lenient_f64")]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: String,
}

// Models sometimes return the confidence as a string.
fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Parse a routing reply. `None` if it does not name a known category.
pub fn parse_classification(content: &str) -> Option<Classification> {
    let parsed: RoutingResponse = serde_json::from_str(strip_code_fence(content)).ok()?;
    Some(Classification {
        category: parsed.category,
        confidence: parsed
            .confidence
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(FALLBACK_CONFIDENCE),
        reasoning: parsed.reasoning,
    })
}

#[derive(Clone)]
pub struct MessageRouter {
    client: Arc<dyn CompletionClient>,
    model: String,
}

impl MessageRouter {
    pub fn new(client: Arc<dyn CompletionClient>, model: String) -> Self {
        Self { client, model }
    }

    /// Classify a message. Never fails: errors fall back to `Text`.
    pub async fn classify(&self, message: &str) -> Classification {
        let request = CompletionRequest::new(
            self.model.clone(),
            vec![
                PromptMessage::system(ROUTING_PROMPT),
                PromptMessage::user(message),
            ],
        )
        .with_temperature(0.3)
        .json();

        let classification = match self.client.complete(&request).await {
            Ok(completion) => parse_classification(&completion.content).unwrap_or_else(|| {
                tracing::warn!("Unparseable routing response, using text");
                Classification::fallback("Fallback due to unparseable routing response")
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Message routing failed, using text");
                Classification::fallback("Fallback due to routing error")
            }
        };

        tracing::debug!(
            category = ?classification.category,
            confidence = classification.confidence,
            "Message routed"
        );
        classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_routing_reply() {
        let c = parse_classification(
            r#"{"type":"goal_check","confidence":0.9,"reasoning":"asks about progress"}"#,
        )
        .unwrap();
        assert_eq!(c.category, MessageCategory::GoalCheck);
        assert_eq!(c.confidence, 0.9);
    }

    #[test]
    fn accepts_string_confidence_and_fences() {
        let c = parse_classification(
            "```json\n{\"type\":\"suggestion_request\",\"confidence\":\"0.7\"}\n```",
        )
        .unwrap();
        assert_eq!(c.category, MessageCategory::SuggestionRequest);
        assert_eq!(c.confidence, 0.7);
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert!(parse_classification(r#"{"type":"weather","confidence":1}"#).is_none());
        assert!(parse_classification("food_log").is_none());
    }

    #[test]
    fn prompts_share_base() {
        for category in [
            MessageCategory::Text,
            MessageCategory::Image,
            MessageCategory::FoodLog,
            MessageCategory::GoalCheck,
            MessageCategory::SuggestionRequest,
        ] {
            assert!(category.system_prompt().starts_with(BASE_PROMPT));
        }
    }
}
