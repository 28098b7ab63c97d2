use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::models::{AnswerMap, Insights, Sector};
use crate::questions::Question;

/// Message surfaced to the lead when insights cannot be generated.
pub const INSIGHTS_ERROR_MESSAGE: &str =
    "We couldn't generate personalized insights right now. Your results are below.";

/// Everything the prompt needs about one completed quiz.
#[derive(Debug, Clone, Copy)]
pub struct InsightRequest<'a> {
    pub sector: Sector,
    pub score: u32,
    pub max_score: u32,
    pub questions: &'a [Question],
    pub answers: &'a AnswerMap,
}

/// Insights if generation succeeded, otherwise the generic error message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightOutcome {
    pub insights: Option<Insights>,
    pub error: Option<String>,
}

impl InsightOutcome {
    fn failed() -> Self {
        Self {
            insights: None,
            error: Some(INSIGHTS_ERROR_MESSAGE.to_string()),
        }
    }
}

/// Client for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct InsightService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl InsightService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generates insights, swallowing every failure into the generic message.
    pub async fn generate(&self, request: InsightRequest<'_>) -> InsightOutcome {
        let prompt = build_prompt(&request);

        match self.request_insights(&prompt).await {
            Ok(insights) => {
                tracing::info!("Generated insights for {} lead", request.sector);
                InsightOutcome {
                    insights: Some(insights),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!("Insight generation failed: {}", e);
                InsightOutcome::failed()
            }
        }
    }

    /// One request/response round trip. No retries.
    pub async fn request_insights(&self, prompt: &str) -> Result<Insights, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Configuration("GEMINI_API_KEY not set".to_string()))?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        tracing::debug!("Requesting insights from model {}", self.model);

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema()
            }
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(AppError::from)
            .context("Gemini request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Gemini returned {}: {}",
                status, error_text
            )));
        }

        let data: Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Gemini response: {}", e))
        })?;

        let text = data
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AppError::ExternalApiError("Gemini response missing candidate text".to_string())
            })?;

        parse_insights(text)
    }
}

/// JSON schema requested from the model: a summary and exactly three steps.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING" },
            "actionable_steps": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "minItems": 3,
                "maxItems": 3
            }
        },
        "required": ["summary", "actionable_steps"]
    })
}

/// Parses the model's JSON text. Missing fields or a step count other than
/// three make the whole response unusable.
pub fn parse_insights(text: &str) -> Result<Insights, AppError> {
    serde_json::from_str::<Insights>(text.trim())
        .map_err(|e| AppError::ExternalApiError(format!("Malformed insights JSON: {}", e)))
}

/// Builds the prompt from sector, score and the answered questions.
pub fn build_prompt(request: &InsightRequest<'_>) -> String {
    let answered: Vec<String> = request
        .answers
        .iter()
        .filter_map(|(index, answer)| {
            let question = request.questions.get(*index)?;
            let option = question.option(&answer.value)?;
            Some(format!(
                "- Q: {}\n  A: {} ({} pts)",
                question.text.get(request.sector),
                option.text.get(request.sector),
                answer.points
            ))
        })
        .collect();

    format!(
        "You are an LED display consultant advising a {sector} prospect.\n\
         They completed a readiness assessment and scored {score} out of {max}.\n\n\
         Their answers:\n{answers}\n\n\
         Write a short, encouraging summary (2-3 sentences) of where they stand, \
         then exactly three concrete, actionable next steps tailored to their answers.\n\
         Respond as JSON with the fields \"summary\" (string) and \
         \"actionable_steps\" (array of exactly 3 strings).",
        sector = request.sector.label(),
        score = request.score,
        max = request.max_score,
        answers = answered.join("\n"),
    )
}
