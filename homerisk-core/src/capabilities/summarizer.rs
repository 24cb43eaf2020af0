//! Summarizer capability over an OpenAI-compatible chat endpoint, plus the
//! defensive parser that turns raw model output into a validated
//! [`RiskAnalysis`].

use async_trait::async_trait;
use homerisk_model::RiskAnalysis;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{CapabilityError, Summarizer};

pub struct ChatSummarizer {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
}

impl ChatSummarizer {
    pub fn new(endpoint: Url, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            model: model.into(),
            api_key,
        }
    }
}

impl std::fmt::Debug for ChatSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSummarizer")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn generate(&self, prompt: &str) -> Result<String, CapabilityError> {
        let mut request = self.client.post(self.endpoint.clone()).json(&json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.2,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?.error_for_status()?;
        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                CapabilityError::UnexpectedResponse("chat response had no choices".into())
            })?;
        Ok(content)
    }
}

/// Defensively parse summarizer output into a validated analysis.
///
/// Models wrap JSON in markdown fences or prose more often than not, so
/// strip fences, cut to the outermost object, then parse and validate the
/// schema (required categories present, every score in [0, 10]). Anything
/// that does not survive all three steps is unusable output, never a partial
/// analysis.
pub fn parse_analysis(
    raw: &str,
    required_categories: &[&str],
) -> Result<RiskAnalysis, CapabilityError> {
    let stripped = raw.replace("```json", "").replace("```", "");
    let trimmed = stripped.trim();

    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    let candidate = match (start, end) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => {
            return Err(CapabilityError::UnusableOutput(
                "no JSON object in summarizer output".into(),
            ));
        }
    };

    let analysis: RiskAnalysis = serde_json::from_str(candidate)
        .map_err(|e| CapabilityError::UnusableOutput(format!("invalid analysis JSON: {e}")))?;
    analysis
        .validate(required_categories)
        .map_err(|e| CapabilityError::UnusableOutput(e.to_string()))?;
    Ok(analysis)
}
