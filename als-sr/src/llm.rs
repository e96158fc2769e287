//! OpenAI-compatible tie arbitrator
//!
//! Sends the tied recommendation to a chat-completions endpoint and parses the
//! model's JSON verdict. All failures surface as [`ArbitrationError`]; the caller
//! downgrades them to the rule-based choice.

use als_common::arbitration::{
    parse_verdict, ArbitrationError, ArbitrationVerdict, TieArbitrator, UserProfile,
};
use als_common::config::LlmConfig;
use als_common::recommend::RecommendationResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("als-sr/", env!("CARGO_PKG_VERSION"));

const SYSTEM_PROMPT: &str = "You are an educational strategy recommender. \
Given two candidate strategies and user signal, choose one final strategy. \
Return strict JSON only.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client used as a [`TieArbitrator`]
pub struct OpenAiArbitrator {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiArbitrator {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, ArbitrationError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ArbitrationError::Unavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.resolved_model(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Build from configuration; `None` when disabled or no API key is set
    pub fn from_config(config: &LlmConfig) -> Option<Self> {
        if !config.enabled {
            info!("LLM tie arbitration disabled by config");
            return None;
        }
        let Some(api_key) = config.api_key() else {
            info!(
                env = %config.api_key_env,
                "No LLM API key set; ties use the rule-based fallback"
            );
            return None;
        };
        match Self::new(config, api_key) {
            Ok(client) => {
                info!(model = %client.model, "LLM tie arbitration enabled");
                Some(client)
            }
            Err(e) => {
                tracing::warn!(error = %e, "LLM client could not be created");
                None
            }
        }
    }

    /// User message: instruction, candidate pool, base result, profile and schema
    pub fn user_prompt(base: &RecommendationResult, profile: &UserProfile) -> String {
        json!({
            "instruction": "Pick one strategy from strategy_pool.",
            "strategy_pool": base.candidate_pool(),
            "base_result": base,
            "user_profile": profile,
            "output_schema": {
                "recommended_strategy": "string",
                "reason": "string",
                "confidence": "number between 0 and 1",
            },
        })
        .to_string()
    }
}

#[async_trait]
impl TieArbitrator for OpenAiArbitrator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn arbitrate(
        &self,
        base: &RecommendationResult,
        profile: &UserProfile,
    ) -> Result<ArbitrationVerdict, ArbitrationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::user_prompt(base, profile),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, "Requesting tie arbitration");

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ArbitrationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ArbitrationError::Transport(format!(
                "HTTP {}: {}",
                status.as_u16(),
                error_text
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ArbitrationError::Parse(e.to_string()))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        parse_verdict(&content)
    }
}
