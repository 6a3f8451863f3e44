use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::instrument;

use quill_core::checker::{AdvisoryEngine, TextClassifier};
use quill_core::errors::CheckerError;
use quill_core::feedback::{ImprovementReport, SentenceFeedback, WordCheck};

use crate::extract;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the chat-completions backend.
#[derive(Clone)]
pub struct CheckerConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
}

impl std::fmt::Debug for CheckerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckerConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl CheckerConfig {
    /// Read configuration from `OPENAI_API_KEY` / `OPENAI_API_BASE` /
    /// `OPENAI_MODEL`. The key is required.
    pub fn from_env() -> Result<Self, CheckerError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| CheckerError::AuthenticationFailed("OPENAI_API_KEY is not set".into()))?;
        Ok(Self {
            api_key: SecretString::from(api_key),
            base_url: std::env::var("OPENAI_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        })
    }
}

/// Checker backed by an OpenAI-compatible chat-completions endpoint.
///
/// Each call asks for a strict JSON object; replies that cannot be
/// interpreted as one degrade to the neutral result instead of erroring.
/// Only transport-level faults surface as `CheckerError`.
pub struct OpenAiChecker {
    client: Client,
    config: CheckerConfig,
}

impl OpenAiChecker {
    pub fn new(config: CheckerConfig) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            config,
        }
    }

    pub fn from_env() -> Result<Self, CheckerError> {
        Ok(Self::new(CheckerConfig::from_env()?))
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Run one chat completion and return the assistant's text content.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, CheckerError> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| CheckerError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(CheckerError::from_status(status, body));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CheckerError::MalformedResponse(e.to_string()))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CheckerError::MalformedResponse("no completion content".into()))
    }
}

const CLASSIFIER_SYSTEM: &str =
    "You are a professional English grammar and writing checker. Respond with a single JSON object and nothing else.";

const TUTOR_SYSTEM: &str =
    "You are a professional English writing tutor. Respond with a single JSON object and nothing else.";

fn sentence_prompt(sentence: &str, full_text: Option<&str>) -> String {
    format!(
        r#"Check the following sentence for completeness and grammar.

Sentence: "{sentence}"
Full text: "{}"

Return a JSON object of this exact shape:
{{
    "is_complete": true,
    "issues": [
        {{"type": "grammar|spelling|punctuation|structure", "position": "where the problem is", "message": "what is wrong", "severity": "high|medium|low"}}
    ],
    "suggestions": [
        {{"type": "grammar|spelling|punctuation|structure", "original": "original text", "corrected": "corrected text", "explanation": "why"}}
    ],
    "overall_score": 0.85,
    "explanation": "overall assessment",
    "polished_sentence": "a natural, polished rewrite of the sentence",
    "polished_explanation": "what the rewrite improves"
}}

Scoring guide:
- 0.9-1.0: excellent, correct grammar, clear expression
- 0.7-0.8: good, a few minor mistakes
- 0.5-0.6: fair, noticeable mistakes that do not block understanding
- 0.0-0.4: poor, serious mistakes

Return only the JSON, nothing else."#,
        full_text.unwrap_or("none"),
    )
}

fn word_prompt(word: &str, context: Option<&str>) -> String {
    format!(
        r#"Check the spelling and usage of the following word.

Word: "{word}"
Context: "{}"

Return a JSON object of this exact shape:
{{
    "is_correct": false,
    "suggestions": ["correct spelling 1", "correct spelling 2"],
    "explanation": "why the spelling is wrong and how to use the word",
    "confidence": 0.95
}}

If the word is spelled correctly, return:
{{
    "is_correct": true,
    "suggestions": [],
    "explanation": "spelled correctly",
    "confidence": 1.0
}}

Return only the JSON, nothing else."#,
        context.unwrap_or("none"),
    )
}

fn improvement_prompt(text: &str) -> String {
    format!(
        r#"Analyze the following text and provide improvement suggestions.

Text: "{text}"

Return a JSON object of this exact shape:
{{
    "overall_assessment": "overall evaluation",
    "strengths": ["strength 1", "strength 2"],
    "areas_for_improvement": ["area 1", "area 2"],
    "suggestions": [
        {{"type": "vocabulary|grammar|style|structure", "original": "original text", "suggestion": "improved text", "explanation": "why"}}
    ],
    "level": "beginner|intermediate|advanced",
    "score": 0.85
}}

Return only the JSON, nothing else."#,
    )
}

#[async_trait]
impl TextClassifier for OpenAiChecker {
    #[instrument(skip(self, sentence, full_text), fields(model = %self.config.model))]
    async fn check_sentence(
        &self,
        sentence: &str,
        full_text: Option<&str>,
    ) -> Result<SentenceFeedback, CheckerError> {
        let reply = self
            .complete(CLASSIFIER_SYSTEM, &sentence_prompt(sentence, full_text), 0.1, 500)
            .await?;

        Ok(extract::parse_loose(&reply).unwrap_or_else(|| {
            tracing::warn!("classifier reply was not valid JSON, assuming correct");
            SentenceFeedback::neutral("could not interpret the checker response")
        }))
    }

    #[instrument(skip(self, word, context), fields(model = %self.config.model))]
    async fn check_word(
        &self,
        word: &str,
        context: Option<&str>,
    ) -> Result<WordCheck, CheckerError> {
        let reply = self
            .complete(CLASSIFIER_SYSTEM, &word_prompt(word, context), 0.1, 300)
            .await?;

        Ok(extract::parse_loose(&reply).unwrap_or_else(|| {
            tracing::warn!("word-check reply was not valid JSON, assuming correct");
            WordCheck::neutral("could not interpret the checker response")
        }))
    }
}

#[async_trait]
impl AdvisoryEngine for OpenAiChecker {
    #[instrument(skip(self, text), fields(model = %self.config.model))]
    async fn improve_text(&self, text: &str) -> Result<ImprovementReport, CheckerError> {
        let reply = self
            .complete(TUTOR_SYSTEM, &improvement_prompt(text), 0.3, 600)
            .await?;

        Ok(extract::parse_loose(&reply).unwrap_or_else(|| {
            tracing::warn!("advisory reply was not valid JSON, returning neutral report");
            ImprovementReport::neutral("could not analyze the text")
        }))
    }
}
