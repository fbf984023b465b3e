// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! LLM client abstraction for the judge model

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const SYSTEM_PROMPT: &str = "You are an expert evaluator. Respond only with valid JSON.";

/// Trait for LLM clients used as judges
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Send a prompt and get a JSON response
    async fn evaluate(&self, prompt: String) -> Result<LLMResponse, LLMError>;

    /// Evaluate and also return token log probabilities for the `top_k`
    /// most likely tokens at each position
    async fn evaluate_with_logprobs(
        &self,
        prompt: String,
        _top_k: usize,
    ) -> Result<LLMResponse, LLMError> {
        // Default implementation: fall back to regular evaluate without logprobs
        self.evaluate(prompt).await
    }

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Response from LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub model: String,
    #[serde(default)]
    pub logprobs: Option<Vec<TokenLogprob>>,
}

impl LLMResponse {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            logprobs: None,
        }
    }

    /// Parse response as JSON
    pub fn as_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.content)
    }
}

/// Token-level log probability information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLogprob {
    pub token: String,
    pub logprob: f64,
    pub top_logprobs: Vec<TopLogprob>,
}

/// Alternative token with its log probability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopLogprob {
    pub token: String,
    pub logprob: f64,
}

/// Errors from LLM clients
#[derive(Debug, Error)]
pub enum LLMError {
    #[error("API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LLMError {
    /// Transient failures worth retrying: rate limits, timeouts, transport
    /// errors and server-side API errors
    pub fn is_retryable(&self) -> bool {
        match self {
            LLMError::RateLimitExceeded | LLMError::Timeout | LLMError::Http(_) => true,
            LLMError::ApiError { status, .. } => *status >= 500,
            LLMError::InvalidResponse(_) | LLMError::Json(_) => false,
        }
    }
}

impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LLMError::Timeout
        } else {
            LLMError::Http(err)
        }
    }
}

/// OpenAI chat completions client
pub struct OpenAIClient {
    api_key: String,
    model: String,
    base_url: String,
    timeout: Option<Duration>,
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn chat_request(&self, prompt: String) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": SYSTEM_PROMPT
                },
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "temperature": 0.0,
            "response_format": { "type": "json_object" }
        })
    }

    async fn send(&self, request: &serde_json::Value) -> Result<LLMResponse, LLMError> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(LLMError::RateLimitExceeded);
            }
            return Err(LLMError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let response_data: serde_json::Value = serde_json::from_str(&response.text().await?)?;

        let content = response_data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(LLMError::InvalidResponse("Missing content".to_string()))?
            .to_string();

        Ok(LLMResponse {
            content,
            model: self.model.clone(),
            logprobs: parse_logprobs(&response_data),
        })
    }
}

/// Extract `choices[0].logprobs.content` if the provider returned it
fn parse_logprobs(response_data: &serde_json::Value) -> Option<Vec<TokenLogprob>> {
    let logprobs_data = response_data["choices"][0]
        .get("logprobs")
        .and_then(|lp| lp.get("content"))
        .and_then(|c| c.as_array())?;

    let mut token_logprobs = Vec::new();
    for token_data in logprobs_data {
        if let (Some(token), Some(logprob)) =
            (token_data["token"].as_str(), token_data["logprob"].as_f64())
        {
            let top_logprobs = token_data["top_logprobs"]
                .as_array()
                .map(|top_array| {
                    top_array
                        .iter()
                        .filter_map(|top_item| {
                            Some(TopLogprob {
                                token: top_item["token"].as_str()?.to_string(),
                                logprob: top_item["logprob"].as_f64()?,
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();

            token_logprobs.push(TokenLogprob {
                token: token.to_string(),
                logprob,
                top_logprobs,
            });
        }
    }
    Some(token_logprobs)
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn evaluate(&self, prompt: String) -> Result<LLMResponse, LLMError> {
        let request = self.chat_request(prompt);
        tracing::debug!("Judge request to {} ({})", self.base_url, self.model);
        self.send(&request).await
    }

    async fn evaluate_with_logprobs(
        &self,
        prompt: String,
        top_k: usize,
    ) -> Result<LLMResponse, LLMError> {
        let mut request = self.chat_request(prompt);
        request["logprobs"] = serde_json::Value::Bool(true);
        request["top_logprobs"] = serde_json::json!(top_k.min(20)); // OpenAI allows max 20
        tracing::debug!(
            "Judge request with logprobs to {} ({})",
            self.base_url,
            self.model
        );
        self.send(&request).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion_body(content: &str) -> String {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }],
            "usage": { "prompt_tokens": 120, "completion_tokens": 30, "total_tokens": 150 }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_openai_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body(r#"{"score": 8, "reason": "good"}"#))
            .create_async()
            .await;

        let client = OpenAIClient::new("test-key".to_string(), "gpt-4o".to_string())
            .with_base_url(server.url());
        let response = client.evaluate("prompt".to_string()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.as_json().unwrap()["score"], 8);
        assert_eq!(response.model, "gpt-4o");
        assert!(response.logprobs.is_none());
    }

    #[tokio::test]
    async fn test_openai_logprobs() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "choices": [{
                "message": { "content": "{\"score\": 7}" },
                "logprobs": { "content": [
                    { "token": "7", "logprob": -0.1, "top_logprobs": [
                        { "token": "7", "logprob": -0.1 },
                        { "token": "8", "logprob": -2.5 }
                    ]}
                ]}
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        });
        server
            .mock("POST", "/chat/completions")
            .match_body(mockito::Matcher::PartialJson(
                serde_json::json!({ "logprobs": true, "top_logprobs": 20 }),
            ))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = OpenAIClient::new("k".to_string(), "gpt-4o".to_string())
            .with_base_url(server.url());
        let response = client
            .evaluate_with_logprobs("prompt".to_string(), 25)
            .await
            .unwrap();

        let logprobs = response.logprobs.unwrap();
        assert_eq!(logprobs.len(), 1);
        assert_eq!(logprobs[0].top_logprobs.len(), 2);
        assert_eq!(logprobs[0].top_logprobs[1].token, "8");
    }

    #[tokio::test]
    async fn test_openai_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let client = OpenAIClient::new("k".to_string(), "gpt-4o".to_string())
            .with_base_url(server.url());
        let err = client.evaluate("prompt".to_string()).await.unwrap_err();

        assert!(matches!(err, LLMError::RateLimitExceeded));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_openai_api_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("invalid api key")
            .create_async()
            .await;

        let client = OpenAIClient::new("bad".to_string(), "gpt-4o".to_string())
            .with_base_url(format!("{}/", server.url()));
        let err = client.evaluate("prompt".to_string()).await.unwrap_err();

        match &err {
            LLMError::ApiError { status, body } => {
                assert_eq!(*status, 401);
                assert_eq!(body, "invalid api key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_openai_missing_content() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let client = OpenAIClient::new("k".to_string(), "gpt-4o".to_string())
            .with_base_url(server.url());
        let err = client.evaluate("prompt".to_string()).await.unwrap_err();

        assert!(matches!(err, LLMError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_openai_server_error_is_retryable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let client = OpenAIClient::new("k".to_string(), "gpt-4o".to_string())
            .with_base_url(server.url());
        let err = client.evaluate("prompt".to_string()).await.unwrap_err();

        assert!(matches!(err, LLMError::ApiError { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_openai_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let client = OpenAIClient::new("k".to_string(), "gpt-4o".to_string())
            .with_base_url(server.url());
        let err = client.evaluate("prompt".to_string()).await.unwrap_err();

        assert!(matches!(err, LLMError::Json(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_server_errors_are_retryable() {
        let err = LLMError::ApiError {
            status: 503,
            body: "overloaded".to_string(),
        };
        assert!(err.is_retryable());
        assert!(!LLMError::InvalidResponse("x".to_string()).is_retryable());
    }
}
