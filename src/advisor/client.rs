//! HTTP advisor backed by an OpenAI-compatible chat-completions API.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{AdvisorError, PincodeAdvisor, Result};
use crate::config::AdvisorConfig;

/// Advisor backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletionsAdvisor {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    timeout: Duration,
}

impl ChatCompletionsAdvisor {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            max_tokens,
            timeout,
        })
    }

    /// Build from configuration, reading the API key from the configured
    /// environment variable.
    ///
    /// Returns `Ok(None)` when the advisor is disabled or no key is set; the
    /// pipeline then keeps every pincode.
    pub fn from_config(config: &AdvisorConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }

        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => {
                log::warn!("{} not set; pincode advisor disabled", config.api_key_env);
                return Ok(None);
            }
        };

        let advisor = Self::new(
            config.endpoint.clone(),
            config.model.clone(),
            api_key,
            config.max_tokens,
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Some(advisor))
    }

    /// Like [`from_config`](Self::from_config) but a missing key is an error.
    pub fn require_from_config(config: &AdvisorConfig) -> Result<Self> {
        Self::from_config(config)?.ok_or_else(|| AdvisorError::MissingApiKey(config.api_key_env.clone()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl PincodeAdvisor for ChatCompletionsAdvisor {
    fn complete(&self, prompt: &str) -> Result<String> {
        let req = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: 0.0,
        };

        log::debug!("Advisor prompt length: {} chars", prompt.len());

        let response = self
            .http
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    AdvisorError::Timeout(self.timeout)
                } else {
                    AdvisorError::RequestFailed(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AdvisorError::ServerError {
                status: status.as_u16(),
                body,
            });
        }

        let res: ChatResponse = response.json()?;
        if let Some(usage) = &res.usage {
            log::debug!(
                "Advisor usage: prompt={} completion={} total={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }

        res.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(AdvisorError::EmptyResponse)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
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

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_disabled() {
        let config = AdvisorConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(ChatCompletionsAdvisor::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_from_config_without_key() {
        let config = AdvisorConfig {
            api_key_env: "ROUTE_CLUSTER_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };
        assert!(ChatCompletionsAdvisor::from_config(&config).unwrap().is_none());
        assert!(matches!(
            ChatCompletionsAdvisor::require_from_config(&config),
            Err(AdvisorError::MissingApiKey(_))
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let req = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            max_tokens: 512,
            temperature: 0.0,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hi");
        assert_eq!(value["max_tokens"], 512);
    }

    #[test]
    fn test_response_parsing_tolerates_missing_fields() {
        let body = r#"{"choices":[{"message":{"content":"[\"110001\"]"}}]}"#;
        let res: ChatResponse = serde_json::from_str(body).unwrap();
        assert!(res.usage.is_none());
        assert_eq!(
            res.choices[0].message.content.as_deref(),
            Some("[\"110001\"]")
        );
    }

    #[test]
    fn test_unreachable_endpoint_is_error() {
        let advisor = ChatCompletionsAdvisor::new(
            "http://127.0.0.1:1/v1",
            "gpt-4o-mini",
            "test-key",
            16,
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(advisor.complete("hello").is_err());
    }
}
