// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Ollama API client for local AI inference

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::EngineConfig;
use crate::{OrganizerError, Result};

/// Anything that turns a prompt into free-form text.
///
/// Implementations enforce their own timeout and never retry; a connection
/// failure or timeout is reported as `InferenceUnavailable`.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Model identifier, for logs and reports
    fn model(&self) -> &str;
}

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

impl OllamaClient {
    /// Create a client for the endpoint and model in `config`
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout().min(Duration::from_secs(5)))
            .build()
            .map_err(|e| OrganizerError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: normalize_url(&config.url),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if Ollama is reachable
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| unavailable(&self.base_url, e))?;

        if !response.status().is_success() {
            return Err(OrganizerError::InferenceUnavailable(format!(
                "Ollama returned status {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// List installed models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(&self.base_url, e))?;

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Whether the configured model is installed
    pub async fn model_available(&self) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(model_matches(&models, &self.model))
    }
}

#[async_trait]
impl InferenceBackend for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        debug!("Sending request to Ollama: model={}", self.model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| unavailable(&self.base_url, e))?;

        if !response.status().is_success() {
            return Err(OrganizerError::InferenceUnavailable(format!(
                "Ollama returned status {}",
                response.status()
            )));
        }

        let result: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                unavailable(&self.base_url, e)
            } else {
                OrganizerError::MalformedInferenceResponse(e.to_string())
            }
        })?;
        Ok(result.response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn unavailable(base_url: &str, e: reqwest::Error) -> OrganizerError {
    let what = if e.is_timeout() { "Timed out talking to" } else { "Cannot connect to" };
    OrganizerError::InferenceUnavailable(format!("{} Ollama at {}: {}", what, base_url, e))
}

/// Strip trailing slashes and endpoint paths from a configured URL
fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/')
        .replace("/api/generate", "")
        .replace("/api/chat", "")
}

fn model_matches(installed: &[String], model: &str) -> bool {
    installed
        .iter()
        .any(|m| m == model || m.starts_with(&format!("{}:", model)) || *m == format!("{}:latest", model))
}
