use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Backend, LlmProviderClient, MODELS_TIMEOUT, ModelInfo, PROBE_TIMEOUT};

// ── Ollama REST API ──

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for Ollama's native REST API (`/api/tags`, `/api/generate`).
pub struct OllamaClient {
    base_url: String,
    http: Client,
}

impl OllamaClient {
    pub fn new(base_url: String, http: Client) -> Self {
        Self { base_url, http }
    }
}

#[async_trait]
impl LlmProviderClient for OllamaClient {
    fn backend(&self) -> Backend {
        Backend::Ollama
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.base_url);
        let res = self.http.get(&url).timeout(MODELS_TIMEOUT).send().await?;
        if !res.status().is_success() {
            return Err(anyhow!(
                "Ollama tag list failed ({}): {}",
                res.status(),
                res.text().await.unwrap_or_default()
            ));
        }
        let parsed: TagsResponse = res.json().await?;
        Ok(parsed
            .models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.clone(),
                name: m.name,
            })
            .collect())
    }

    async fn complete(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let req = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let res = self
            .http
            .post(&url)
            .timeout(PROBE_TIMEOUT)
            .json(&req)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(anyhow!(
                "Ollama generate failed ({}): {}",
                res.status(),
                res.text().await.unwrap_or_default()
            ));
        }
        let parsed: GenerateResponse = res.json().await?;
        Ok(parsed.response)
    }
}
