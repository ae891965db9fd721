use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{
    ModelInfo, Provider, client_for, normalize_api_url, resolve_backend,
};

/// Model lists are cached per `provider:apiUrl` for five minutes.
pub const MODEL_CACHE_TTL: Duration = Duration::from_secs(300);

const PROBE_PROMPT: &str = "Reply with the single word: ready";

/// Models known to answer well per provider. The check is deliberately
/// permissive: unknown-but-well-formed names pass with a warning so testing
/// new models never requires a code change.
const LM_STUDIO_KNOWN: &[&str] = &[
    "qwen2.5-7b-instruct",
    "qwen2.5-coder",
    "llama-3.1-8b-instruct",
    "mistral-7b-instruct",
    "phi-3-mini-4k-instruct",
    "gemma-2-9b-it",
];

const OLLAMA_KNOWN: &[&str] = &[
    "llama3",
    "llama3.1",
    "mistral",
    "phi3",
    "qwen2.5",
    "gemma2",
    "deepseek-coder",
];

/// Static catalog for the Agora aggregator; its upstream protocol is
/// unspecified, so no live calls are made on its behalf.
const AGORA_CATALOG: &[&str] = &["gpt-4o", "claude-3-7-sonnet", "gemini-2.0-flash"];

struct CachedModels {
    models: Vec<ModelInfo>,
    fetched_at: Instant,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelList {
    pub models: Vec<ModelInfo>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTest {
    pub success: bool,
    pub connection_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_response: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ModelInfo>,
}

impl ConnectionTest {
    fn unreachable(error: String) -> Self {
        Self {
            success: false,
            connection_ok: false,
            error: Some(error),
            warning: None,
            test_response: None,
            models: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub is_valid: bool,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Uniform fetch/test/validate surface over the provider clients, with a
/// process-local TTL cache for model lists.
pub struct ModelService {
    http: reqwest::Client,
    cache: Mutex<HashMap<String, CachedModels>>,
}

impl ModelService {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the model list for a provider, serving cache entries younger
    /// than [`MODEL_CACHE_TTL`] without touching the network.
    ///
    /// `projectManager` is a best-effort alias: fetch errors degrade to an
    /// empty list plus a warning instead of failing the request.
    pub async fn fetch_models(
        &self,
        provider: Provider,
        api_url: &str,
        server_type: Option<&str>,
    ) -> Result<ModelList> {
        if provider == Provider::Agora {
            return Ok(ModelList {
                models: agora_catalog(),
                cached: false,
                warning: Some(
                    "Agora aggregation is not connected; returning catalog entries".to_string(),
                ),
            });
        }

        let base_url = normalize_api_url(api_url);
        let key = format!("{}:{}", provider.as_str(), base_url);

        {
            let cache = self.cache.lock().await;
            if let Some(entry) = cache.get(&key)
                && entry.fetched_at.elapsed() < MODEL_CACHE_TTL
            {
                return Ok(ModelList {
                    models: entry.models.clone(),
                    cached: true,
                    warning: None,
                });
            }
        }

        let backend = resolve_backend(provider, &base_url, server_type);
        let client = client_for(backend, base_url.clone(), self.http.clone());

        match client.fetch_models().await {
            Ok(models) => {
                info!(
                    "Fetched {} models from {} ({})",
                    models.len(),
                    base_url,
                    provider.as_str()
                );
                let mut cache = self.cache.lock().await;
                cache.insert(
                    key,
                    CachedModels {
                        models: models.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(ModelList {
                    models,
                    cached: false,
                    warning: None,
                })
            }
            Err(e) if provider == Provider::ProjectManager => {
                warn!("Project Manager model fetch failed, degrading: {}", e);
                Ok(ModelList {
                    models: Vec::new(),
                    cached: false,
                    warning: Some(format!("Model fetch failed: {}", e)),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Probe a provider: list models, optionally check the named model is
    /// present, optionally confirm it answers a minimal completion.
    /// Never returns an error; every failure mode is a structured result.
    pub async fn test_connection(
        &self,
        provider: Provider,
        api_url: &str,
        model: Option<&str>,
        server_type: Option<&str>,
    ) -> ConnectionTest {
        if provider == Provider::Agora {
            return ConnectionTest::unreachable(
                "Agora upstream is not configured; nothing to test".to_string(),
            );
        }

        let base_url = normalize_api_url(api_url);
        let backend = resolve_backend(provider, &base_url, server_type);
        let client = client_for(backend, base_url.clone(), self.http.clone());

        // Bypass the cache: a connection test must hit the live endpoint.
        let models = match client.fetch_models().await {
            Ok(models) => models,
            Err(e) => return ConnectionTest::unreachable(e.to_string()),
        };

        {
            let mut cache = self.cache.lock().await;
            cache.insert(
                format!("{}:{}", provider.as_str(), base_url),
                CachedModels {
                    models: models.clone(),
                    fetched_at: Instant::now(),
                },
            );
        }

        let Some(model) = model else {
            return ConnectionTest {
                success: true,
                connection_ok: true,
                error: None,
                warning: None,
                test_response: None,
                models,
            };
        };

        let listed = models
            .iter()
            .any(|m| m.id.eq_ignore_ascii_case(model) || m.name.eq_ignore_ascii_case(model));
        if !listed {
            return ConnectionTest {
                success: false,
                connection_ok: true,
                error: Some(format!(
                    "Model '{}' is not available on {}",
                    model, base_url
                )),
                warning: None,
                test_response: None,
                models,
            };
        }

        match client.complete(model, PROBE_PROMPT).await {
            Ok(response) => {
                let mut response = response.trim().to_string();
                response.truncate(200);
                ConnectionTest {
                    success: true,
                    connection_ok: true,
                    error: None,
                    warning: None,
                    test_response: Some(response),
                    models,
                }
            }
            // The model list already proved connectivity; a probe failure
            // (model still loading, tight VRAM) downgrades to a warning.
            Err(e) => ConnectionTest {
                success: true,
                connection_ok: true,
                error: None,
                warning: Some(format!("Model is listed but the completion probe failed: {}", e)),
                test_response: None,
                models,
            },
        }
    }

    /// Permissive allow-list validation: only blank names are rejected.
    pub fn validate_model(&self, model: &str, provider: Provider) -> Validation {
        let trimmed = model.trim();
        if trimmed.is_empty() {
            return Validation {
                is_valid: false,
                provider: provider.as_str().to_string(),
                warning: Some("Model name is empty".to_string()),
            };
        }

        let known: Vec<&str> = match provider {
            Provider::LmStudio => LM_STUDIO_KNOWN.to_vec(),
            Provider::Ollama => OLLAMA_KNOWN.to_vec(),
            Provider::ProjectManager => LM_STUDIO_KNOWN
                .iter()
                .chain(OLLAMA_KNOWN.iter())
                .copied()
                .collect(),
            Provider::Agora => AGORA_CATALOG.to_vec(),
        };

        let lowered = trimmed.to_lowercase();
        let recognized = known
            .iter()
            .any(|k| lowered.contains(k) || k.contains(lowered.as_str()));

        if recognized {
            Validation {
                is_valid: true,
                provider: provider.as_str().to_string(),
                warning: None,
            }
        } else {
            Validation {
                is_valid: true,
                provider: provider.as_str().to_string(),
                warning: Some(format!(
                    "'{}' is not a recognized {} model; it will be used as-is",
                    trimmed,
                    provider.as_str()
                )),
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn cached_keys(&self) -> Vec<String> {
        self.cache.lock().await.keys().cloned().collect()
    }
}

fn agora_catalog() -> Vec<ModelInfo> {
    AGORA_CATALOG
        .iter()
        .map(|id| ModelInfo {
            id: id.to_string(),
            name: id.to_string(),
        })
        .collect()
}
