pub mod lmstudio;
pub mod ollama;
pub mod service;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout for model-list requests; listing is cheap and should fail fast.
pub const MODELS_TIMEOUT: Duration = Duration::from_secs(5);
/// Timeout for a single completion probe; inference can be slow on CPU.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Providers the dashboard knows about. `ProjectManager` is a routing alias
/// for whichever local backend hosts the persistent assistant; `Agora` is an
/// aggregator with no upstream integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    LmStudio,
    Ollama,
    ProjectManager,
    Agora,
}

impl Provider {
    /// Accepts the spellings the dashboard sends: `lmStudio`, `lm_studio`,
    /// `projectManager`, etc.
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "lmstudio" => Some(Self::LmStudio),
            "ollama" => Some(Self::Ollama),
            "projectmanager" => Some(Self::ProjectManager),
            "agora" => Some(Self::Agora),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LmStudio => "lmStudio",
            Self::Ollama => "ollama",
            Self::ProjectManager => "projectManager",
            Self::Agora => "agora",
        }
    }
}

/// The two concrete local APIs a request can land on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    LmStudio,
    Ollama,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

/// Uniform surface over the heterogeneous provider REST APIs.
#[async_trait]
pub trait LlmProviderClient: Send + Sync {
    fn backend(&self) -> Backend;

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>>;

    /// One minimal completion request, used to confirm a model answers.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String>;
}

/// Prefix `http://` when no scheme is present and drop trailing slashes,
/// so `localhost:1234/` becomes `http://localhost:1234`.
pub fn normalize_api_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

/// Pick the backend implied by the provider, an explicit `serverType`, or
/// the port number (11434 is Ollama's default, 1234 LM Studio's).
pub fn resolve_backend(provider: Provider, api_url: &str, server_type: Option<&str>) -> Backend {
    match provider {
        Provider::LmStudio => Backend::LmStudio,
        Provider::Ollama => Backend::Ollama,
        Provider::ProjectManager | Provider::Agora => {
            if let Some(kind) = server_type.and_then(Provider::parse) {
                match kind {
                    Provider::Ollama => return Backend::Ollama,
                    Provider::LmStudio => return Backend::LmStudio,
                    _ => {}
                }
            }
            if api_url.contains(":11434") {
                Backend::Ollama
            } else {
                Backend::LmStudio
            }
        }
    }
}

pub fn client_for(
    backend: Backend,
    base_url: String,
    http: reqwest::Client,
) -> Box<dyn LlmProviderClient> {
    match backend {
        Backend::LmStudio => Box::new(lmstudio::LmStudioClient::new(base_url, http)),
        Backend::Ollama => Box::new(ollama::OllamaClient::new(base_url, http)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_dashboard_spellings() {
        assert_eq!(Provider::parse("lmStudio"), Some(Provider::LmStudio));
        assert_eq!(Provider::parse("lm_studio"), Some(Provider::LmStudio));
        assert_eq!(Provider::parse("OLLAMA"), Some(Provider::Ollama));
        assert_eq!(
            Provider::parse("projectManager"),
            Some(Provider::ProjectManager)
        );
        assert_eq!(Provider::parse("agora"), Some(Provider::Agora));
        assert_eq!(Provider::parse("openai"), None);
    }

    #[test]
    fn normalize_prefixes_missing_scheme() {
        assert_eq!(normalize_api_url("localhost:1234"), "http://localhost:1234");
        assert_eq!(
            normalize_api_url("http://localhost:1234/"),
            "http://localhost:1234"
        );
        assert_eq!(normalize_api_url("https://box:8443"), "https://box:8443");
        assert_eq!(normalize_api_url(" 10.0.0.5:11434 "), "http://10.0.0.5:11434");
    }

    #[test]
    fn project_manager_routes_by_port() {
        assert_eq!(
            resolve_backend(Provider::ProjectManager, "http://localhost:11434", None),
            Backend::Ollama
        );
        assert_eq!(
            resolve_backend(Provider::ProjectManager, "http://localhost:1234", None),
            Backend::LmStudio
        );
    }

    #[test]
    fn explicit_server_type_wins_over_port() {
        assert_eq!(
            resolve_backend(
                Provider::ProjectManager,
                "http://localhost:9999",
                Some("ollama")
            ),
            Backend::Ollama
        );
        assert_eq!(
            resolve_backend(
                Provider::ProjectManager,
                "http://localhost:11434",
                Some("lmStudio")
            ),
            Backend::LmStudio
        );
    }
}
