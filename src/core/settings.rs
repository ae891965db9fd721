use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Per-provider connection settings as edited from the dashboard forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    pub api_url: String,
    pub default_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

impl ProviderSettings {
    fn new(api_url: &str, default_model: &str, enabled: bool) -> Self {
        Self {
            api_url: api_url.to_string(),
            default_model: default_model.to_string(),
            api_key: None,
            enabled,
            parameters: None,
        }
    }
}

/// Broadcast hub configuration, adjustable via `/api/uplink/config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UplinkConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: crate::core::metrics::SAMPLE_INTERVAL_MS,
        }
    }
}

/// The whole settings document persisted at `config/settings.json`.
///
/// Every field carries a serde default so partial documents (and partial
/// POST bodies) fill in the rest from defaults instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_lm_studio")]
    pub lm_studio: ProviderSettings,
    #[serde(default = "default_ollama")]
    pub ollama: ProviderSettings,
    #[serde(default = "default_project_manager")]
    pub project_manager: ProviderSettings,
    #[serde(default = "default_agora")]
    pub agora: ProviderSettings,
    #[serde(default)]
    pub uplink: UplinkConfig,
}

fn default_lm_studio() -> ProviderSettings {
    ProviderSettings::new("http://localhost:1234", "qwen2.5-7b-instruct", true)
}

fn default_ollama() -> ProviderSettings {
    ProviderSettings::new("http://localhost:11434", "llama3", true)
}

fn default_project_manager() -> ProviderSettings {
    ProviderSettings::new("http://localhost:1234", "qwen2.5-7b-instruct", true)
}

fn default_agora() -> ProviderSettings {
    ProviderSettings::new("", "", false)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lm_studio: default_lm_studio(),
            ollama: default_ollama(),
            project_manager: default_project_manager(),
            agora: default_agora(),
            uplink: UplinkConfig::default(),
        }
    }
}

impl Settings {
    pub fn provider(&self, provider: crate::core::llm::Provider) -> &ProviderSettings {
        use crate::core::llm::Provider::*;
        match provider {
            LmStudio => &self.lm_studio,
            Ollama => &self.ollama,
            ProjectManager => &self.project_manager,
            Agora => &self.agora,
        }
    }
}

/// File-backed settings store. Single admin, single process: a
/// `tokio::sync::RwLock` around this struct is the only write coordination.
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Load from disk; a missing or unreadable file yields defaults.
    pub fn load(path: PathBuf) -> Self {
        let settings = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Settings>(&raw) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Settings file {} is invalid ({}), using defaults", path.display(), e);
                    Settings::default()
                }
            },
            Err(_) => Settings::default(),
        };
        Self { path, settings }
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn replace(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// Persist the current document. Permission failures get a dedicated
    /// message so the dashboard can tell the admin what to fix.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| describe_io_error(parent, e, "create settings directory"))?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(&self.path, json)
            .map_err(|e| describe_io_error(&self.path, e, "write settings file"))?;
        info!("Settings saved to {}", self.path.display());
        Ok(())
    }

    /// Remove the file and reset to defaults ("clear settings").
    pub fn clear(&mut self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(describe_io_error(&self.path, e, "remove settings file")),
        }
        self.settings = Settings::default();
        Ok(())
    }
}

fn describe_io_error(path: &Path, e: std::io::Error, action: &str) -> anyhow::Error {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        anyhow!(
            "Permission denied: cannot {} at {}. Check file ownership and permissions.",
            action,
            path.display()
        )
    } else {
        anyhow!("Failed to {} at {}: {}", action, path.display(), e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path().join("settings.json"));
        assert_eq!(store.get().lm_studio.api_url, "http://localhost:1234");
        assert_eq!(store.get().ollama.api_url, "http://localhost:11434");
        assert!(store.get().uplink.enabled);
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("settings.json");

        let mut store = SettingsStore::load(path.clone());
        let mut edited = store.get().clone();
        edited.ollama.default_model = "mistral".to_string();
        edited.lm_studio.enabled = false;
        store.replace(edited.clone());
        store.save().unwrap();

        let reloaded = SettingsStore::load(path);
        assert_eq!(reloaded.get(), &edited);
    }

    #[test]
    fn partial_document_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"ollama":{"apiUrl":"http://box:11434","defaultModel":"phi3","enabled":true}}"#,
        )
        .unwrap();

        let store = SettingsStore::load(path);
        assert_eq!(store.get().ollama.api_url, "http://box:11434");
        assert_eq!(store.get().lm_studio.api_url, "http://localhost:1234");
    }

    #[test]
    fn clear_removes_file_and_resets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = SettingsStore::load(path.clone());
        let mut edited = store.get().clone();
        edited.ollama.default_model = "gemma2".to_string();
        store.replace(edited);
        store.save().unwrap();
        assert!(path.exists());

        store.clear().unwrap();
        assert!(!path.exists());
        assert_eq!(store.get(), &Settings::default());

        // Clearing twice is a no-op, not an error.
        store.clear().unwrap();
    }

    #[test]
    fn invalid_json_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json {").unwrap();
        let store = SettingsStore::load(path);
        assert_eq!(store.get(), &Settings::default());
    }
}
