pub mod gemini;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use gemini::GeminiProvider;
pub use types::*;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse>;
    async fn health(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// Provider Configuration
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Gemini,
    /// Offline echo provider, no network.
    Stub,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Unique provider ID, referenced as the `provider/` prefix of model names
    pub id: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Overrides the default endpoint
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    pub fn new(id: impl Into<String>, provider_type: ProviderType) -> Self {
        Self {
            id: id.into(),
            provider_type,
            api_key: None,
            base_url: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// True when a non-empty key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }
}

pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config.provider_type {
        ProviderType::Gemini => {
            let key = config
                .api_key
                .as_ref()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| anyhow!("gemini requires api_key"))?;
            match config.base_url.as_deref() {
                Some(base_url) => Arc::new(GeminiProvider::with_base_url(key.clone(), base_url)),
                None => Arc::new(GeminiProvider::new(key.clone())),
            }
        }
        ProviderType::Stub => Arc::new(StubProvider),
    };
    Ok(provider)
}

pub fn register_from_configs(
    registry: &mut ProviderRegistry,
    configs: &[ProviderConfig],
) -> Result<()> {
    for config in configs {
        let provider = create_provider(config)?;
        registry.register(&config.id, provider);
        tracing::info!("Registered provider: {} ({:?})", config.id, config.provider_type);
    }
    Ok(())
}

// ============================================================
// Provider Registry
// ============================================================

#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(id.into(), provider);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn LlmProvider>> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("provider not found: {id}"))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Echoes the start of the last user message. Used when no API key is set.
pub struct StubProvider;

const STUB_ECHO_CHARS: usize = 80;

#[async_trait]
impl LlmProvider for StubProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let user_text = request
            .messages
            .last()
            .map(|m| m.text())
            .unwrap_or_default();
        let excerpt: String = user_text.chars().take(STUB_ECHO_CHARS).collect();
        Ok(LlmResponse::from_text(format!(
            "[stub:{}] {}",
            request.model, excerpt
        )))
    }
}

/// Register a stub under every given id, for offline runs.
pub fn register_stub_providers<'a>(
    registry: &mut ProviderRegistry,
    ids: impl IntoIterator<Item = &'a str>,
) {
    for id in ids {
        registry.register(id, Arc::new(StubProvider));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_registry_get_registered_succeeds() {
        let mut registry = ProviderRegistry::new();
        registry.register("gemini", Arc::new(StubProvider));

        assert!(registry.get("gemini").is_ok());
        assert!(registry.contains("gemini"));
        assert_eq!(registry.list(), vec!["gemini"]);
    }

    #[test]
    fn provider_registry_get_unknown_fails() {
        let registry = ProviderRegistry::new();
        let err = registry.get("missing").err().unwrap();
        assert!(err.to_string().contains("provider not found: missing"));
    }

    #[tokio::test]
    async fn stub_provider_echoes_model_and_excerpt() {
        let provider = StubProvider;
        let long = "x".repeat(500);
        let req = LlmRequest::simple("gemini-2.5-flash-lite".into(), None, long);
        let resp = provider.chat(req).await.unwrap();
        assert!(resp.text.starts_with("[stub:gemini-2.5-flash-lite] "));
        assert_eq!(resp.text.matches('x').count(), STUB_ECHO_CHARS);
        assert_eq!(resp.stop_reason.as_deref(), Some("end_turn"));
    }

    #[tokio::test]
    async fn stub_provider_chat_empty_messages() {
        let req = LlmRequest {
            model: "m".into(),
            system: None,
            messages: vec![],
            options: GenerationOptions::default(),
        };
        let resp = StubProvider.chat(req).await.unwrap();
        assert_eq!(resp.text, "[stub:m] ");
        assert!(StubProvider.health().await.is_ok());
    }

    #[test]
    fn gemini_without_key_is_rejected() {
        let config = ProviderConfig::new("gemini", ProviderType::Gemini).with_api_key("  ");
        assert!(!config.has_api_key());
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("gemini requires api_key"));
    }

    #[test]
    fn register_from_configs_registers_each_id() {
        let configs = vec![
            ProviderConfig::new("gemini", ProviderType::Gemini).with_api_key("k"),
            ProviderConfig::new("offline", ProviderType::Stub),
        ];
        let mut registry = ProviderRegistry::new();
        register_from_configs(&mut registry, &configs).unwrap();
        assert!(registry.get("gemini").is_ok());
        assert!(registry.get("offline").is_ok());
    }

    #[test]
    fn provider_config_serialize_deserialize() {
        let config = ProviderConfig::new("gemini", ProviderType::Gemini)
            .with_api_key("test")
            .with_base_url("http://localhost:9000");

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"gemini\""));
        let parsed: ProviderConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, "gemini");
        assert_eq!(parsed.provider_type, ProviderType::Gemini);
        assert_eq!(parsed.api_key.as_deref(), Some("test"));
        assert_eq!(parsed.base_url.as_deref(), Some("http://localhost:9000"));
    }
}
