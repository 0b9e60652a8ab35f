use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, LlmConfig};
use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

/// Registry of all available LLM providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: String,
    llm_config: LlmConfig,
}

impl ProviderRegistry {
    pub fn new(active: String) -> Self {
        Self {
            providers: HashMap::new(),
            llm_config: LlmConfig {
                active_provider: active.clone(),
                providers: HashMap::new(),
            },
            active,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get_active(&self) -> PilotResult<Arc<dyn LlmProvider>> {
        self.providers
            .get(&self.active)
            .cloned()
            .ok_or_else(|| PilotError::Config(format!("Active provider '{}' not found in registry", self.active)))
    }

    pub fn set_active(&mut self, name: String) -> PilotResult<()> {
        if self.providers.contains_key(&name) {
            self.active = name;
            Ok(())
        } else {
            Err(PilotError::Config(format!("Provider '{name}' not registered")))
        }
    }

    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Active provider plus the sampling settings from its config entry.
    pub fn active_call_config(&self) -> PilotResult<(Arc<dyn LlmProvider>, CallConfig)> {
        let provider = self.get_active()?;
        let cfg = match self.llm_config.providers.get(&self.active) {
            Some(entry) => CallConfig {
                model: entry.model.clone(),
                stream: entry.stream,
                temperature: entry.temperature,
                top_p: entry.top_p,
            },
            None => CallConfig {
                model: String::new(),
                stream: false,
                temperature: 0.1,
                top_p: 0.3,
            },
        };
        tracing::debug!(
            provider = %self.active,
            model = %cfg.model,
            stream = cfg.stream,
            temperature = cfg.temperature,
            top_p = cfg.top_p,
            "resolved call config"
        );
        Ok((provider, cfg))
    }

    /// Build a registry from the loaded app config.
    /// API keys are read from environment variables named `PHONEPILOT_<ID>_API_KEY`.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self {
            providers: HashMap::new(),
            active: config.llm.active_provider.clone(),
            llm_config: config.llm.clone(),
        };
        for (id, entry) in &config.llm.providers {
            let api_key = std::env::var(format!("PHONEPILOT_{}_API_KEY", id.to_uppercase()))
                .unwrap_or_else(|_| entry.api_key.clone().unwrap_or_default());
            let provider = OpenAiCompatibleProvider::new(
                id.clone(),
                entry.api_base.clone(),
                api_key,
                Duration::from_secs(entry.timeout_secs),
            );
            registry.register(Arc::new(provider));
        }
        registry
    }
}
