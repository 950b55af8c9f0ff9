//! Generation provider implementations.
//!
//! Concrete [`LlmProvider`](jugo_core::llm::provider::LlmProvider)s for the
//! two tiers, plus [`build_providers`] which assembles them from config.

pub mod anthropic;
pub mod openai_compat;

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use jugo_core::llm::box_provider::BoxLlmProvider;
use jugo_core::task::dispatcher::ProviderSet;
use jugo_types::config::ProvidersConfig;
use jugo_types::llm::LlmError;

use self::anthropic::AnthropicProvider;
use self::openai_compat::OpenAiCompatibleProvider;

pub const ANTHROPIC_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const DEEPSEEK_KEY_ENV: &str = "DEEPSEEK_API_KEY";

/// Provider API keys. Never logged.
#[derive(Default)]
pub struct ProviderKeys {
    pub anthropic: Option<SecretString>,
    pub deepseek: Option<SecretString>,
}

impl ProviderKeys {
    /// Read keys from `ANTHROPIC_API_KEY` and `DEEPSEEK_API_KEY`. Blank
    /// values count as missing.
    pub fn from_env() -> Self {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from)
        };
        Self {
            anthropic: read(ANTHROPIC_KEY_ENV),
            deepseek: read(DEEPSEEK_KEY_ENV),
        }
    }
}

/// Build both provider tiers.
///
/// A missing key is logged and replaced by an empty one: the server still
/// starts and tasks routed to that tier fail with an authentication error.
pub fn build_providers(
    config: &ProvidersConfig,
    keys: ProviderKeys,
) -> Result<ProviderSet, LlmError> {
    let timeout = Duration::from_secs(config.request_timeout_secs.max(1));

    let anthropic_key = keys.anthropic.unwrap_or_else(|| {
        tracing::warn!("{ANTHROPIC_KEY_ENV} is not set; quality tier tasks will fail");
        SecretString::from(String::new())
    });
    let quality = AnthropicProvider::new(
        anthropic_key,
        config.quality.model.clone(),
        config.quality.base_url.clone(),
        timeout,
    )?;

    let deepseek_key = match keys.deepseek {
        Some(key) => secrecy::ExposeSecret::expose_secret(&key).to_string(),
        None => {
            tracing::warn!("{DEEPSEEK_KEY_ENV} is not set; economy tier tasks will fail");
            String::new()
        }
    };
    let economy = OpenAiCompatibleProvider::deepseek(
        &deepseek_key,
        &config.economy.model,
        &config.economy.base_url,
        timeout,
    );

    tracing::info!(
        quality = %config.quality.model,
        economy = %config.economy.model,
        "generation providers configured"
    );

    Ok(ProviderSet {
        quality: Arc::new(BoxLlmProvider::new(quality)),
        economy: Arc::new(BoxLlmProvider::new(economy)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_providers_routes_tiers() {
        let keys = ProviderKeys {
            anthropic: Some(SecretString::from("sk-ant".to_string())),
            deepseek: Some(SecretString::from("sk-ds".to_string())),
        };
        let set = build_providers(&ProvidersConfig::default(), keys).unwrap();
        assert_eq!(set.quality.name(), "anthropic");
        assert_eq!(set.economy.name(), "deepseek");
    }

    #[test]
    fn test_missing_keys_still_build() {
        let set = build_providers(&ProvidersConfig::default(), ProviderKeys::default()).unwrap();
        assert_eq!(set.quality.capabilities().max_context_tokens, 200_000);
        assert_eq!(set.economy.capabilities().max_context_tokens, 64_000);
    }
}
