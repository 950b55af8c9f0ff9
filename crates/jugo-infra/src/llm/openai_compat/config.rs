//! Configuration for OpenAI-compatible providers.

use jugo_types::llm::ProviderCapabilities;

/// Configuration used to construct an [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Human-readable provider name (e.g., "deepseek").
    pub provider_name: String,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub capabilities: ProviderCapabilities,
}

/// DeepSeek default configuration: 64K context, 8K output.
pub fn deepseek_defaults(api_key: &str, model: &str, base_url: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "deepseek".into(),
        base_url: base_url.trim_end_matches('/').into(),
        api_key: api_key.into(),
        model: model.into(),
        capabilities: ProviderCapabilities {
            max_context_tokens: 64_000,
            max_output_tokens: 8_192,
        },
    }
}
