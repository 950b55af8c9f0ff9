//! Configuration types for Jugo.
//!
//! `AppConfig` is the top-level `config.toml` in the data directory. Every
//! section and field has a default so a missing or partial file still yields
//! a runnable server.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Liveness and buffering limits for realtime sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// How long to wait for any inbound frame (pongs included) before
    /// declaring the peer dead.
    pub pong_wait_secs: u64,
    /// Interval between server pings. Must be shorter than `pong_wait_secs`.
    pub ping_period_secs: u64,
    /// Deadline for a single outbound write.
    pub write_wait_secs: u64,
    /// Largest inbound frame accepted, in bytes.
    pub max_message_bytes: usize,
    /// Capacity of each session's outbound queue.
    pub outbound_queue: usize,
    /// Capacity of each of the hub's control queues.
    pub hub_queue: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            pong_wait_secs: 60,
            ping_period_secs: 54,
            write_wait_secs: 10,
            max_message_bytes: 512 * 1024,
            outbound_queue: 256,
            hub_queue: 256,
        }
    }
}

impl RealtimeConfig {
    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs.max(1))
    }

    /// Ping interval, forced below the pong wait (nine tenths of it) when
    /// configured too long.
    pub fn ping_period(&self) -> Duration {
        let pong_wait = self.pong_wait();
        let configured = Duration::from_secs(self.ping_period_secs);
        if configured.is_zero() || configured >= pong_wait {
            pong_wait * 9 / 10
        } else {
            configured
        }
    }

    pub fn write_wait(&self) -> Duration {
        Duration::from_secs(self.write_wait_secs.max(1))
    }
}

/// Worker pool and retry settings for generation tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Jobs allowed to call a provider at the same time.
    pub max_concurrent: usize,
    /// Running plus waiting jobs before submissions are rejected.
    pub max_queued: usize,
    /// Extra attempts after a transient provider failure.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            max_queued: 64,
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Anthropic Messages API. Key from `ANTHROPIC_API_KEY`.
    pub quality: ProviderSettings,
    /// DeepSeek (OpenAI-compatible) API. Key from `DEEPSEEK_API_KEY`.
    pub economy: ProviderSettings,
    /// HTTP timeout for a single provider call.
    pub request_timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            quality: ProviderSettings {
                model: "claude-sonnet-4-20250514".to_string(),
                base_url: "https://api.anthropic.com".to_string(),
            },
            economy: ProviderSettings {
                model: "deepseek-chat".to_string(),
                base_url: "https://api.deepseek.com/v1".to_string(),
            },
            request_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub model: String,
    pub base_url: String,
}
