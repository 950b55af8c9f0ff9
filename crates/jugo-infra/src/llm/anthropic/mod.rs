//! Anthropic Messages API provider (the quality tier).

pub mod client;
pub mod types;

pub use client::AnthropicProvider;
