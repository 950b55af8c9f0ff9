//! Generation provider abstraction.
//!
//! `LlmProvider` is the port implemented by the Anthropic and
//! OpenAI-compatible clients in jugo-infra. `BoxLlmProvider` erases the
//! concrete type so the dispatcher can hold one provider per tier, and
//! `retry` wraps calls with bounded backoff for transient failures.

pub mod box_provider;
pub mod provider;
pub mod retry;
