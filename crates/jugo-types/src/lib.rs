//! Shared domain types for Jugo.
//!
//! Works, chapters, generation tasks, the realtime wire protocol, provider
//! request/response shapes, configuration, and the error types shared by every
//! layer.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod generation;
pub mod llm;
pub mod protocol;
pub mod session;
pub mod task;
pub mod work;
