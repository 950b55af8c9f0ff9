//! Infrastructure layer for Jugo.
//!
//! Contains implementations of the ports defined in `jugo-core`: SQLite
//! storage for works, chapters, tasks and API keys, the two generation
//! provider clients, and the `config.toml` loader.

pub mod config;
pub mod crypto;
pub mod llm;
pub mod sqlite;
