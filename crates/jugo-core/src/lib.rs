//! Business logic and repository trait definitions for Jugo.
//!
//! This crate defines the "ports" (repository and credential traits) that the
//! infrastructure layer implements, plus the two runtime engines built on
//! them: the realtime session registry and the generation task dispatcher.
//! It depends only on `jugo-types` -- never on `jugo-infra` or any database
//! or HTTP crate.

pub mod llm;
pub mod realtime;
pub mod repository;
pub mod service;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;
