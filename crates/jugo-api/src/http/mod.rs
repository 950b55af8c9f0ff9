//! HTTP and WebSocket surface for Jugo.
//!
//! Axum REST API at `/api/v1/` with API key authentication and an envelope
//! response format, plus the `/ws` realtime endpoint.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
