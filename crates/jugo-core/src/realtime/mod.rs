//! Realtime session registry.
//!
//! - [`session::SessionHandle`]: one live connection and its bounded outbound queue
//! - [`hub::Hub`]: membership, inbound dispatch, and point-to-point delivery
//! - [`router::MessageRouter`]: what happens to each decoded inbound message
//! - [`connection::run_session`]: the per-connection read and write loops
//!
//! The transport is abstracted as a stream and a sink of [`frame::Frame`]s so
//! the loops can run over axum's WebSocket or an in-memory pair in tests.

pub mod connection;
pub mod frame;
pub mod hub;
pub mod router;
pub mod session;
