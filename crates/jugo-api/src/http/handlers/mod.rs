//! Route handlers.

pub mod ai;
pub mod health;
pub mod save;
pub mod work;
pub mod ws;
