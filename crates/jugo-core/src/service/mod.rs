//! Domain services built on the repository ports.

pub mod save;
pub mod text;
pub mod work;
