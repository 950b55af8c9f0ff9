//! Query parameter extractors.

use serde::Deserialize;

use jugo_core::repository::Page;

/// Offset pagination for list endpoints (`/ai/tasks`, `/works`).
#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(self.limit, self.offset)
    }
}

/// Query parameters for the `/ws` upgrade.
#[derive(Debug, Deserialize, Default)]
pub struct ConnectQuery {
    /// API key; browsers cannot set headers on a WebSocket handshake.
    pub token: Option<String>,
}
