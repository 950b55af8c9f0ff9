//! Push channel for task progress.

use jugo_types::protocol::ServerMessage;
use jugo_types::work::UserId;

/// Best-effort delivery of a message to a caller's live session.
///
/// Implementations must not block and must not fail: a caller with no live
/// session simply misses the push and can poll instead.
pub trait TaskNotifier: Send + Sync {
    fn notify(&self, user_id: UserId, message: ServerMessage);
}
