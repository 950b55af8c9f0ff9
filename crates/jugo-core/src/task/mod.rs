//! Generation task pipeline.
//!
//! - [`dispatcher::TaskDispatcher`]: submission, bounded execution, cancel, lookup
//! - [`prompt::build_prompt`]: request to provider prompt
//! - [`notifier::TaskNotifier`]: where progress pushes go (the hub, in production)

pub mod dispatcher;
pub mod notifier;
pub mod prompt;
