use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the actor system itself.
///
/// Message passing never returns errors; rejections travel as return codes
/// (see [`InboxResult`](crate::mailbox::InboxResult)) or as bounced
/// responses. What remains fallible is thread management.
#[derive(Error, Debug)]
pub enum SystemError {
    #[error("failed to start worker thread: {0}")]
    ThreadSetup(#[from] std::io::Error),
    #[error("actors still running after {0:?}")]
    AwaitTimeout(Duration),
    #[error("internal system error: {0}")]
    Other(#[from] anyhow::Error),
}
