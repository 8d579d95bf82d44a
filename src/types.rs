//! Common type definitions shared across the runtime.

use std::fmt;

/// Unique identifier for an actor within one [`ActorSystem`](crate::system::ActorSystem).
///
/// Ids are allocated from a system-wide monotonic counter and are never
/// reused for the lifetime of the system.
pub type ActorId = u64;

/// Reason attached to an actor's termination.
///
/// Carried by [`ExitMsg`](crate::message::ExitMsg) to request a shutdown and
/// by [`DownMsg`](crate::message::DownMsg) to report one to monitors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExitReason {
    /// Clean shutdown requested via an exit message.
    Normal,
    /// Forced shutdown that skips graceful teardown.
    Kill,
    /// Shutdown requested by user code rather than the runtime.
    UserShutdown,
    /// A pool terminated because its last worker exited.
    OutOfWorkers,
    /// The actor was destroyed without receiving an explicit exit.
    Unreachable,
}

impl ExitReason {
    /// Returns `true` for [`ExitReason::Normal`].
    pub fn is_normal(&self) -> bool {
        matches!(self, ExitReason::Normal)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitReason::Normal => "normal",
            ExitReason::Kill => "kill",
            ExitReason::UserShutdown => "user-shutdown",
            ExitReason::OutOfWorkers => "out-of-workers",
            ExitReason::Unreachable => "unreachable",
        };
        write!(f, "{}", name)
    }
}
