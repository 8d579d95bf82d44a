//! # Message Types and Identifiers
//!
//! This module defines the message passing vocabulary of the runtime: the
//! type-erased [`Message`] payload, the [`MessageId`] request/response
//! correlation scheme, and the structured control messages understood by
//! actors and pools.
//!
//! ## Design Philosophy
//!
//! - Payloads are opaque to the transport: a `Message` is a cheaply cloneable
//!   handle to an immutable value, so broadcast dispatch can hand the same
//!   payload to many workers without deep copies.
//! - Control traffic is structural: receivers classify a message by asking
//!   for a typed view (`view::<ExitMsg>()`, `view::<SysMsg>()`) and fall back
//!   to opaque pass-through for everything else.
//! - Requests carry their correlation token in the message id; a response is
//!   addressed by [`MessageId::response_id`].

use std::any::{self, Any};
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::address::ActorHandle;
use crate::types::{ActorId, ExitReason};

/// Identifies a message and, for requests, the correlation token that ties
/// the eventual response back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MessageId {
    /// Fire-and-forget message. No response is expected.
    #[default]
    Async,
    /// Request half of a request/response pair.
    Request(Uuid),
    /// Response half of a request/response pair.
    Response(Uuid),
}

impl MessageId {
    /// Creates a fresh request id with a random correlation token.
    pub fn request() -> Self {
        MessageId::Request(Uuid::new_v4())
    }

    /// Returns `true` if this id marks the request half of a pair.
    pub fn is_request(&self) -> bool {
        matches!(self, MessageId::Request(_))
    }

    /// Returns `true` if this id marks the response half of a pair.
    pub fn is_response(&self) -> bool {
        matches!(self, MessageId::Response(_))
    }

    /// The id a response to this message must carry.
    ///
    /// Requests map to a response with the same token; everything else maps
    /// to [`MessageId::Async`].
    pub fn response_id(&self) -> Self {
        match self {
            MessageId::Request(token) => MessageId::Response(*token),
            _ => MessageId::Async,
        }
    }

    /// The correlation token, if this id carries one.
    pub fn token(&self) -> Option<Uuid> {
        match self {
            MessageId::Request(token) | MessageId::Response(token) => Some(*token),
            MessageId::Async => None,
        }
    }
}

/// Type-erased, shareable message payload.
///
/// A `Message` either carries a value of some concrete type or is *empty*.
/// Empty messages are used as the response to requests that cannot be
/// served, telling the client the request was observed but ignored.
///
/// Cloning is shallow: the payload lives behind an `Arc`, so copies handed
/// to multiple workers alias the same immutable value.
#[derive(Clone)]
pub struct Message {
    content: Option<Arc<dyn Any + Send + Sync>>,
    type_name: &'static str,
}

impl Message {
    /// Wraps `value` as a message payload.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            content: Some(Arc::new(value)),
            type_name: any::type_name::<T>(),
        }
    }

    /// The empty message.
    pub fn empty() -> Self {
        Self {
            content: None,
            type_name: "<empty>",
        }
    }

    /// Returns `true` if this message carries no payload.
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
    }

    /// Attempts a typed view of the payload.
    ///
    /// Returns `None` if the message is empty or carries a different type.
    pub fn view<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.content.as_deref()?.downcast_ref::<T>()
    }

    /// Name of the payload type, for logging.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Message").field(&self.type_name).finish()
    }
}

/// Instructs the receiving actor to shut down with the given reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitMsg {
    /// Reason the receiver should terminate with.
    pub reason: ExitReason,
}

impl ExitMsg {
    /// Convenience constructor.
    pub fn new(reason: ExitReason) -> Self {
        Self { reason }
    }
}

/// Emitted by the runtime to every monitor of an actor when it terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownMsg {
    /// Id of the terminated actor.
    pub source: ActorId,
    /// Reason it terminated with.
    pub reason: ExitReason,
}

/// Pool membership and introspection commands.
///
/// These stand in for the `(sys, ...)` tuples of classic actor runtimes and
/// are matched structurally by the pool's filter.
#[derive(Debug, Clone)]
pub enum SysMsg {
    /// Add a worker to the pool.
    Put(ActorHandle),
    /// Remove one worker from the pool. Absent workers are not an error.
    Delete(ActorHandle),
    /// Remove every worker from the pool.
    Clear,
    /// Request the current worker vector. Answered at the response id with a
    /// `Vec<ActorHandle>` payload.
    Get,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_and_response_share_a_token() {
        let req = MessageId::request();
        assert!(req.is_request());
        let res = req.response_id();
        assert!(res.is_response());
        assert_eq!(req.token(), res.token());
    }

    #[test]
    fn async_has_no_response_id() {
        assert_eq!(MessageId::Async.response_id(), MessageId::Async);
        assert_eq!(MessageId::Async.token(), None);
        // A response answers nothing further.
        let res = MessageId::request().response_id();
        assert_eq!(res.response_id(), MessageId::Async);
    }

    #[test]
    fn typed_views_match_only_the_stored_type() {
        let msg = Message::new(42u32);
        assert_eq!(msg.view::<u32>(), Some(&42));
        assert!(msg.view::<i64>().is_none());
        assert!(!msg.is_empty());
    }

    #[test]
    fn empty_message_has_no_views() {
        let msg = Message::empty();
        assert!(msg.is_empty());
        assert!(msg.view::<u32>().is_none());
    }

    #[test]
    fn clones_alias_the_same_payload() {
        let msg = Message::new(String::from("shared"));
        let copy = msg.clone();
        let a: *const String = msg.view::<String>().unwrap();
        let b: *const String = copy.view::<String>().unwrap();
        assert_eq!(a, b);
    }
}
