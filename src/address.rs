//! # Actor Addressing and Reference Management
//!
//! This module defines how actors are referenced and communicated with: the
//! [`AbstractActor`] trait every message target implements, the
//! reference-counted [`ActorHandle`], and the non-owning [`WeakActorHandle`]
//! used where a strong reference would create an ownership cycle (most
//! prominently the monitor relation between a pool and its workers).
//!
//! ## Design Philosophy
//!
//! - Handles are cheap to clone and compare; equality is identity, meaning
//!   two handles are equal iff they address the same actor.
//! - Sending never fails loudly: `enqueue` reports rejection with a `bool`
//!   and terminated targets bounce requests instead of erroring.
//! - Monitors use weak handles so that observing an actor never keeps it
//!   alive.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use crate::envelope::Envelope;
use crate::message::Message;
use crate::system::Host;
use crate::types::ActorId;

/// Interface every message target implements.
///
/// Implementations are the pool and inbox-backed worker actors; anything
/// reachable through an [`ActorHandle`] goes through this trait.
pub trait AbstractActor: Send + Sync + Debug {
    /// System-wide id of this actor.
    fn id(&self) -> ActorId;

    /// Delivers an envelope to this actor.
    ///
    /// `host` is the scheduler context the delivery happens under; `None`
    /// for synchronous or anonymous sends. Returns `false` if the actor has
    /// terminated and could not accept the envelope.
    fn enqueue(&self, envelope: Box<Envelope>, host: Option<&Host>) -> bool;

    /// Attaches a monitor: `observer` receives a
    /// [`DownMsg`](crate::message::DownMsg) when this actor terminates.
    fn attach_monitor(&self, observer: WeakActorHandle);

    /// Detaches every monitor previously attached for `observer`.
    fn detach_monitor(&self, observer: ActorId);
}

/// Owning, cloneable reference to an actor.
#[derive(Clone, Debug)]
pub struct ActorHandle {
    inner: Arc<dyn AbstractActor>,
}

impl ActorHandle {
    /// Wraps an actor implementation in a handle.
    pub fn new(inner: Arc<dyn AbstractActor>) -> Self {
        Self { inner }
    }

    /// System-wide id of the referenced actor.
    pub fn id(&self) -> ActorId {
        self.inner.id()
    }

    /// Delivers an envelope to the referenced actor.
    pub fn enqueue(&self, envelope: Box<Envelope>, host: Option<&Host>) -> bool {
        self.inner.enqueue(envelope, host)
    }

    /// See [`AbstractActor::attach_monitor`].
    pub fn attach_monitor(&self, observer: WeakActorHandle) {
        self.inner.attach_monitor(observer);
    }

    /// See [`AbstractActor::detach_monitor`].
    pub fn detach_monitor(&self, observer: ActorId) {
        self.inner.detach_monitor(observer);
    }

    /// Creates a non-owning reference to the same actor.
    pub fn downgrade(&self) -> WeakActorHandle {
        WeakActorHandle {
            id: self.id(),
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl PartialEq for ActorHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for ActorHandle {}

/// Non-owning reference to an actor.
///
/// Keeps the actor's id available even after the actor itself is gone, so
/// late down-message bookkeeping can still identify it.
#[derive(Clone, Debug)]
pub struct WeakActorHandle {
    id: ActorId,
    inner: Weak<dyn AbstractActor>,
}

impl WeakActorHandle {
    /// Builds a weak handle from an id and a weak actor reference.
    pub fn from_parts(id: ActorId, inner: Weak<dyn AbstractActor>) -> Self {
        Self { id, inner }
    }

    /// Id of the referenced actor, live or not.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Attempts to recover a strong handle.
    pub fn upgrade(&self) -> Option<ActorHandle> {
        self.inner.upgrade().map(ActorHandle::new)
    }
}

/// Sends `payload` to `target` without a sender.
///
/// The receiver cannot reply; the delivery happens outside any scheduler
/// context. Returns `false` if the target has terminated.
pub fn anon_send(target: &ActorHandle, payload: Message) -> bool {
    target.enqueue(Envelope::anonymous(payload), None)
}
