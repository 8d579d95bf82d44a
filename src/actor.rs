//! Actor building blocks: the monitorable [`ActorCell`] base and the
//! inbox-backed [`InboxActor`] worker.
//!
//! `ActorCell` owns what every actor shares: its id, the monitor list, and
//! the cleanup flag. Cleanup is first-wins; whichever caller performs the
//! first cleanup also owns the follow-up duties (closing mailboxes,
//! unregistering). `InboxActor` combines a cell with a [`LifoInbox`] and the
//! mutex/condvar pair of the block/wake handshake.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::address::{anon_send, AbstractActor, ActorHandle, WeakActorHandle};
use crate::envelope::Envelope;
use crate::mailbox::LifoInbox;
use crate::message::{DownMsg, Message};
use crate::system::{ActorSystem, Host};
use crate::types::{ActorId, ExitReason};

#[derive(Default)]
struct CellState {
    monitors: Vec<WeakActorHandle>,
    cleaned_up: bool,
}

/// Shared state of a monitorable actor.
///
/// The cell's mutex guards the actor's own state only; it is never held
/// while delivering to another actor.
pub struct ActorCell {
    id: ActorId,
    system: ActorSystem,
    state: Mutex<CellState>,
}

impl ActorCell {
    /// Creates a cell with a freshly allocated id.
    pub fn new(system: &ActorSystem) -> Self {
        Self {
            id: system.next_actor_id(),
            system: system.clone(),
            state: Mutex::new(CellState::default()),
        }
    }

    /// Id of the owning actor.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// The system this actor belongs to.
    pub fn system(&self) -> &ActorSystem {
        &self.system
    }

    /// Adds `observer` to the monitor list.
    pub fn attach_monitor(&self, observer: WeakActorHandle) {
        self.state.lock().monitors.push(observer);
    }

    /// Removes every monitor attached for `observer`.
    pub fn detach_monitor(&self, observer: ActorId) {
        self.state.lock().monitors.retain(|m| m.id() != observer);
    }

    /// Returns `true` once cleanup ran.
    pub fn is_cleaned_up(&self) -> bool {
        self.state.lock().cleaned_up
    }

    /// Runs cleanup with `reason`, reporting whether this was the first one.
    ///
    /// The first cleanup takes the monitor list and delivers a [`DownMsg`]
    /// to every still-live observer, outside the cell lock. Later calls do
    /// nothing and return `false`.
    pub fn cleanup(&self, reason: ExitReason) -> bool {
        let monitors = {
            let mut state = self.state.lock();
            if state.cleaned_up {
                return false;
            }
            state.cleaned_up = true;
            std::mem::take(&mut state.monitors)
        };
        debug!(actor = self.id, reason = %reason, "actor terminated");
        for monitor in monitors {
            if let Some(observer) = monitor.upgrade() {
                anon_send(
                    &observer,
                    Message::new(DownMsg {
                        source: self.id,
                        reason: reason.clone(),
                    }),
                );
            }
        }
        true
    }
}

impl fmt::Debug for ActorCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorCell")
            .field("id", &self.id)
            .field("cleaned_up", &self.is_cleaned_up())
            .finish()
    }
}

/// Answers a request whose target is gone with an empty response, so the
/// client side never hangs on a dead actor. Non-requests are dropped.
pub(crate) fn bounce_request(envelope: Box<Envelope>) {
    if !envelope.mid.is_request() {
        return;
    }
    if let Some(sender) = &envelope.sender {
        trace!(mid = ?envelope.mid, "bouncing request to terminated actor");
        sender.enqueue(
            Envelope::new(None, envelope.mid.response_id(), Message::empty()),
            None,
        );
    }
}

/// An actor whose mailbox is a [`LifoInbox`] of envelopes.
///
/// This is the worker side of the runtime: producers enqueue through the
/// actor's handle, the unique consumer parks with
/// [`await_message`](InboxActor::await_message) and drains with
/// [`take_messages`](InboxActor::take_messages).
pub struct InboxActor {
    cell: ActorCell,
    /// Weak self-reference used to mint strong handles.
    addr: WeakActorHandle,
    inbox: LifoInbox<Envelope>,
    mtx: Mutex<()>,
    cv: Condvar,
}

impl InboxActor {
    /// Creates the actor and registers it with `system`.
    pub fn new(system: &ActorSystem) -> Arc<Self> {
        let cell = ActorCell::new(system);
        let id = cell.id();
        let actor = Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak_dyn: Weak<dyn AbstractActor> = weak.clone();
            Self {
                addr: WeakActorHandle::from_parts(id, weak_dyn),
                cell,
                inbox: LifoInbox::new(),
                mtx: Mutex::new(()),
                cv: Condvar::new(),
            }
        });
        system.register_actor();
        trace!(actor = actor.id(), "inbox actor created");
        actor
    }

    /// Id of this actor.
    pub fn id(&self) -> ActorId {
        self.cell.id()
    }

    /// A strong handle addressing this actor.
    pub fn handle(&self) -> ActorHandle {
        self.addr
            .upgrade()
            .expect("a borrowed actor always has a live self reference")
    }

    /// Parks the consumer until the inbox is non-empty, or until `deadline`
    /// if one is given. Returns `true` if messages are available on exit.
    pub fn await_message(&self, deadline: Option<Instant>) -> bool {
        match deadline {
            Some(deadline) => self
                .inbox
                .synchronized_await_until(&self.mtx, &self.cv, deadline),
            None => self.inbox.synchronized_await(&self.mtx, &self.cv),
        }
    }

    /// Drains the inbox, returning the envelopes in send order.
    pub fn take_messages(&self) -> Vec<Box<Envelope>> {
        match self.inbox.take_head() {
            Some(chain) => chain.reversed().collect(),
            None => Vec::new(),
        }
    }

    /// Returns `true` if a drain would yield at least one envelope.
    pub fn has_messages(&self) -> bool {
        !self.inbox.empty() && !self.inbox.blocked() && !self.inbox.closed()
    }

    /// Terminates the actor: first cleanup wins, closes the inbox bouncing
    /// queued requests, and unregisters from the system.
    ///
    /// Returns `false` if the actor had already terminated.
    pub fn terminate(&self, reason: ExitReason) -> bool {
        if !self.cell.cleanup(reason) {
            return false;
        }
        self.inbox.close_with(bounce_request);
        self.cell.system().unregister_actor();
        true
    }
}

impl AbstractActor for InboxActor {
    fn id(&self) -> ActorId {
        self.cell.id()
    }

    fn enqueue(&self, envelope: Box<Envelope>, _host: Option<&Host>) -> bool {
        match self
            .inbox
            .synchronized_push_front(&self.mtx, &self.cv, envelope)
        {
            crate::mailbox::InboxResult::QueueClosed(envelope) => {
                bounce_request(envelope);
                false
            }
            _ => true,
        }
    }

    fn attach_monitor(&self, observer: WeakActorHandle) {
        self.cell.attach_monitor(observer);
    }

    fn detach_monitor(&self, observer: ActorId) {
        self.cell.detach_monitor(observer);
    }
}

impl Drop for InboxActor {
    fn drop(&mut self) {
        // Destroyed without an explicit exit: synthesize the reason.
        if self.cell.cleanup(ExitReason::Unreachable) {
            self.inbox.close_with(bounce_request);
            self.cell.system().unregister_actor();
        }
    }
}

impl fmt::Debug for InboxActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboxActor")
            .field("id", &self.cell.id())
            .field("inbox", &self.inbox)
            .finish()
    }
}
