//! Unbounded lock-free LIFO inbox.
//!
//! The inbox is a Treiber-style stack whose head word doubles as the
//! consumer's synchronization point. The single `AtomicPtr` head encodes
//! four states:
//!
//! - null: the stack is empty and no reader is waiting,
//! - the `blocked` sentinel: the stack is empty and the unique consumer is
//!   waiting (or about to wait) on the associated condition variable,
//! - the `closed` sentinel: terminal, no further pushes are accepted,
//! - anything else: a pointer to the top node of the stack.
//!
//! Every transition is a single compare-and-swap. Producers push with
//! [`LifoInbox::push_front`]; the consumer drains in bulk with
//! [`LifoInbox::take_head`] and parks with [`LifoInbox::synchronized_await`].
//! The mutex and condition variable are used only for the block/wake
//! handshake, never on the push or drain fast paths.

use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use super::{InboxResult, SinglyLinked};

/// Concurrent LIFO stack of intrusively linked nodes.
///
/// Any number of producers may push concurrently; draining and the
/// block/unblock transitions belong to a unique consumer. Nodes pushed into
/// the inbox are owned by it until they are drained, handed to the disposal
/// callback of [`close_with`](LifoInbox::close_with), or returned to the
/// pusher by [`InboxResult::QueueClosed`].
pub struct LifoInbox<T: SinglyLinked> {
    head: AtomicPtr<T>,
    _owned: PhantomData<Box<T>>,
}

// SAFETY: All shared mutation funnels through the atomic head word. Nodes
// are exclusively owned by whichever side currently holds them (producers
// before the CAS, the inbox while linked, the consumer after take_head), so
// sharing the inbox itself requires only T: Send.
unsafe impl<T: SinglyLinked> Sync for LifoInbox<T> {}

impl<T: SinglyLinked> LifoInbox<T> {
    /// Creates an empty, open inbox.
    pub fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            _owned: PhantomData,
        }
    }

    // Sentinel encoding: real nodes come out of Box allocations and are
    // aligned, so the low addresses 1 and 2 can never collide with them.
    fn blocked_tag() -> *mut T {
        1 as *mut T
    }

    fn closed_tag() -> *mut T {
        2 as *mut T
    }

    /// Returns `true` if the stack holds no nodes and no reader is waiting.
    pub fn empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }

    /// Returns `true` while the consumer is parked on the inbox.
    pub fn blocked(&self) -> bool {
        self.head.load(Ordering::Acquire) == Self::blocked_tag()
    }

    /// Returns `true` once the inbox was closed.
    pub fn closed(&self) -> bool {
        self.head.load(Ordering::Acquire) == Self::closed_tag()
    }

    /// Pushes `node` on top of the stack.
    ///
    /// On [`InboxResult::UnblockedReader`] the caller owes the consumer a
    /// notification on the inbox's condition variable; use
    /// [`synchronized_push_front`](LifoInbox::synchronized_push_front) unless
    /// the handshake is handled elsewhere. On [`InboxResult::QueueClosed`]
    /// ownership of the node returns to the caller.
    pub fn push_front(&self, node: Box<T>) -> InboxResult<T> {
        let raw = Box::into_raw(node);
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            if head == Self::closed_tag() {
                // SAFETY: `raw` came out of Box::into_raw above and was never
                // published, so we still own it exclusively.
                return InboxResult::QueueClosed(unsafe { Box::from_raw(raw) });
            }
            // A sentinel is never part of a chain; an empty or blocked stack
            // makes the new node the terminator.
            let next = if head == Self::blocked_tag() {
                ptr::null_mut()
            } else {
                head
            };
            // SAFETY: the node is unpublished until the CAS below succeeds.
            unsafe { (*raw).set_next(next) };
            match self
                .head
                .compare_exchange_weak(head, raw, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(prev) => {
                    return if prev == Self::blocked_tag() {
                        InboxResult::UnblockedReader
                    } else {
                        InboxResult::Success
                    };
                }
                Err(actual) => head = actual,
            }
        }
    }

    /// Marks the empty inbox as having a waiting reader.
    ///
    /// Succeeds only on the empty-unblocked state. The unique consumer calls
    /// this before parking on the condition variable.
    pub fn try_block(&self) -> bool {
        self.head
            .compare_exchange(
                ptr::null_mut(),
                Self::blocked_tag(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Reverts [`try_block`](LifoInbox::try_block), aborting a planned wait.
    ///
    /// Fails if a producer already replaced the blocked marker with a node.
    pub fn try_unblock(&self) -> bool {
        self.head
            .compare_exchange(
                Self::blocked_tag(),
                ptr::null_mut(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Takes the whole stack in one exchange, leaving the inbox empty.
    ///
    /// The returned chain is privately owned by the caller and yields nodes
    /// in push-reverse (LIFO) order; use [`Chain::reversed`] for FIFO within
    /// the drain. Returns `None` on an empty inbox. Must not be called once
    /// the inbox is closed.
    pub fn take_head(&self) -> Option<Chain<T>> {
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            if head == Self::closed_tag() {
                debug_assert!(false, "take_head on a closed inbox");
                return None;
            }
            if head.is_null() || head == Self::blocked_tag() {
                return None;
            }
            match self.head.compare_exchange_weak(
                head,
                ptr::null_mut(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(taken) => return Some(Chain::new(taken)),
                Err(actual) => head = actual,
            }
        }
    }

    /// Converts a raw link into an owned node while walking a private chain.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a node of a chain the caller exclusively owns
    /// (obtained from [`take_head`](LifoInbox::take_head) or the close
    /// drain), and must not be promoted twice.
    pub unsafe fn promote(ptr: *mut T) -> Option<Box<T>> {
        if ptr.is_null() {
            None
        } else {
            // SAFETY: per contract, `ptr` was created by Box::into_raw in
            // push_front and is exclusively owned by the caller.
            Some(unsafe { Box::from_raw(ptr) })
        }
    }

    /// Closes the inbox, feeding any still-queued node to `dispose`.
    ///
    /// After the first close all further pushes fail with
    /// [`InboxResult::QueueClosed`]; repeated closes are no-ops.
    pub fn close_with<F>(&self, mut dispose: F)
    where
        F: FnMut(Box<T>),
    {
        let prev = self.head.swap(Self::closed_tag(), Ordering::AcqRel);
        if prev.is_null() || prev == Self::blocked_tag() || prev == Self::closed_tag() {
            return;
        }
        let mut cursor = prev;
        while !cursor.is_null() {
            // SAFETY: the swap above made the chain private to this call.
            let node = unsafe { Box::from_raw(cursor) };
            cursor = node.next();
            dispose(node);
        }
    }

    /// Closes the inbox, dropping any still-queued node.
    pub fn close(&self) {
        self.close_with(drop);
    }

    /// Pushes a node and completes the wake handshake if needed.
    ///
    /// When the push observes the blocked state, the mutex is taken before
    /// notifying so a consumer that set the marker but has not reached its
    /// wait yet cannot miss the signal.
    pub fn synchronized_push_front(
        &self,
        mtx: &Mutex<()>,
        cv: &Condvar,
        node: Box<T>,
    ) -> InboxResult<T> {
        let result = self.push_front(node);
        if matches!(result, InboxResult::UnblockedReader) {
            let _guard = mtx.lock();
            cv.notify_one();
        }
        result
    }

    /// Constructs a node from `value` and pushes it with the wake handshake.
    ///
    /// Returns `false` if the inbox is closed; the value is dropped in that
    /// case.
    pub fn synchronized_emplace_front(&self, mtx: &Mutex<()>, cv: &Condvar, value: T) -> bool {
        self.synchronized_push_front(mtx, cv, Box::new(value))
            .is_accepted()
    }

    /// Consumer protocol: parks until the inbox is non-empty.
    ///
    /// Returns `true` if at least one node is available on exit. Must only
    /// be called by the unique consumer and never on a closed inbox.
    pub fn synchronized_await(&self, mtx: &Mutex<()>, cv: &Condvar) -> bool {
        debug_assert!(!self.closed());
        if self.try_block() {
            let mut guard = mtx.lock();
            while self.blocked() {
                cv.wait(&mut guard);
            }
        }
        !self.empty()
    }

    /// Like [`synchronized_await`](LifoInbox::synchronized_await) but gives
    /// up at `deadline`, returning `true` iff the inbox is non-empty on exit.
    pub fn synchronized_await_until(
        &self,
        mtx: &Mutex<()>,
        cv: &Condvar,
        deadline: Instant,
    ) -> bool {
        debug_assert!(!self.closed());
        if self.try_block() {
            let mut guard = mtx.lock();
            while self.blocked() {
                if cv.wait_until(&mut guard, deadline).timed_out() {
                    // Failing to unblock means a pusher replaced the marker
                    // with a node after the timeout fired.
                    return !self.try_unblock();
                }
            }
        }
        !self.empty()
    }
}

impl<T: SinglyLinked> Default for LifoInbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SinglyLinked> Drop for LifoInbox<T> {
    fn drop(&mut self) {
        self.close_with(drop);
    }
}

impl<T: SinglyLinked> fmt::Debug for LifoInbox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.closed() {
            "closed"
        } else if self.blocked() {
            "blocked"
        } else if self.empty() {
            "empty"
        } else {
            "non-empty"
        };
        f.debug_tuple("LifoInbox").field(&state).finish()
    }
}

/// Privately owned chain of nodes drained from a [`LifoInbox`].
///
/// Iterating yields owned nodes in the chain's current order; any nodes not
/// consumed are dropped with the chain.
pub struct Chain<T: SinglyLinked> {
    head: *mut T,
    _owned: PhantomData<Box<T>>,
}

// SAFETY: the chain exclusively owns its nodes and T is Send.
unsafe impl<T: SinglyLinked> Send for Chain<T> {}

impl<T: SinglyLinked> Chain<T> {
    fn new(head: *mut T) -> Self {
        Self {
            head,
            _owned: PhantomData,
        }
    }

    /// Returns `true` if no nodes remain.
    pub fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    /// Reverses the chain in place, turning a LIFO drain into FIFO order.
    pub fn reversed(mut self) -> Self {
        let mut prev: *mut T = ptr::null_mut();
        let mut cursor = self.head;
        while !cursor.is_null() {
            // SAFETY: every node in the chain is exclusively ours.
            unsafe {
                let next = (*cursor).next();
                (*cursor).set_next(prev);
                prev = cursor;
                cursor = next;
            }
        }
        self.head = prev;
        self
    }
}

impl<T: SinglyLinked> Iterator for Chain<T> {
    type Item = Box<T>;

    fn next(&mut self) -> Option<Box<T>> {
        // SAFETY: `head` is null or owned by this chain, and advancing the
        // cursor before returning ensures no double promotion.
        let node = unsafe { LifoInbox::<T>::promote(self.head) }?;
        self.head = node.next();
        Some(node)
    }
}

impl<T: SinglyLinked> Drop for Chain<T> {
    fn drop(&mut self) {
        while let Some(node) = self.next() {
            drop(node);
        }
    }
}
