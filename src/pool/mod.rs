//! # Actor Pool
//!
//! A pool is a dispatching meta-actor: it owns a dynamic vector of worker
//! handles and forwards incoming envelopes to them through a
//! [`DispatchPolicy`]. Control messages manage the pool itself and never
//! reach the workers:
//!
//! - [`ExitMsg`]: terminate the pool, forwarding the exit to every worker,
//! - [`DownMsg`]: drop the terminated worker; losing the last one terminates
//!   the pool with [`ExitReason::OutOfWorkers`],
//! - [`SysMsg::Put`] / [`SysMsg::Delete`] / [`SysMsg::Clear`]: membership,
//! - [`SysMsg::Get`]: reply with a snapshot of the worker vector.
//!
//! Every worker is monitored by the pool, so crashes surface as down
//! messages and are absorbed silently. Requests reaching a pool without
//! workers are answered with an empty response so clients cannot hang.
//!
//! The worker vector sits behind an upgradeable reader-writer lock. Message
//! entry takes the upgradeable read side; only membership changes and
//! teardown upgrade to a writer. Dispatch always releases the lock before
//! the final worker enqueue, so two messages from one sender may still reach
//! different workers out of order; senders that need ordering talk to a
//! worker directly.

mod policy;

pub use policy::{CustomDispatch, DispatchPolicy, WorkerGuard};

use std::fmt;
use std::mem;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard};
use tracing::{debug, trace};

use crate::actor::ActorCell;
use crate::address::{anon_send, AbstractActor, ActorHandle, WeakActorHandle};
use crate::envelope::Envelope;
use crate::message::{DownMsg, ExitMsg, Message, SysMsg};
use crate::system::{ActorSystem, Host};
use crate::types::{ActorId, ExitReason};

/// Outcome of the control-message filter.
enum Filtered<'a> {
    /// The envelope was consumed; nothing reaches the policy.
    Handled,
    /// Data message for a non-empty pool; guard and envelope travel on to
    /// the dispatch policy.
    Pass(WorkerGuard<'a>, Box<Envelope>),
}

/// A supervisor actor multiplexing messages over a set of workers.
pub struct ActorPool {
    cell: ActorCell,
    /// Weak self-reference handed to workers as the monitor observer.
    addr: WeakActorHandle,
    workers: RwLock<Vec<ActorHandle>>,
    policy: DispatchPolicy,
    /// Exit reason used when the pool terminates itself. Guarded by its own
    /// lock, not the workers lock.
    planned_reason: Mutex<ExitReason>,
}

impl ActorPool {
    fn make_arc(system: &ActorSystem, policy: DispatchPolicy) -> Arc<Self> {
        let cell = ActorCell::new(system);
        let id = cell.id();
        let pool = Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak_dyn: Weak<dyn AbstractActor> = weak.clone();
            Self {
                addr: WeakActorHandle::from_parts(id, weak_dyn),
                cell,
                workers: RwLock::new(Vec::new()),
                policy,
                planned_reason: Mutex::new(ExitReason::Normal),
            }
        });
        system.register_actor();
        debug!(pool = id, policy = ?pool.policy, "actor pool created");
        pool
    }

    /// Creates a pool with no workers.
    pub fn make(system: &ActorSystem, policy: DispatchPolicy) -> ActorHandle {
        ActorHandle::new(Self::make_arc(system, policy))
    }

    /// Creates a pool and populates it with `num_workers` actors obtained
    /// from `factory`, each monitored by the pool.
    pub fn with_workers<F>(
        system: &ActorSystem,
        num_workers: usize,
        mut factory: F,
        policy: DispatchPolicy,
    ) -> ActorHandle
    where
        F: FnMut() -> ActorHandle,
    {
        let pool = Self::make_arc(system, policy);
        {
            let mut workers = pool.workers.write();
            for _ in 0..num_workers {
                let worker = factory();
                worker.attach_monitor(pool.addr.clone());
                workers.push(worker);
            }
        }
        ActorHandle::new(pool)
    }

    /// Terminates the pool with its planned reason, unregistering on the
    /// first cleanup.
    pub fn quit(&self, _host: Option<&Host>) {
        // Safe without the workers lock: the cell has its own.
        let reason = self.planned_reason.lock().clone();
        if self.cell.cleanup(reason) {
            self.cell.system().unregister_actor();
        }
    }

    /// Intercepts control messages. Data messages for a non-empty pool pass
    /// through to the dispatch policy.
    fn filter<'a>(
        &self,
        guard: WorkerGuard<'a>,
        envelope: Box<Envelope>,
        host: Option<&Host>,
    ) -> Filtered<'a> {
        trace!(pool = self.cell.id(), envelope = ?envelope, "pool filter");
        if let Some(exit) = envelope.payload.view::<ExitMsg>() {
            if self.cell.cleanup(exit.reason.clone()) {
                // Forward the exit to every worker exactly once. Swap the
                // vector out of the critical section first.
                let mut write = RwLockUpgradableReadGuard::upgrade(guard);
                let workers = mem::take(&mut *write);
                drop(write);
                for worker in &workers {
                    anon_send(worker, envelope.payload.clone());
                }
                self.cell.system().unregister_actor();
            }
            return Filtered::Handled;
        }
        if let Some(down) = envelope.payload.view::<DownMsg>() {
            let mut write = RwLockUpgradableReadGuard::upgrade(guard);
            if let Some(index) = write.iter().position(|w| w.id() == down.source) {
                write.remove(index);
                debug!(
                    pool = self.cell.id(),
                    worker = down.source,
                    reason = %down.reason,
                    "removed terminated worker"
                );
            } else {
                debug!(
                    pool = self.cell.id(),
                    worker = down.source,
                    "down message for unknown worker"
                );
            }
            if write.is_empty() {
                *self.planned_reason.lock() = ExitReason::OutOfWorkers;
                drop(write);
                self.quit(host);
            }
            return Filtered::Handled;
        }
        if let Some(sys) = envelope.payload.view::<SysMsg>() {
            match sys {
                SysMsg::Put(worker) => {
                    worker.attach_monitor(self.addr.clone());
                    let mut write = RwLockUpgradableReadGuard::upgrade(guard);
                    write.push(worker.clone());
                }
                SysMsg::Delete(worker) => {
                    // Absent workers are not an error.
                    let mut write = RwLockUpgradableReadGuard::upgrade(guard);
                    if let Some(index) = write.iter().position(|w| w == worker) {
                        write[index].detach_monitor(self.cell.id());
                        write.remove(index);
                    }
                }
                SysMsg::Clear => {
                    let mut write = RwLockUpgradableReadGuard::upgrade(guard);
                    for worker in write.iter() {
                        worker.detach_monitor(self.cell.id());
                    }
                    write.clear();
                }
                SysMsg::Get => {
                    let snapshot = (*guard).clone();
                    drop(guard);
                    if let Some(sender) = &envelope.sender {
                        sender.enqueue(
                            Envelope::new(
                                None,
                                envelope.mid.response_id(),
                                Message::new(snapshot),
                            ),
                            host,
                        );
                    }
                }
            }
            return Filtered::Handled;
        }
        if guard.is_empty() {
            drop(guard);
            if envelope.mid.is_request() {
                if let Some(sender) = &envelope.sender {
                    // Tell the client this request was observed but ignored.
                    sender.enqueue(
                        Envelope::new(None, envelope.mid.response_id(), Message::empty()),
                        host,
                    );
                }
            }
            return Filtered::Handled;
        }
        Filtered::Pass(guard, envelope)
    }
}

impl AbstractActor for ActorPool {
    fn id(&self) -> ActorId {
        self.cell.id()
    }

    fn enqueue(&self, envelope: Box<Envelope>, host: Option<&Host>) -> bool {
        let guard = self.workers.upgradable_read();
        match self.filter(guard, envelope, host) {
            Filtered::Handled => true,
            Filtered::Pass(guard, envelope) => {
                self.policy
                    .dispatch(self.cell.system(), guard, envelope, host);
                true
            }
        }
    }

    fn attach_monitor(&self, observer: WeakActorHandle) {
        self.cell.attach_monitor(observer);
    }

    fn detach_monitor(&self, observer: ActorId) {
        self.cell.detach_monitor(observer);
    }
}

impl Drop for ActorPool {
    fn drop(&mut self) {
        // Destroyed without an explicit exit: synthesize the reason.
        if self.cell.cleanup(ExitReason::Unreachable) {
            self.cell.system().unregister_actor();
        }
    }
}

impl fmt::Debug for ActorPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorPool")
            .field("id", &self.cell.id())
            .field("workers", &self.workers.read().len())
            .field("policy", &self.policy)
            .finish()
    }
}
