//! Dispatch policies for the actor pool.
//!
//! A policy is a copyable, stateful value deciding which worker (or workers)
//! an envelope goes to. Policies receive the upgradeable read guard over the
//! pool's worker vector and must release it before the last worker enqueue,
//! so the pool's lock is never held across a foreign actor's mailbox.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLockUpgradableReadGuard;
use rand::Rng;

use crate::address::ActorHandle;
use crate::envelope::Envelope;
use crate::system::{ActorSystem, Host};

/// Upgradeable read guard over a pool's worker vector, as handed to a
/// dispatch policy.
pub type WorkerGuard<'a> = RwLockUpgradableReadGuard<'a, Vec<ActorHandle>>;

/// Signature of a user-supplied dispatch function.
pub type CustomDispatch =
    Arc<dyn Fn(&ActorSystem, WorkerGuard<'_>, Box<Envelope>, Option<&Host>) + Send + Sync>;

/// Routing strategy used by an [`ActorPool`](crate::pool::ActorPool).
pub enum DispatchPolicy {
    /// Cycles through the workers; with stable membership, `n` dispatches
    /// over `w` workers give every worker either `n/w` rounded down or up.
    RoundRobin { pos: AtomicUsize },
    /// Delivers a shallow copy of the payload to every worker, preserving
    /// the original sender and message id on each copy.
    Broadcast,
    /// Picks a worker uniformly at random per dispatch.
    Random,
    /// User-supplied dispatch function.
    Custom(CustomDispatch),
}

impl DispatchPolicy {
    /// Round-robin policy with its counter at zero.
    pub fn round_robin() -> Self {
        DispatchPolicy::RoundRobin {
            pos: AtomicUsize::new(0),
        }
    }

    /// Broadcast policy.
    pub fn broadcast() -> Self {
        DispatchPolicy::Broadcast
    }

    /// Uniform random policy.
    pub fn random() -> Self {
        DispatchPolicy::Random
    }

    /// Wraps a user-supplied dispatch function.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&ActorSystem, WorkerGuard<'_>, Box<Envelope>, Option<&Host>) + Send + Sync + 'static,
    {
        DispatchPolicy::Custom(Arc::new(f))
    }

    /// Routes `envelope` to one or more workers, consuming the guard.
    ///
    /// Callers guarantee a non-empty worker vector; the pool's filter
    /// answers for the empty case.
    pub(crate) fn dispatch(
        &self,
        system: &ActorSystem,
        guard: WorkerGuard<'_>,
        envelope: Box<Envelope>,
        host: Option<&Host>,
    ) {
        debug_assert!(!guard.is_empty());
        match self {
            DispatchPolicy::RoundRobin { pos } => {
                let index = pos.fetch_add(1, Ordering::Relaxed) % guard.len();
                let selected = guard[index].clone();
                drop(guard);
                selected.enqueue(envelope, host);
            }
            DispatchPolicy::Broadcast => {
                let targets = (*guard).clone();
                drop(guard);
                for worker in &targets {
                    worker.enqueue(
                        Envelope::new(
                            envelope.sender.clone(),
                            envelope.mid,
                            envelope.payload.clone(),
                        ),
                        host,
                    );
                }
            }
            DispatchPolicy::Random => {
                let index = rand::rng().random_range(0..guard.len());
                let selected = guard[index].clone();
                drop(guard);
                selected.enqueue(envelope, host);
            }
            DispatchPolicy::Custom(f) => f(system, guard, envelope, host),
        }
    }
}

impl Clone for DispatchPolicy {
    fn clone(&self) -> Self {
        match self {
            // A copy starts its own rotation.
            DispatchPolicy::RoundRobin { .. } => DispatchPolicy::round_robin(),
            DispatchPolicy::Broadcast => DispatchPolicy::Broadcast,
            DispatchPolicy::Random => DispatchPolicy::Random,
            DispatchPolicy::Custom(f) => DispatchPolicy::Custom(Arc::clone(f)),
        }
    }
}

impl fmt::Debug for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchPolicy::RoundRobin { pos } => {
                return f
                    .debug_struct("RoundRobin")
                    .field("pos", &pos.load(Ordering::Relaxed))
                    .finish();
            }
            DispatchPolicy::Broadcast => "Broadcast",
            DispatchPolicy::Random => "Random",
            DispatchPolicy::Custom(_) => "Custom",
        };
        f.write_str(name)
    }
}
