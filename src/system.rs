//! # Actor System
//!
//! The [`ActorSystem`] is the shared runtime context actors are created
//! against: it allocates actor ids, tracks how many actors are currently
//! registered, and offers a dedicated-thread worker runner for actors that
//! drive their inbox with the blocking consumer protocol.
//!
//! The registration count doubles as the shutdown signal: an actor is
//! registered for exactly as long as it has not completed cleanup, and
//! [`await_all_actors_done`](ActorSystem::await_all_actors_done) parks the
//! caller until the count reaches zero.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace};

use crate::actor::{bounce_request, InboxActor};
use crate::address::ActorHandle;
use crate::config::SystemConfig;
use crate::envelope::Envelope;
use crate::error::SystemError;
use crate::message::ExitMsg;
use crate::types::ActorId;

struct SystemState {
    running: usize,
}

struct SystemCore {
    config: SystemConfig,
    next_id: AtomicU64,
    state: Mutex<SystemState>,
    idle: Condvar,
}

/// Cloneable handle to the shared runtime context.
#[derive(Clone)]
pub struct ActorSystem {
    inner: Arc<SystemCore>,
}

impl ActorSystem {
    /// Creates a system with the given configuration.
    pub fn new(config: SystemConfig) -> Self {
        info!(name = %config.name, "actor system created");
        Self {
            inner: Arc::new(SystemCore {
                config,
                next_id: AtomicU64::new(0),
                state: Mutex::new(SystemState { running: 0 }),
                idle: Condvar::new(),
            }),
        }
    }

    /// The configuration this system was created with.
    pub fn config(&self) -> &SystemConfig {
        &self.inner.config
    }

    /// Allocates a fresh actor id.
    pub fn next_actor_id(&self) -> ActorId {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Counts an actor as running. Paired with
    /// [`unregister_actor`](ActorSystem::unregister_actor) on cleanup.
    pub fn register_actor(&self) {
        let mut state = self.inner.state.lock();
        state.running += 1;
        trace!(running = state.running, "actor registered");
    }

    /// Removes an actor from the running count, waking shutdown waiters when
    /// the count reaches zero.
    pub fn unregister_actor(&self) {
        let mut state = self.inner.state.lock();
        state.running = state.running.saturating_sub(1);
        trace!(running = state.running, "actor unregistered");
        if state.running == 0 {
            self.inner.idle.notify_all();
        }
    }

    /// Number of currently registered actors.
    pub fn running_actors(&self) -> usize {
        self.inner.state.lock().running
    }

    /// Blocks until every registered actor has unregistered.
    pub fn await_all_actors_done(&self) {
        let mut state = self.inner.state.lock();
        while state.running > 0 {
            self.inner.idle.wait(&mut state);
        }
    }

    /// Like [`await_all_actors_done`](ActorSystem::await_all_actors_done)
    /// but gives up after `timeout`.
    pub fn await_all_actors_done_timeout(&self, timeout: Duration) -> Result<(), SystemError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while state.running > 0 {
            if self.inner.idle.wait_until(&mut state, deadline).timed_out() {
                return Err(SystemError::AwaitTimeout(timeout));
            }
        }
        Ok(())
    }

    /// Waits for all actors using the configured shutdown timeout.
    pub fn shutdown(&self) -> Result<(), SystemError> {
        debug!(name = %self.inner.config.name, "actor system shutting down");
        self.await_all_actors_done_timeout(self.inner.config.shutdown_timeout)
    }

    /// Spawns a worker actor driven by a dedicated OS thread.
    ///
    /// The thread parks on the actor's inbox, drains batches in send order,
    /// and feeds each envelope to `f`. An [`ExitMsg`] terminates the worker
    /// with that reason; envelopes drained after it are bounced.
    pub fn spawn<F>(&self, f: F) -> Result<ActorHandle, SystemError>
    where
        F: FnMut(&Host, Box<Envelope>) + Send + 'static,
    {
        let actor = InboxActor::new(self);
        let handle = actor.handle();
        let thread_name = format!("{}-worker-{}", self.inner.config.name, actor.id());
        let system = self.clone();
        thread::Builder::new()
            .name(thread_name)
            .spawn(move || run_worker(system, actor, f))?;
        Ok(handle)
    }
}

impl Default for ActorSystem {
    fn default() -> Self {
        Self::new(SystemConfig::default())
    }
}

impl std::fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorSystem")
            .field("name", &self.inner.config.name)
            .field("running", &self.running_actors())
            .finish()
    }
}

/// Scheduler context a delivery is performed under.
///
/// Worker threads create one and pass it along when they deliver or forward
/// messages; anonymous and synchronous sends pass `None` instead.
#[derive(Clone, Debug)]
pub struct Host {
    system: ActorSystem,
}

impl Host {
    /// Creates a host bound to `system`.
    pub fn new(system: ActorSystem) -> Self {
        Self { system }
    }

    /// The system this host schedules against.
    pub fn system(&self) -> &ActorSystem {
        &self.system
    }
}

fn run_worker<F>(system: ActorSystem, actor: Arc<InboxActor>, mut f: F)
where
    F: FnMut(&Host, Box<Envelope>),
{
    let host = Host::new(system);
    loop {
        actor.await_message(None);
        let mut batch = actor.take_messages().into_iter();
        while let Some(envelope) = batch.next() {
            if let Some(exit) = envelope.payload.view::<ExitMsg>() {
                let reason = exit.reason.clone();
                debug!(actor = actor.id(), reason = %reason, "worker exiting");
                drop(envelope);
                actor.terminate(reason);
                for rest in batch {
                    bounce_request(rest);
                }
                return;
            }
            f(&host, envelope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_monotonic() {
        let system = ActorSystem::default();
        let a = system.next_actor_id();
        let b = system.next_actor_id();
        assert!(b > a);
    }

    #[test]
    fn register_unregister_balances() {
        let system = ActorSystem::default();
        system.register_actor();
        system.register_actor();
        assert_eq!(system.running_actors(), 2);
        system.unregister_actor();
        system.unregister_actor();
        assert_eq!(system.running_actors(), 0);
        system.await_all_actors_done();
    }

    #[test]
    fn await_timeout_reports_stragglers() {
        let system = ActorSystem::default();
        system.register_actor();
        let err = system
            .await_all_actors_done_timeout(Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, SystemError::AwaitTimeout(_)));
        system.unregister_actor();
    }
}
