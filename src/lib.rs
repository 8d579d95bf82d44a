//! # Perch Actor Runtime Core
//!
//! Perch is a thread-based actor runtime core built around two tightly
//! coupled pieces: a lock-free LIFO inbox that serves as each actor's
//! mailbox and synchronization point, and an actor pool that multiplexes
//! messages across a dynamic set of workers under a pluggable dispatch
//! policy with monitor-based failure handling.
//!
//! ## Design Principles
//!
//! - **Lock-free fast paths**: pushing into an inbox and draining it are
//!   single compare-and-swap operations; mutexes and condition variables
//!   appear only in the consumer's block/wake handshake.
//! - **Failure as data**: rejected sends are return values, worker crashes
//!   arrive as down messages, and requests to dead or empty targets are
//!   answered with empty responses rather than errors.
//! - **Supervision by monitoring**: the pool monitors every worker and
//!   absorbs their failures; losing the last worker terminates the pool
//!   with its own distinguishable exit reason.
//!
//! ## Usage Example
//!
//! ```rust
//! use perch::{ActorPool, ActorSystem, DispatchPolicy, Envelope, ExitMsg, ExitReason, Message};
//!
//! let system = ActorSystem::default();
//! let pool = ActorPool::with_workers(
//!     &system,
//!     4,
//!     || {
//!         system
//!             .spawn(|_host, envelope| {
//!                 if let Some(n) = envelope.payload.view::<u64>() {
//!                     println!("crunching {n}");
//!                 }
//!             })
//!             .expect("spawn worker")
//!     },
//!     DispatchPolicy::round_robin(),
//! );
//!
//! for n in 0..16u64 {
//!     pool.enqueue(Envelope::anonymous(Message::new(n)), None);
//! }
//! pool.enqueue(
//!     Envelope::anonymous(Message::new(ExitMsg::new(ExitReason::Normal))),
//!     None,
//! );
//! system.shutdown().expect("clean shutdown");
//! ```
//!
//! ## Module Organization
//!
//! - [`mailbox`]: intrusive linking and the lock-free LIFO inbox
//! - [`envelope`]: the transported unit of communication
//! - [`message`]: payloads, message ids, and control messages
//! - [`address`]: actor handles and the anonymous send primitive
//! - [`actor`]: the monitorable actor base and inbox-backed workers
//! - [`pool`]: the dispatching meta-actor and its policies
//! - [`system`]: shared runtime context and the worker runner
//! - [`config`], [`error`], [`logging`]: ambient plumbing

pub mod actor;
pub mod address;
pub mod config;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod mailbox;
pub mod message;
pub mod pool;
pub mod system;
pub mod types;

pub use actor::{ActorCell, InboxActor};
pub use address::{anon_send, AbstractActor, ActorHandle, WeakActorHandle};
pub use config::SystemConfig;
pub use envelope::Envelope;
pub use error::SystemError;
pub use mailbox::{Chain, InboxResult, LifoInbox, SinglyLinked};
pub use message::{DownMsg, ExitMsg, Message, MessageId, SysMsg};
pub use pool::{ActorPool, DispatchPolicy};
pub use system::{ActorSystem, Host};
pub use types::{ActorId, ExitReason};
