//! The unit of actor communication.
//!
//! An [`Envelope`] bundles a payload with its sender and message id and is
//! what actually travels through inboxes. Senders create it, whichever stage
//! currently holds it owns it, and it is destroyed after delivery or by the
//! disposal pass of an inbox close.

use std::fmt;
use std::ptr;

use crate::address::ActorHandle;
use crate::mailbox::SinglyLinked;
use crate::message::{Message, MessageId};

/// A queued message together with its delivery metadata.
pub struct Envelope {
    /// Strong handle to the originator, used for reply routing. `None` for
    /// anonymous sends.
    pub sender: Option<ActorHandle>,
    /// Message id; requests carry the correlation token for the response.
    pub mid: MessageId,
    /// The transported payload.
    pub payload: Message,
    /// Intrusive link, meaningful only while the envelope sits in an inbox.
    next: *mut Envelope,
}

// SAFETY: `next` is only written by the inbox owning the envelope and only
// read by the unique holder of a drained chain; all other fields are Send.
unsafe impl Send for Envelope {}

impl Envelope {
    /// Creates an envelope ready for enqueueing.
    pub fn new(sender: Option<ActorHandle>, mid: MessageId, payload: Message) -> Box<Self> {
        Box::new(Self {
            sender,
            mid,
            payload,
            next: ptr::null_mut(),
        })
    }

    /// Creates a senderless fire-and-forget envelope.
    pub fn anonymous(payload: Message) -> Box<Self> {
        Self::new(None, MessageId::Async, payload)
    }

    /// Creates a request envelope with a fresh correlation token.
    pub fn request(sender: ActorHandle, payload: Message) -> Box<Self> {
        Self::new(Some(sender), MessageId::request(), payload)
    }
}

impl SinglyLinked for Envelope {
    fn next(&self) -> *mut Self {
        self.next
    }

    fn set_next(&mut self, next: *mut Self) {
        self.next = next;
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("sender", &self.sender.as_ref().map(|s| s.id()))
            .field("mid", &self.mid)
            .field("payload", &self.payload)
            .finish()
    }
}
