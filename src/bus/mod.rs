//! Message buses: the delivery channel between a discovery run and its observer.
//!
//! Both variants implement [`MessageBus`] and are interchangeable. The choice is a delivery trade-off
//! (`DiscoveryOptions::synchronous_message_reporting`); message identity, ordering and the
//! completion-always-last guarantee are the same either way.
//!
//! - [`SynchronousMessageBus`] calls the sink inline on the discovery thread.
//! - [`QueuedMessageBus`] buffers messages and delivers them from a dedicated worker thread.

mod queued;
mod synchronous;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use testscan_core::DiscoveryMessage;

use crate::disposal::panic_message;

pub use queued::QueuedMessageBus;
pub use synchronous::SynchronousMessageBus;

/// Observer of discovery messages.
///
/// Returning `false` asks the producer to stop sending further test cases. `DiscoveryComplete` is terminal
/// and arrives exactly once per run.
pub trait MessageSink: Send + Sync {
    fn on_message(&self, message: &DiscoveryMessage) -> bool;
}

impl<F> MessageSink for F
where
    F: Fn(&DiscoveryMessage) -> bool + Send + Sync,
{
    fn on_message(&self, message: &DiscoveryMessage) -> bool {
        self(message)
    }
}

/// Channel-like sink for discovery messages.
pub trait MessageBus: Send + Sync {
    /// Submit a message. Returns whether the producer should keep going.
    fn queue_message(&self, message: DiscoveryMessage) -> bool;

    /// Block until every message accepted so far has been delivered. The bus stays open.
    fn flush(&self) {}

    /// Flush and close the bus. Nothing is delivered after this returns. Idempotent.
    fn dispose(&self);
}

/// Build the bus selected by the options flag.
///
/// Falls back to the synchronous variant when the worker thread cannot be spawned.
pub fn create_message_bus(sink: Arc<dyn MessageSink>, synchronous: bool) -> Box<dyn MessageBus> {
    if synchronous {
        return Box::new(SynchronousMessageBus::new(sink));
    }
    match QueuedMessageBus::new(Arc::clone(&sink)) {
        Ok(bus) => Box::new(bus),
        Err(e) => {
            tracing::warn!(error = %e, "could not start message bus worker; delivering synchronously");
            Box::new(SynchronousMessageBus::new(sink))
        }
    }
}

/// Deliver one message, treating a panicking sink as a stop request.
fn deliver(sink: &dyn MessageSink, message: &DiscoveryMessage) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| sink.on_message(message))) {
        Ok(keep_going) => keep_going,
        Err(payload) => {
            tracing::warn!(reason = %panic_message(payload.as_ref()), "message sink panicked; stopping delivery");
            false
        }
    }
}
