//! Inline delivery on the caller's thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use testscan_core::DiscoveryMessage;

use super::{MessageBus, MessageSink, deliver};

/// Delivers each message immediately and returns the sink's own continue flag.
pub struct SynchronousMessageBus {
    sink: Arc<dyn MessageSink>,
    disposed: AtomicBool,
}

impl SynchronousMessageBus {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self {
            sink,
            disposed: AtomicBool::new(false),
        }
    }
}

impl MessageBus for SynchronousMessageBus {
    fn queue_message(&self, message: DiscoveryMessage) -> bool {
        if self.disposed.load(Ordering::Acquire) {
            return false;
        }
        deliver(self.sink.as_ref(), &message)
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }
}
