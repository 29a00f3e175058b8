//! Buffered delivery from a dedicated worker thread.
//!
//! Messages go into an unbounded FIFO and are drained by one worker in submission order. `dispose` closes
//! the queue, lets the worker drain what was already accepted, and joins it. `flush` waits for the worker to
//! catch up without closing anything.
//!
//! Once the sink asks to stop, the worker discards pending test-case messages and `queue_message` refuses
//! new ones. The terminal `DiscoveryComplete` is still accepted and delivered so every run ends with it.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use testscan_core::DiscoveryMessage;

use super::{MessageBus, MessageSink, deliver};

/// Queue entry: a message to deliver, or a marker acknowledged once everything ahead of it is delivered.
enum Envelope {
    Message(DiscoveryMessage),
    Flush(oneshot::Sender<()>),
}

pub struct QueuedMessageBus {
    /// `None` once shutdown has begun.
    sender: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    continue_running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QueuedMessageBus {
    /// Spawn the delivery worker.
    pub fn new(sink: Arc<dyn MessageSink>) -> io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let continue_running = Arc::new(AtomicBool::new(true));

        let worker_flag = Arc::clone(&continue_running);
        let worker = thread::Builder::new()
            .name("testscan-message-bus".to_string())
            .spawn(move || run_worker(rx, sink, worker_flag))?;

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            continue_running,
            worker: Mutex::new(Some(worker)),
        })
    }
}

fn run_worker(
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    sink: Arc<dyn MessageSink>,
    continue_running: Arc<AtomicBool>,
) {
    // Returns None once every sender is gone and the queue is empty.
    while let Some(envelope) = rx.blocking_recv() {
        let message = match envelope {
            Envelope::Message(message) => message,
            Envelope::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
        };
        if !continue_running.load(Ordering::Acquire) && !message.is_terminal() {
            tracing::trace!("discarding message after stop request");
            continue;
        }
        if !deliver(sink.as_ref(), &message) {
            continue_running.store(false, Ordering::Release);
        }
    }
}

impl MessageBus for QueuedMessageBus {
    fn queue_message(&self, message: DiscoveryMessage) -> bool {
        let sender = self.sender.lock();
        let Some(tx) = sender.as_ref() else {
            return false;
        };

        let running = self.continue_running.load(Ordering::Acquire);
        if !running && !message.is_terminal() {
            return false;
        }
        if tx.send(Envelope::Message(message)).is_err() {
            return false;
        }
        running
    }

    fn flush(&self) {
        let (ack, done) = oneshot::channel();
        {
            let sender = self.sender.lock();
            let Some(tx) = sender.as_ref() else {
                return;
            };
            if tx.send(Envelope::Flush(ack)).is_err() {
                return;
            }
        }
        // An error means the worker is gone, so there is nothing left to wait for.
        let _ = done.blocking_recv();
    }

    fn dispose(&self) {
        // Dropping the sender wakes the worker; it drains the backlog and exits.
        drop(self.sender.lock().take());

        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::warn!("message bus worker exited abnormally");
            }
        }
    }
}

impl Drop for QueuedMessageBus {
    fn drop(&mut self) {
        self.dispose();
    }
}
